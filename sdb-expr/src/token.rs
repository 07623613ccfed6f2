//! トークン定義

use std::fmt;

/// トークンの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// 10進数: `42`
    Decimal,
    /// 16進数: `0x2a`
    Hex,
    /// レジスタ参照: `$sp`
    Register,
    Plus,
    Minus,
    /// 乗算の `*`（単項なら [`TokenKind::Deref`] に書き換えられる）
    Star,
    Slash,
    LParen,
    RParen,
    /// `==`
    Eq,
    /// `!=`
    Neq,
    /// `&&`
    And,
    /// ポインタ参照外しの単項 `*`
    Deref,
}

impl TokenKind {
    /// 演算子の優先順位（値が小さいほど弱く結合する）
    ///
    /// 演算子でなければ `None`
    pub fn precedence(self) -> Option<u8> {
        match self {
            TokenKind::Eq | TokenKind::Neq => Some(0),
            TokenKind::And => Some(1),
            TokenKind::Plus | TokenKind::Minus => Some(2),
            TokenKind::Star | TokenKind::Slash => Some(3),
            TokenKind::Deref => Some(4),
            TokenKind::Decimal
            | TokenKind::Hex
            | TokenKind::Register
            | TokenKind::LParen
            | TokenKind::RParen => None,
        }
    }

    /// 前置の単項演算子かどうか
    pub fn is_unary(self) -> bool {
        self == TokenKind::Deref
    }

    /// オペランドの末尾になり得るトークンかどうか
    ///
    /// 直前のトークンがこれに該当する `*` は乗算として扱われる。
    pub fn ends_operand(self) -> bool {
        matches!(
            self,
            TokenKind::Decimal | TokenKind::Hex | TokenKind::Register | TokenKind::RParen
        )
    }
}

/// 字句解析で得られたトークン
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// マッチした文字列
    pub text: String,
    /// 入力中の開始位置（バイト単位）
    pub position: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, position: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            position,
        }
    }

    /// 入力中の終了位置（排他的）
    pub fn end(&self) -> usize {
        self.position + self.text.len()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
