//! 字句解析
//!
//! 字句規則を優先順位順に試し、現在位置から始まる最初のマッチを
//! トークンとして切り出します。空白は認識しますが出力には含めません。

use crate::{ExprError, Result, Token, TokenKind};
use regex::Regex;
use std::sync::OnceLock;
use tracing::trace;

/// 1つの式に含められるトークン数の上限
pub const MAX_TOKENS: usize = 32;

/// トークン文字列のバッファ容量（有効な文字数はこれより1少ない）
pub const TOKEN_TEXT_CAPACITY: usize = 32;

/// 字句規則（優先順位の高い順）
///
/// `None` は空白で、トークン列には追加しない。
const RULES: &[(&str, Option<TokenKind>)] = &[
    (r"\s+", None),
    (r"\+", Some(TokenKind::Plus)),
    (r"==", Some(TokenKind::Eq)),
    (r"!=", Some(TokenKind::Neq)),
    (r"&&", Some(TokenKind::And)),
    (r"-", Some(TokenKind::Minus)),
    (r"\*", Some(TokenKind::Star)),
    (r"/", Some(TokenKind::Slash)),
    (r"\(", Some(TokenKind::LParen)),
    (r"\)", Some(TokenKind::RParen)),
    (r"0[xX][0-9a-fA-F]+", Some(TokenKind::Hex)),
    (r"[0-9]+", Some(TokenKind::Decimal)),
    (r"\$[A-Za-z0-9]+", Some(TokenKind::Register)),
];

/// コンパイル済みの字句規則
struct Rule {
    source: &'static str,
    pattern: Regex,
    kind: Option<TokenKind>,
}

/// 字句解析器
///
/// 規則の正規表現は作成時に一度だけコンパイルされます。
pub struct Lexer {
    rules: Vec<Rule>,
}

impl Lexer {
    /// 字句解析器を作成する
    pub fn new() -> Result<Self> {
        let rules = RULES
            .iter()
            .map(|&(source, kind)| -> Result<Rule> {
                // 現在位置に固定してマッチさせる
                let pattern = Regex::new(&format!("^(?:{})", source))?;
                Ok(Rule {
                    source,
                    pattern,
                    kind,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { rules })
    }

    /// 式をトークン列に分解する
    ///
    /// 単項 `*` の書き換え（[`resolve_derefs`]）まで行ったトークン列を返す。
    pub fn tokenize(&self, input: &str) -> std::result::Result<Vec<Token>, ExprError> {
        let mut tokens = Vec::new();
        let mut position = 0;

        while position < input.len() {
            let rest = &input[position..];

            let (index, rule, len) = self
                .rules
                .iter()
                .enumerate()
                .find_map(|(i, rule)| {
                    rule.pattern
                        .find(rest)
                        .filter(|m| !m.is_empty())
                        .map(|m| (i, rule, m.end()))
                })
                .ok_or(ExprError::Lex { position })?;

            let text = &rest[..len];
            trace!(
                "match rules[{}] = \"{}\" at position {} with len {}: {}",
                index,
                rule.source,
                position,
                len,
                text
            );

            if let Some(kind) = rule.kind {
                if len >= TOKEN_TEXT_CAPACITY {
                    return Err(ExprError::TokenTooLong { position, len });
                }
                if tokens.len() == MAX_TOKENS {
                    return Err(ExprError::TooManyTokens { limit: MAX_TOKENS });
                }
                tokens.push(Token::new(kind, text, position));
            }

            position += len;
        }

        resolve_derefs(&mut tokens);
        Ok(tokens)
    }
}

/// 共有の字句解析器で式をトークン列に分解する
pub fn tokenize(input: &str) -> std::result::Result<Vec<Token>, ExprError> {
    static LEXER: OnceLock<Lexer> = OnceLock::new();
    LEXER
        .get_or_init(|| Lexer::new().expect("lexical rules must compile"))
        .tokenize(input)
}

/// 単項 `*` を参照外しに書き換える
///
/// 先頭の `*`、または直前がオペランドの末尾（数値・レジスタ・`)`）でない
/// `*` を [`TokenKind::Deref`] にする。
pub fn resolve_derefs(tokens: &mut [Token]) {
    for i in 0..tokens.len() {
        if tokens[i].kind != TokenKind::Star {
            continue;
        }
        if i == 0 || !tokens[i - 1].kind.ends_operand() {
            tokens[i].kind = TokenKind::Deref;
        }
    }
}
