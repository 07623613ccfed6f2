//! 式評価のエラー型

use crate::Word;
use thiserror::Error;

/// 字句解析・評価で発生するエラー
#[derive(Error, Debug)]
pub enum ExprError {
    /// どの字句規則にもマッチしない
    #[error("no match at position {position}")]
    Lex { position: usize },

    /// トークン文字列がバッファ容量を超える
    #[error("token at position {position} is too long ({len} bytes)")]
    TokenTooLong { position: usize, len: usize },

    /// トークン数が上限を超える
    #[error("expression has more than {limit} tokens")]
    TooManyTokens { limit: usize },

    /// 括弧の不整合、空の範囲、演算子の欠落など
    #[error("malformed expression: {0}")]
    Malformed(String),

    /// ワードに収まらない数値リテラル
    #[error("invalid number literal '{0}'")]
    InvalidNumber(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("unknown register '${0}'")]
    UnknownRegister(String),

    /// メモリ読み取りの失敗（メモリ層のエラーをそのまま保持する）
    #[error("failed to read memory at 0x{addr:x}")]
    Memory {
        addr: Word,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

impl ExprError {
    pub fn malformed(message: impl Into<String>) -> Self {
        ExprError::Malformed(message.into())
    }

    /// 字句解析段階のエラーかどうか
    pub fn is_lexical(&self) -> bool {
        matches!(
            self,
            ExprError::Lex { .. } | ExprError::TokenTooLong { .. } | ExprError::TooManyTokens { .. }
        )
    }
}
