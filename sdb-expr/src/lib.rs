//! sdb 式評価エンジン
//!
//! このクレートは、デバッガの `p` / `x` / `w` コマンドが使用する式の
//! 字句解析と評価を提供します。メモリとレジスタへのアクセスは
//! [`MemoryReader`] と [`RegisterResolver`] トレイト経由で行います。

pub mod context;
pub mod error;
pub mod eval;
pub mod lexer;
pub mod token;

pub use context::{MemoryReader, RegisterResolver};
pub use error::ExprError;
pub use eval::ExpressionEvaluator;
pub use lexer::{resolve_derefs, tokenize, Lexer, MAX_TOKENS, TOKEN_TEXT_CAPACITY};
pub use token::{Token, TokenKind};

/// マシンワード（評価値およびアドレスの型）
pub type Word = u64;

/// 式評価クレートの結果型
pub type Result<T> = anyhow::Result<T>;
