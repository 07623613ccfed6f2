//! パース関連のユーティリティ関数

use anyhow::Result;
use sdb_expr::Word;

/// 数値文字列をパースする
///
/// 16進数（0xプレフィックス付き）または10進数をサポート
///
/// # Examples
/// ```
/// use sdb_core::parse::parse_number;
///
/// assert_eq!(parse_number("0x80000000").unwrap(), 0x8000_0000);
/// assert_eq!(parse_number("1234").unwrap(), 1234);
/// ```
pub fn parse_number(s: &str) -> Result<Word> {
    let s = s.trim();

    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => Word::from_str_radix(hex, 16)
            .map_err(|e| anyhow::anyhow!("Invalid hexadecimal number '{}': {}", s, e)),
        None => s
            .parse::<Word>()
            .map_err(|e| anyhow::anyhow!("Invalid number '{}': {}", s, e)),
    }
}

/// 個数やIDなどの非負整数をパースする
pub fn parse_count(s: &str) -> Result<usize> {
    let value = parse_number(s)?;
    usize::try_from(value).map_err(|_| anyhow::anyhow!("Number '{}' is too large", s.trim()))
}
