//! 評価時に参照するエミュレータ状態へのインターフェース

use crate::{Result, Word};

/// ゲストメモリの読み取り
pub trait MemoryReader {
    /// 指定アドレスから1バイト読み取る
    fn read_u8(&self, addr: Word) -> Result<u8>;
}

/// レジスタ名から値への解決
pub trait RegisterResolver {
    /// レジスタ値を取得する
    ///
    /// `name` は `$` を含まないレジスタ名。存在しない場合は `None`。
    fn resolve(&self, name: &str) -> Option<Word>;
}
