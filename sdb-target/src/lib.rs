//! sdb エミュレータ状態
//!
//! このクレートは、デバッグ対象となるエミュレータのゲスト物理メモリと
//! レジスタファイルを提供します。どちらも式評価エンジンのトレイトを実装し、
//! 式から `*addr` や `$reg` として参照できます。

pub mod memory;
pub mod registers;

pub use memory::{Memory, MemoryError, MemoryReadable, DEFAULT_MEM_BASE, DEFAULT_MEM_SIZE};
pub use registers::{Registers, GPR_NAMES};

/// ターゲット状態の結果型
pub type Result<T> = anyhow::Result<T>;
