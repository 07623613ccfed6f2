//! レジスタファイル（RISC-V 汎用レジスタ + pc）

use crate::Result;
use sdb_expr::Word;

/// 汎用レジスタのABI名（インデックス順）
pub const GPR_NAMES: [&str; 32] = [
    "$0", "ra", "sp", "gp", "tp", "t0", "t1", "t2", "s0", "s1", "a0", "a1", "a2", "a3", "a4",
    "a5", "a6", "a7", "s2", "s3", "s4", "s5", "s6", "s7", "s8", "s9", "s10", "s11", "t3", "t4",
    "t5", "t6",
];

/// レジスタファイル
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registers {
    gpr: [Word; 32],
    pc: Word,
}

impl Registers {
    /// 全レジスタを0、pcを `pc` で初期化する
    pub fn new(pc: Word) -> Self {
        Self { gpr: [0; 32], pc }
    }

    /// レジスタ名から汎用レジスタ番号を求める
    ///
    /// ABI名（`$` なし）、`xN`、`fp`（= `s0`）を受け付ける。
    pub fn index_of(name: &str) -> Option<usize> {
        if let Some(index) = GPR_NAMES
            .iter()
            .position(|n| n.trim_start_matches('$') == name)
        {
            return Some(index);
        }
        if name == "fp" {
            return Some(8);
        }
        name.strip_prefix('x')
            .and_then(|n| n.parse::<usize>().ok())
            .filter(|&i| i < GPR_NAMES.len())
    }

    /// 汎用レジスタを読み取る
    pub fn gpr(&self, index: usize) -> Word {
        self.gpr[index]
    }

    /// 汎用レジスタに書き込む（`$0` への書き込みは無視される）
    pub fn set_gpr(&mut self, index: usize, value: Word) {
        if index != 0 {
            self.gpr[index] = value;
        }
    }

    /// プログラムカウンタを取得する
    pub fn get_pc(&self) -> Word {
        self.pc
    }

    /// プログラムカウンタを設定する
    pub fn set_pc(&mut self, pc: Word) {
        self.pc = pc;
    }

    /// 名前でレジスタを読み取る
    pub fn get(&self, name: &str) -> Option<Word> {
        if name == "pc" {
            return Some(self.pc);
        }
        Self::index_of(name).map(|i| self.gpr[i])
    }

    /// 名前でレジスタに書き込む
    pub fn set(&mut self, name: &str, value: Word) -> Result<()> {
        if name == "pc" {
            self.pc = value;
            return Ok(());
        }
        let index =
            Self::index_of(name).ok_or_else(|| anyhow::anyhow!("Unknown register '{}'", name))?;
        self.set_gpr(index, value);
        Ok(())
    }

    /// 表示用に全レジスタを列挙する（pc は最後）
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, Word)> + '_ {
        GPR_NAMES
            .iter()
            .copied()
            .zip(self.gpr.iter().copied())
            .chain(std::iter::once(("pc", self.pc)))
    }
}

impl sdb_expr::RegisterResolver for Registers {
    fn resolve(&self, name: &str) -> Option<Word> {
        self.get(name)
    }
}
