//! デバッガのメインロジック

use crate::watchpoint::{BaselinePolicy, WatchpointManager, DEFAULT_CAPACITY};
use crate::{Result, Watchpoint, WatchpointHit, WatchpointId};
use sdb_expr::{ExpressionEvaluator, Lexer, Word};
use sdb_target::{Memory, Registers, DEFAULT_MEM_BASE, DEFAULT_MEM_SIZE};
use std::path::Path;
use tracing::info;

/// `x` コマンドが1回に読む単位（バイト）
const EXAMINE_UNIT: Word = 4;

/// エミュレータとデバッガの設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineConfig {
    /// 物理メモリのベースアドレス（pc の初期値でもある）
    pub mem_base: Word,
    /// 物理メモリのサイズ
    pub mem_size: usize,
    /// ウォッチポイントプールの容量
    pub watchpoint_capacity: usize,
    /// ヒット後の基準値の扱い
    pub baseline_policy: BaselinePolicy,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            mem_base: DEFAULT_MEM_BASE,
            mem_size: DEFAULT_MEM_SIZE,
            watchpoint_capacity: DEFAULT_CAPACITY,
            baseline_policy: BaselinePolicy::default(),
        }
    }
}

/// デバッガ
pub struct Debugger {
    /// ゲスト物理メモリ
    memory: Memory,
    /// レジスタファイル
    registers: Registers,
    /// 式の字句解析器
    lexer: Lexer,
    /// ウォッチポイント管理
    watchpoints: WatchpointManager,
}

impl Debugger {
    /// 新しいデバッガを作成する
    pub fn new(config: MachineConfig) -> Result<Self> {
        Ok(Self {
            memory: Memory::new(config.mem_base, config.mem_size),
            registers: Registers::new(config.mem_base),
            lexer: Lexer::new()?,
            watchpoints: WatchpointManager::with_policy(
                config.watchpoint_capacity,
                config.baseline_policy,
            ),
        })
    }

    /// 現在の状態に対する式評価器を作成する
    pub fn evaluator(&self) -> ExpressionEvaluator<'_> {
        ExpressionEvaluator::new(&self.lexer, &self.memory, &self.registers)
    }

    /// 式を評価する
    pub fn evaluate(&self, expr: &str) -> Result<Word> {
        Ok(self.evaluator().evaluate(expr)?)
    }

    /// 式の値をアドレスとして、4バイト単位で `count` 個読み取る
    pub fn examine(&self, count: usize, expr: &str) -> Result<Vec<(Word, u32)>> {
        let start = self.evaluate(expr)?;
        (0..count as Word)
            .map(|i| -> Result<(Word, u32)> {
                let addr = start.wrapping_add(i * EXAMINE_UNIT);
                Ok((addr, self.memory.read_u32(addr)?))
            })
            .collect()
    }

    /// ウォッチポイントを設定する
    pub fn add_watchpoint(&mut self, expr: &str) -> Result<WatchpointId> {
        let evaluator = ExpressionEvaluator::new(&self.lexer, &self.memory, &self.registers);
        Ok(self.watchpoints.create(expr, &evaluator)?)
    }

    /// ウォッチポイントを削除する
    pub fn remove_watchpoint(&mut self, id: WatchpointId) -> Result<()> {
        Ok(self.watchpoints.delete(id)?)
    }

    /// ウォッチポイントを取得する
    pub fn watchpoint(&self, id: WatchpointId) -> Option<&Watchpoint> {
        self.watchpoints.get(id)
    }

    /// すべてのウォッチポイントを新しい順に取得する
    pub fn watchpoints(&self) -> impl Iterator<Item = &Watchpoint> {
        self.watchpoints.iter()
    }

    /// 実行停止時に呼び出し、値が変化したウォッチポイントを返す
    pub fn check_watchpoints(&mut self) -> Vec<WatchpointHit> {
        let evaluator = ExpressionEvaluator::new(&self.lexer, &self.memory, &self.registers);
        self.watchpoints.check_all(&evaluator)
    }

    /// バイナリイメージを物理メモリの先頭に読み込む
    pub fn load_image<P: AsRef<Path>>(&mut self, path: P) -> Result<usize> {
        let path = path.as_ref();
        let image = std::fs::read(path)
            .map_err(|e| anyhow::anyhow!("Failed to read image {}: {}", path.display(), e))?;
        self.memory.load_image(&image)?;
        info!("image {} loaded ({} bytes)", path.display(), image.len());
        Ok(image.len())
    }

    /// メモリアクセスを取得する
    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    /// メモリアクセスを可変参照で取得する
    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    /// レジスタアクセスを取得する
    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    /// レジスタアクセスを可変参照で取得する
    pub fn registers_mut(&mut self) -> &mut Registers {
        &mut self.registers
    }
}
