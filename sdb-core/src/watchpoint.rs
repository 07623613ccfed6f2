//! ウォッチポイント管理
//!
//! 固定容量のスロット配列を、使用中リストと空きリストの2つに分割して
//! 管理します。どのスロットも常にちょうど一方のリストに属します。

use sdb_expr::{ExprError, ExpressionEvaluator, Word};
use std::collections::VecDeque;
use thiserror::Error;
use tracing::{debug, info, warn};

/// ウォッチポイントID
pub type WatchpointId = usize;

/// 既定のプール容量
pub const DEFAULT_CAPACITY: usize = 32;

/// 式文字列のバッファ容量（有効な文字数はこれより1少ない）
pub const EXPRESSION_CAPACITY: usize = 32;

/// ウォッチポイント操作のエラー
#[derive(Error, Debug)]
pub enum WatchpointError {
    #[error("invalid expression: {0}")]
    InvalidExpression(#[from] ExprError),

    #[error("expression is too long ({len} bytes)")]
    ExpressionTooLong { len: usize },

    #[error("no free watchpoint left (capacity {capacity})")]
    PoolExhausted { capacity: usize },

    #[error("watchpoint {0} not found")]
    NotFound(WatchpointId),
}

/// ウォッチポイント
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Watchpoint {
    pub id: WatchpointId,
    /// 監視する式
    pub expression: String,
    /// 比較の基準値
    pub baseline: Word,
}

/// 基準値と異なる値になったウォッチポイント
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchpointHit {
    pub id: WatchpointId,
    pub expression: String,
    pub baseline: Word,
    /// 再評価した値（評価に失敗した場合は `None`）
    pub current: Option<Word>,
}

/// ヒット後の基準値の扱い
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BaselinePolicy {
    /// 基準値を更新しない（値が戻るまで毎回ヒットする）
    #[default]
    Keep,
    /// ヒットした値を新しい基準値にする
    Refresh,
}

/// ウォッチポイントマネージャ
pub struct WatchpointManager {
    /// IDをインデックスとするスロット（空きスロットは `None`）
    slots: Vec<Option<Watchpoint>>,
    /// 使用中リスト（新しいものが先頭）
    active: VecDeque<WatchpointId>,
    /// 空きリスト
    free: VecDeque<WatchpointId>,
    policy: BaselinePolicy,
}

impl WatchpointManager {
    /// 全スロットが空きの状態で作成する
    pub fn new(capacity: usize) -> Self {
        Self::with_policy(capacity, BaselinePolicy::default())
    }

    pub fn with_policy(capacity: usize, policy: BaselinePolicy) -> Self {
        Self {
            slots: vec![None; capacity],
            active: VecDeque::with_capacity(capacity),
            free: (0..capacity).collect(),
            policy,
        }
    }

    pub fn policy(&self) -> BaselinePolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: BaselinePolicy) {
        self.policy = policy;
    }

    /// プール容量
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// 使用中のウォッチポイント数
    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// 空きスロット数
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// 空きリストの先頭スロットを使用中リストの先頭に移す
    pub fn acquire(
        &mut self,
        expression: String,
        baseline: Word,
    ) -> Result<WatchpointId, WatchpointError> {
        let id = self.free.pop_front().ok_or(WatchpointError::PoolExhausted {
            capacity: self.capacity(),
        })?;

        self.slots[id] = Some(Watchpoint {
            id,
            expression,
            baseline,
        });
        self.active.push_front(id);
        debug!("acquired watchpoint slot {}", id);
        self.debug_check_partition();
        Ok(id)
    }

    /// 使用中のスロットを空きリストの先頭に戻す
    pub fn release(&mut self, id: WatchpointId) -> Result<(), WatchpointError> {
        let slot = self
            .slots
            .get_mut(id)
            .filter(|slot| slot.is_some())
            .ok_or(WatchpointError::NotFound(id))?;

        let position = self
            .active
            .iter()
            .position(|&active| active == id)
            .unwrap_or_else(|| panic!("watchpoint {} is occupied but not in the active list", id));

        self.active.remove(position);
        *slot = None;
        self.free.push_front(id);
        debug!("released watchpoint slot {}", id);
        self.debug_check_partition();
        Ok(())
    }

    /// 式を評価して基準値とし、ウォッチポイントを作成する
    pub fn create(
        &mut self,
        expression: &str,
        evaluator: &ExpressionEvaluator<'_>,
    ) -> Result<WatchpointId, WatchpointError> {
        let expression = expression.trim();
        if expression.len() >= EXPRESSION_CAPACITY {
            return Err(WatchpointError::ExpressionTooLong {
                len: expression.len(),
            });
        }

        let baseline = evaluator.evaluate(expression)?;
        let id = self.acquire(expression.to_string(), baseline)?;
        info!("watchpoint {} set at {} (value = {})", id, expression, baseline);
        Ok(id)
    }

    /// ウォッチポイントを削除する
    pub fn delete(&mut self, id: WatchpointId) -> Result<(), WatchpointError> {
        self.release(id)?;
        info!("watchpoint {} deleted", id);
        Ok(())
    }

    /// ウォッチポイントを取得する
    pub fn get(&self, id: WatchpointId) -> Option<&Watchpoint> {
        self.slots.get(id).and_then(Option::as_ref)
    }

    /// 使用中のウォッチポイントを新しい順に取得する
    pub fn list(&self) -> Vec<&Watchpoint> {
        self.iter().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Watchpoint> {
        self.active.iter().filter_map(|&id| self.slots[id].as_ref())
    }

    /// 全ウォッチポイントを再評価し、基準値と異なるものを返す
    pub fn check_all(&mut self, evaluator: &ExpressionEvaluator<'_>) -> Vec<WatchpointHit> {
        let mut hits = Vec::new();

        for &id in &self.active {
            let wp = self.slots[id]
                .as_mut()
                .expect("active watchpoint slot must be occupied");

            let current = match evaluator.evaluate(&wp.expression) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!("failed to re-evaluate watchpoint {} ({}): {}", id, wp.expression, e);
                    None
                }
            };

            if current == Some(wp.baseline) {
                continue;
            }

            info!("program hits watchpoint {}: {}", id, wp.expression);
            hits.push(WatchpointHit {
                id,
                expression: wp.expression.clone(),
                baseline: wp.baseline,
                current,
            });

            if let (BaselinePolicy::Refresh, Some(value)) = (self.policy, current) {
                wp.baseline = value;
            }
        }

        hits
    }

    fn debug_check_partition(&self) {
        debug_assert_eq!(self.active.len() + self.free.len(), self.slots.len());
        debug_assert!(self.active.iter().all(|&id| self.slots[id].is_some()));
        debug_assert!(self.free.iter().all(|&id| self.slots[id].is_none()));
    }
}

impl Default for WatchpointManager {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdb_expr::{Lexer, MemoryReader, RegisterResolver};
    use std::cell::Cell;

    /// a0 だけを持つテスト用ターゲット
    struct FakeTarget {
        a0: Cell<Word>,
    }

    impl MemoryReader for FakeTarget {
        fn read_u8(&self, addr: Word) -> sdb_expr::Result<u8> {
            Err(anyhow::anyhow!("no memory at 0x{:x}", addr))
        }
    }

    impl RegisterResolver for FakeTarget {
        fn resolve(&self, name: &str) -> Option<Word> {
            (name == "a0").then(|| self.a0.get())
        }
    }

    fn fixture() -> (Lexer, FakeTarget) {
        (
            Lexer::new().unwrap(),
            FakeTarget {
                a0: Cell::new(1),
            },
        )
    }

    #[test]
    fn test_initial_state() {
        let manager = WatchpointManager::new(4);
        assert_eq!(manager.capacity(), 4);
        assert_eq!(manager.free_count(), 4);
        assert!(manager.is_empty());
        assert!(manager.list().is_empty());
    }

    #[test]
    fn test_acquire_order() {
        let mut manager = WatchpointManager::new(4);
        assert_eq!(manager.acquire("1".into(), 1).unwrap(), 0);
        assert_eq!(manager.acquire("2".into(), 2).unwrap(), 1);
        assert_eq!(manager.acquire("3".into(), 3).unwrap(), 2);

        // 新しいものが先頭
        let ids: Vec<_> = manager.iter().map(|wp| wp.id).collect();
        assert_eq!(ids, vec![2, 1, 0]);
    }

    #[test]
    fn test_release_returns_slot_to_free_head() {
        let mut manager = WatchpointManager::new(4);
        for i in 0..3 {
            manager.acquire(i.to_string(), i).unwrap();
        }

        // 中間のスロットを解放すると次の取得で再利用される
        manager.release(1).unwrap();
        assert_eq!(manager.len(), 2);
        assert_eq!(manager.free_count(), 2);
        assert!(manager.get(1).is_none());

        let ids: Vec<_> = manager.iter().map(|wp| wp.id).collect();
        assert_eq!(ids, vec![2, 0]);

        assert_eq!(manager.acquire("again".into(), 0).unwrap(), 1);
        assert_eq!(manager.acquire("next".into(), 0).unwrap(), 3);
    }

    #[test]
    fn test_release_not_found() {
        let mut manager = WatchpointManager::new(2);
        assert!(matches!(manager.release(0), Err(WatchpointError::NotFound(0))));
        assert!(matches!(manager.release(7), Err(WatchpointError::NotFound(7))));

        manager.acquire("1".into(), 1).unwrap();
        manager.release(0).unwrap();
        assert!(matches!(manager.release(0), Err(WatchpointError::NotFound(0))));
    }

    #[test]
    fn test_pool_exhausted() {
        let (lexer, target) = fixture();
        let evaluator = ExpressionEvaluator::new(&lexer, &target, &target);
        let mut manager = WatchpointManager::new(DEFAULT_CAPACITY);

        for _ in 0..DEFAULT_CAPACITY {
            manager.create("1+1", &evaluator).unwrap();
        }
        assert!(matches!(
            manager.create("1+1", &evaluator),
            Err(WatchpointError::PoolExhausted { capacity: DEFAULT_CAPACITY })
        ));

        manager.delete(5).unwrap();
        assert_eq!(manager.create("2+2", &evaluator).unwrap(), 5);
        assert!(matches!(
            manager.create("1+1", &evaluator),
            Err(WatchpointError::PoolExhausted { .. })
        ));
    }

    #[test]
    fn test_create_invalid_expression() {
        let (lexer, target) = fixture();
        let evaluator = ExpressionEvaluator::new(&lexer, &target, &target);
        let mut manager = WatchpointManager::new(2);

        assert!(matches!(
            manager.create("4/0", &evaluator),
            Err(WatchpointError::InvalidExpression(ExprError::DivisionByZero))
        ));
        assert!(matches!(
            manager.create("$nosuch", &evaluator),
            Err(WatchpointError::InvalidExpression(ExprError::UnknownRegister(_)))
        ));
        // 失敗してもプールは変化しない
        assert_eq!(manager.free_count(), 2);
        assert!(manager.is_empty());
    }

    #[test]
    fn test_create_expression_too_long() {
        let (lexer, target) = fixture();
        let evaluator = ExpressionEvaluator::new(&lexer, &target, &target);
        let mut manager = WatchpointManager::new(2);

        let long = vec!["1"; 16].join("+");
        assert_eq!(long.len(), 31);
        assert!(manager.create(&long, &evaluator).is_ok());

        let too_long = long + "+1";
        assert!(matches!(
            manager.create(&too_long, &evaluator),
            Err(WatchpointError::ExpressionTooLong { len: 33 })
        ));
    }

    #[test]
    fn test_check_all_keeps_baseline() {
        let (lexer, target) = fixture();
        let mut manager = WatchpointManager::new(4);

        let evaluator = ExpressionEvaluator::new(&lexer, &target, &target);
        let constant = manager.create("1+1", &evaluator).unwrap();
        let watched = manager.create("$a0 + 1", &evaluator).unwrap();
        assert_eq!(manager.get(constant).unwrap().baseline, 2);
        assert_eq!(manager.get(watched).unwrap().baseline, 2);
        assert!(manager.check_all(&evaluator).is_empty());

        target.a0.set(10);
        let hits = manager.check_all(&evaluator);
        assert_eq!(
            hits,
            vec![WatchpointHit {
                id: watched,
                expression: "$a0 + 1".to_string(),
                baseline: 2,
                current: Some(11),
            }]
        );

        // 基準値は更新されないので再びヒットする
        assert_eq!(manager.check_all(&evaluator).len(), 1);
        assert_eq!(manager.get(watched).unwrap().baseline, 2);

        manager.delete(watched).unwrap();
        assert!(manager.check_all(&evaluator).is_empty());
    }

    #[test]
    fn test_check_all_refresh_baseline() {
        let (lexer, target) = fixture();
        let evaluator = ExpressionEvaluator::new(&lexer, &target, &target);
        let mut manager = WatchpointManager::with_policy(4, BaselinePolicy::Refresh);

        let id = manager.create("$a0", &evaluator).unwrap();
        target.a0.set(3);
        assert_eq!(manager.check_all(&evaluator).len(), 1);
        assert_eq!(manager.get(id).unwrap().baseline, 3);
        assert!(manager.check_all(&evaluator).is_empty());
    }

    #[test]
    fn test_check_all_order_and_eval_failure() {
        let (lexer, target) = fixture();
        let evaluator = ExpressionEvaluator::new(&lexer, &target, &target);
        let mut manager = WatchpointManager::new(4);

        let first = manager.create("$a0", &evaluator).unwrap();
        let second = manager.create("10/$a0", &evaluator).unwrap();

        // a0 = 0 で 10/$a0 はゼロ除算になる
        target.a0.set(0);
        let hits = manager.check_all(&evaluator);
        let ids: Vec<_> = hits.iter().map(|hit| hit.id).collect();
        assert_eq!(ids, vec![second, first]);
        assert_eq!(hits[0].current, None);
        assert_eq!(hits[1].current, Some(0));
    }
}
