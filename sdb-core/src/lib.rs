//! sdb デバッガのコア機能
//!
//! このクレートは、デバッガの中核となるロジックを提供します。
//! エミュレータ状態、式評価エンジン、ウォッチポイント管理を統合します。

pub mod command;
pub mod debugger;
pub mod errors;
pub mod parse;
pub mod watchpoint;

pub use command::{Command, InfoTarget, COMMANDS};
pub use debugger::{Debugger, MachineConfig};
pub use watchpoint::{
    BaselinePolicy, Watchpoint, WatchpointError, WatchpointHit, WatchpointId, WatchpointManager,
};

// 他のクレートから使用するために再エクスポート
pub use sdb_expr::{ExprError, Word};

/// デバッガの結果型
pub type Result<T> = anyhow::Result<T>;
