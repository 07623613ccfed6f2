//! デバッガコマンド

use crate::errors::{ERR_INFO_TARGET, ERR_MISSING_ARGUMENT, ERR_MISSING_EXPRESSION, ERR_UNKNOWN_COMMAND};
use crate::parse::parse_count;
use crate::{Result, WatchpointId};

/// コマンド一覧（名前, 説明）
pub const COMMANDS: &[(&str, &str)] = &[
    ("help", "Display information about all supported commands"),
    ("q", "Exit the debugger"),
    ("info", "Print program status: 'info r' for registers, 'info w' for watchpoints"),
    ("x", "Scan memory: 'x N EXPR' prints N 4-byte words starting at EXPR"),
    ("p", "Evaluate an expression: 'p EXPR'"),
    ("w", "Set a watchpoint on an expression: 'w EXPR'"),
    ("d", "Delete a watchpoint: 'd N'"),
];

/// `info` コマンドの対象
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoTarget {
    Registers,
    Watchpoints,
}

/// デバッガコマンド
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// ヘルプ表示（コマンド名指定可）
    Help(Option<String>),
    /// 終了
    Quit,
    /// 状態表示
    Info(InfoTarget),
    /// メモリ走査
    Examine { count: usize, expr: String },
    /// 式の評価
    Print(String),
    /// ウォッチポイント設定
    Watch(String),
    /// ウォッチポイント削除
    Delete(WatchpointId),
}

impl Command {
    /// コマンド文字列をパースする
    ///
    /// 最初の単語をコマンド名とし、残りを引数として扱う。
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        let (name, args) = match input.split_once(char::is_whitespace) {
            Some((name, args)) => (name, args.trim()),
            None => (input, ""),
        };

        match name {
            "help" | "h" | "?" => {
                let topic = args.split_whitespace().next().map(str::to_string);
                Ok(Command::Help(topic))
            }
            "q" | "quit" | "exit" => Ok(Command::Quit),
            "info" | "i" => match args.chars().next() {
                Some('r') => Ok(Command::Info(InfoTarget::Registers)),
                Some('w') => Ok(Command::Info(InfoTarget::Watchpoints)),
                _ => Err(anyhow::anyhow!(ERR_INFO_TARGET)),
            },
            "x" => {
                let (count, expr) = args
                    .split_once(char::is_whitespace)
                    .ok_or_else(|| anyhow::anyhow!("{}: x N EXPR", ERR_MISSING_ARGUMENT))?;
                Ok(Command::Examine {
                    count: parse_count(count)?,
                    expr: expr.trim().to_string(),
                })
            }
            "p" | "print" => Ok(Command::Print(require_expression(args)?)),
            "w" | "watch" => Ok(Command::Watch(require_expression(args)?)),
            "d" | "delete" => {
                if args.is_empty() {
                    return Err(anyhow::anyhow!("{}: d N", ERR_MISSING_ARGUMENT));
                }
                Ok(Command::Delete(parse_count(args)?))
            }
            _ => Err(anyhow::anyhow!("{} '{}'", ERR_UNKNOWN_COMMAND, name)),
        }
    }

    /// コマンド名から説明を取得する
    pub fn describe(name: &str) -> Option<&'static str> {
        COMMANDS
            .iter()
            .find(|(command, _)| *command == name)
            .map(|(_, description)| *description)
    }
}

fn require_expression(args: &str) -> Result<String> {
    if args.is_empty() {
        return Err(anyhow::anyhow!(ERR_MISSING_EXPRESSION));
    }
    Ok(args.to_string())
}
