//! sdb CLI - コマンドラインインターフェース
//!
//! エミュレータ用簡易デバッガ sdb のREPLインターフェース

use anyhow::Result;
use clap::{Parser, Subcommand};
use sdb_core::parse::{parse_count, parse_number};
use sdb_core::{
    BaselinePolicy, Command, Debugger, ExprError, InfoTarget, MachineConfig, COMMANDS,
};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// 履歴ファイル名（ホームディレクトリ直下）
const HISTORY_FILE: &str = ".sdb_history";

/// sdb - Simple Debugger for an emulated machine
#[derive(Parser)]
#[command(name = "sdb")]
#[command(version)]
#[command(about = "Expression evaluator and watchpoints for an emulated machine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: SdbCommand,
}

/// マシン構成の共通オプション
#[derive(clap::Args)]
struct MachineArgs {
    /// Physical memory base address (also the initial pc)
    #[arg(long, default_value = "0x80000000", value_parser = parse_number)]
    base: u64,

    /// Physical memory size in bytes
    #[arg(long, default_value = "0x8000000", value_parser = parse_count)]
    mem_size: usize,

    /// Raw binary image loaded at the base address
    #[arg(short, long)]
    image: Option<PathBuf>,
}

#[derive(Subcommand)]
enum SdbCommand {
    /// Start the interactive debugger
    Run {
        #[command(flatten)]
        machine: MachineArgs,

        /// Number of watchpoint slots
        #[arg(long, default_value_t = 32)]
        capacity: usize,

        /// Replace a watchpoint's baseline with the new value after each hit
        #[arg(long)]
        refresh_baseline: bool,
    },

    /// Evaluate one expression and exit
    Eval {
        #[command(flatten)]
        machine: MachineArgs,

        /// Expression to evaluate
        expression: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        SdbCommand::Run {
            machine,
            capacity,
            refresh_baseline,
        } => {
            let policy = if refresh_baseline {
                BaselinePolicy::Refresh
            } else {
                BaselinePolicy::Keep
            };
            let mut debugger = init_debugger(&machine, capacity, policy)?;
            println!("sdb - Simple Debugger");
            println!("Version {}", env!("CARGO_PKG_VERSION"));
            println!();
            run_repl(&mut debugger)?;
        }
        SdbCommand::Eval {
            machine,
            expression,
        } => {
            let debugger = init_debugger(&machine, 0, BaselinePolicy::Keep)?;
            match debugger.evaluate(&expression) {
                Ok(value) => println!("{}", format_value(value)),
                Err(e) => {
                    report_error(&expression, &e);
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}

/// デバッガを初期化してイメージを読み込む
fn init_debugger(machine: &MachineArgs, capacity: usize, policy: BaselinePolicy) -> Result<Debugger> {
    let mut debugger = Debugger::new(MachineConfig {
        mem_base: machine.base,
        mem_size: machine.mem_size,
        watchpoint_capacity: capacity,
        baseline_policy: policy,
    })?;

    if let Some(image) = &machine.image {
        let size = debugger.load_image(image)?;
        println!("Loaded {} bytes from {} at 0x{:x}", size, image.display(), machine.base);
    }

    Ok(debugger)
}

/// REPLループを実行する
fn run_repl(debugger: &mut Debugger) -> Result<()> {
    println!("Type 'help' for available commands, 'q' to exit.");
    println!();

    let mut rl = DefaultEditor::new()?;
    let history = home::home_dir().map(|dir| dir.join(HISTORY_FILE));
    if let Some(path) = &history {
        // 初回起動時は履歴ファイルが存在しない
        let _ = rl.load_history(path);
    }

    loop {
        let readline = rl.readline("(sdb) ");
        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                rl.add_history_entry(line)?;

                match Command::parse(line) {
                    Ok(Command::Quit) => break,
                    Ok(command) => handle_command(debugger, command),
                    Err(e) => println!("{}", e),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    if let Some(path) = &history {
        if let Err(e) = rl.save_history(path) {
            tracing::warn!("Failed to save history to {}: {}", path.display(), e);
        }
    }

    Ok(())
}

fn handle_command(debugger: &mut Debugger, command: Command) {
    match command {
        Command::Help(topic) => print_help(topic.as_deref()),
        Command::Info(InfoTarget::Registers) => print_registers(debugger),
        Command::Info(InfoTarget::Watchpoints) => print_watchpoints(debugger),
        Command::Examine { count, expr } => handle_examine(debugger, count, &expr),
        Command::Print(expr) => match debugger.evaluate(&expr) {
            Ok(value) => println!("{} = {}", expr, format_value(value)),
            Err(e) => report_error(&expr, &e),
        },
        Command::Watch(expr) => match debugger.add_watchpoint(&expr) {
            Ok(id) => {
                let baseline = debugger.watchpoint(id).map(|wp| wp.baseline).unwrap_or_default();
                println!("Watchpoint {}: {} (value = {})", id, expr, format_value(baseline));
            }
            Err(e) => report_error(&expr, &e),
        },
        Command::Delete(id) => match debugger.remove_watchpoint(id) {
            Ok(()) => println!("Watchpoint {} deleted", id),
            Err(e) => println!("Error: {}", e),
        },
        Command::Quit => {}
    }

    report_watchpoint_hits(debugger);
}

/// 停止イベントごとにウォッチポイントを確認して報告する
fn report_watchpoint_hits(debugger: &mut Debugger) {
    for hit in debugger.check_watchpoints() {
        let current = hit
            .current
            .map(format_value)
            .unwrap_or_else(|| "<error>".to_string());
        println!(
            "Hit watchpoint {}: {}  (old = {}, new = {})",
            hit.id,
            hit.expression,
            format_value(hit.baseline),
            current
        );
    }
}

/// Examineコマンドを処理する
fn handle_examine(debugger: &Debugger, count: usize, expr: &str) {
    match debugger.examine(count, expr) {
        Ok(words) => {
            for (addr, word) in words {
                println!("0x{:08x}: 0x{:08x}", addr, word);
            }
        }
        Err(e) => report_error(expr, &e),
    }
}

fn print_registers(debugger: &Debugger) {
    for (name, value) in debugger.registers().iter() {
        println!("{:<4} 0x{:016x} {}", name, value, value);
    }
}

fn print_watchpoints(debugger: &Debugger) {
    let mut any = false;
    for wp in debugger.watchpoints() {
        println!("Watchpoint {}: {} (value = {})", wp.id, wp.expression, format_value(wp.baseline));
        any = true;
    }
    if !any {
        println!("No watchpoints");
    }
}

fn format_value(value: u64) -> String {
    format!("{} (0x{:x})", value, value)
}

/// エラーを表示する（字句エラーは位置を示す）
fn report_error(expr: &str, error: &anyhow::Error) {
    let position = error.chain().find_map(|cause| match cause.downcast_ref::<ExprError>() {
        Some(ExprError::Lex { position }) | Some(ExprError::TokenTooLong { position, .. }) => {
            Some(*position)
        }
        _ => None,
    });

    println!("Error: {}", error);
    if let Some(position) = position {
        println!("  {}", expr.trim());
        println!("  {}^", " ".repeat(position.saturating_sub(leading_spaces(expr))));
    }
}

fn leading_spaces(s: &str) -> usize {
    s.len() - s.trim_start().len()
}

fn print_help(topic: Option<&str>) {
    match topic {
        None => {
            println!("Available commands:");
            println!();
            for (name, description) in COMMANDS {
                println!("  {:<6} - {}", name, description);
            }
            println!();
            println!("Expressions:");
            println!("  numbers 42 0x2a, registers $sp $a0 $pc, * dereference (1 byte)");
            println!("  operators + - * / == != && and parentheses");
            println!();
            println!("Examples:");
            println!("  p ($a0 + 4) * 2");
            println!("  x 4 $sp");
            println!("  w *0x80000000");
        }
        Some(name) => match Command::describe(name) {
            Some(description) => println!("{} - {}", name, description),
            None => println!("Unknown command '{}'", name),
        },
    }
}
