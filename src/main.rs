// src/main.rs
//! Realm VM
//!
//! Runs instruction batches through the two-realm VM with the built-in
//! instruction types registered.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use realm_vm::observability::{init_metrics, init_tracing};
use realm_vm::vm::{register_builtins, InstructionTypeRegistry, Runner, SymbolTable, VmContext};
use realm_vm::{EngineError, VmConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

/// Two-realm instruction VM
#[derive(Debug, Parser)]
#[command(name = "realm-vm")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Configuration file path.
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a serialized instruction batch (YAML or JSON).
    Run {
        /// Batch file; `-` reads standard input.
        batch: PathBuf,

        /// Print the run report as JSON.
        #[arg(long)]
        json: bool,

        /// Print collected metrics in Prometheus text format after the run.
        #[arg(long)]
        metrics: bool,
    },

    /// List registered instruction types.
    ListTypes,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let fatal = e
                .downcast_ref::<EngineError>()
                .is_some_and(EngineError::is_fatal);
            error!(fatal, "{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: Cli) -> Result<()> {
    let config = VmConfig::load_from(cli.config.as_deref()).context("loading configuration")?;
    init_tracing(config.observability.log_format)?;

    let mut registry = InstructionTypeRegistry::new();
    register_builtins(&mut registry, Arc::new(SymbolTable::with_resource(&config.resource)))?;

    match cli.command {
        Command::ListTypes => {
            for instr_type in registry.iter() {
                println!(
                    "{:<14} {:<7} opcode={:<3} affinity={:<10} operands={}",
                    instr_type.name(),
                    instr_type.realm(),
                    instr_type.opcode(),
                    instr_type.affinity(),
                    instr_type.operand_layout().type_name
                );
            }
            Ok(())
        }
        Command::Run { batch, json, metrics } => {
            let metrics_handle = if config.observability.metrics {
                Some(init_metrics()?)
            } else {
                None
            };

            let text = if batch.as_os_str() == "-" {
                std::io::read_to_string(std::io::stdin()).context("reading batch from stdin")?
            } else {
                std::fs::read_to_string(&batch)
                    .with_context(|| format!("reading batch file {}", batch.display()))?
            };

            info!(version = realm_vm::VERSION, batch = %batch.display(), "starting run");
            let mut runner = Runner::new(VmContext::new(&config, registry)?);
            let report = runner.run(&text)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "submitted {} (local {}, remote {}), executed {} in {} passes, {} us",
                    report.submitted.total(),
                    report.submitted.local,
                    report.submitted.remote,
                    report.executed.total(),
                    report.passes,
                    report.elapsed_us
                );
            }

            if let (true, Some(handle)) = (metrics, metrics_handle) {
                print!("{}", handle.render());
            }
            Ok(())
        }
    }
}
