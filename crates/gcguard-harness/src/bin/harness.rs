//! CLI entrypoint for the gcguard harness.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use gcguard_harness::{HarnessError, LogEmitter, SelfCheckRunner};
use gcguard_membrane::allow_list::SAFE_FOREIGN_FUNCTIONS;
use gcguard_membrane::config::check_mode;

/// Tooling for the gcguard call-boundary guard.
#[derive(Debug, Parser)]
#[command(name = "gcguard-harness")]
#[command(about = "Self-check and inspection tooling for gcguard")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the guard scenario suite in-process and print a JSON summary.
    SelfCheck {
        /// Structured JSONL log path (discarded if omitted).
        #[arg(long)]
        log: Option<PathBuf>,
        /// Run identifier used as the trace-id prefix.
        #[arg(long, default_value = "self-check")]
        run_id: String,
    },
    /// Print the foreign-function allow-list, sorted.
    AllowList {
        /// Emit a JSON array instead of one name per line.
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    match cli.command {
        Command::SelfCheck { log, run_id } => {
            let mode = check_mode();
            let mut emitter = match &log {
                Some(path) => {
                    eprintln!("Writing structured log to {}", path.display());
                    LogEmitter::to_file(path, &run_id)?
                }
                None => LogEmitter::to_sink(&run_id),
            };
            let report = SelfCheckRunner::new(run_id, mode).run(&mut emitter)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.all_passed() {
                return Err(HarnessError::Failed {
                    failed: report.failed + usize::from(!report.registry_walk_ok),
                    total: report.total + 1,
                }
                .into());
            }
            eprintln!(
                "Self-check passed: {}/{} scenarios",
                report.passed, report.total
            );
        }
        Command::AllowList { json } => {
            let mut names = SAFE_FOREIGN_FUNCTIONS.to_vec();
            names.sort_unstable();
            if json {
                println!("{}", serde_json::to_string_pretty(&names)?);
            } else {
                for name in names {
                    println!("{name}");
                }
            }
        }
    }
    Ok(())
}
