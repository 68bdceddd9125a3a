//! ppcheck - pretty-printer conformance runner
//!
//! Exit status: 0 when every case passed, 1 on a conformance failure, 2 when
//! the harness itself failed (configuration, adapter, protocol, timeouts).

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use commands::Commands;
use ppcheck::common::logging;
use ppcheck::{cli, commands};

#[derive(Parser)]
#[command(name = "ppcheck", about = "Debugger pretty-printer conformance runner")]
#[command(version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Debug logging (DAP traffic, run phases)
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Keep the guard alive so the file writer flushes on exit
    let _log_guard = logging::init_cli(cli.verbose, cli.log_file.as_deref());

    match cli::dispatch(cli.command).await {
        Ok(cli::Outcome::Passed) => ExitCode::SUCCESS,
        Ok(cli::Outcome::Failed) => ExitCode::from(1),
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(2)
        }
    }
}
