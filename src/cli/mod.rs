//! CLI command handling
//!
//! Prepares the target, opens the debug session and hands it to the
//! conformance runner.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Stdio;

use colored::Colorize;
use tokio::process::Command as TokioCommand;

use crate::commands::Commands;
use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::conformance::fixture::{Extraction, TargetMode};
use crate::conformance::{run_fixture, Fixture, Reporter, RunReport};
use crate::session::{DapSession, SessionTarget};

/// How a command finished, when it did not error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    Failed,
}

/// Dispatch a CLI command
pub async fn dispatch(command: Commands) -> Result<Outcome> {
    match command {
        Commands::Run {
            fixture,
            adapter,
            program,
            config,
            json,
        } => {
            let config = match config {
                Some(path) => Config::load_from(&path)?,
                None => Config::load()?,
            };
            let fixture = Fixture::load(&fixture)?;

            run_setup(&fixture).await?;

            let target = session_target(&fixture, program)?;
            let adapter = adapter
                .or_else(|| fixture.target.adapter.clone())
                .unwrap_or_else(|| config.defaults.adapter.clone());

            let mut session = DapSession::connect(&config, &adapter, target).await?;

            let report = if json {
                // Keep stdout clean for the JSON document
                let reporter = Reporter::new(io::stderr(), io::stderr());
                let report = execute(&mut session, &fixture, reporter).await?;
                println!("{}", serde_json::to_string_pretty(&report)?);
                report
            } else {
                execute(&mut session, &fixture, Reporter::stdio()).await?
            };

            Ok(if report.is_success() {
                Outcome::Passed
            } else {
                Outcome::Failed
            })
        }

        Commands::Check { fixture: path } => {
            let fixture = Fixture::load(&path)?;
            print_fixture(&fixture);
            Ok(Outcome::Passed)
        }
    }
}

async fn execute<L: Write, E: Write>(
    session: &mut DapSession,
    fixture: &Fixture,
    mut reporter: Reporter<L, E>,
) -> Result<RunReport> {
    run_fixture(session, fixture, &mut reporter).await
}

/// Run the fixture's shell setup steps from the fixture's directory
async fn run_setup(fixture: &Fixture) -> Result<()> {
    for step in &fixture.setup {
        tracing::info!(command = %step.shell, "Running setup step");

        let output = TokioCommand::new("sh")
            .arg("-c")
            .arg(&step.shell)
            .current_dir(&fixture.base_dir)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| Error::CommandFailed {
                command: step.shell.clone(),
                message: format!("failed to execute: {}", e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::CommandFailed {
                command: step.shell.clone(),
                message: format!(
                    "exited with code {:?}: {}",
                    output.status.code(),
                    stderr.trim()
                ),
            });
        }
    }
    Ok(())
}

/// Build the launch/attach target from the fixture and CLI overrides
fn session_target(fixture: &Fixture, program_override: Option<PathBuf>) -> Result<SessionTarget> {
    let program = match program_override {
        Some(path) => path,
        None => fixture.resolve(&fixture.target.program),
    };

    match fixture.target.mode {
        TargetMode::Launch => {
            let program = program.canonicalize().map_err(|e| {
                Error::Config(format!("Program not found '{}': {}", program.display(), e))
            })?;
            Ok(SessionTarget::Launch {
                program,
                args: fixture.target.args.clone(),
                cwd: Some(fixture.base_dir.clone()),
            })
        }
        TargetMode::Attach => {
            let pid = match (fixture.target.pid, &fixture.target.pid_file) {
                (Some(pid), _) => pid,
                (None, Some(pid_file)) => read_pid_file(&fixture.resolve(pid_file))?,
                (None, None) => {
                    return Err(Error::Config(
                        "Attach mode requires either 'pid' or 'pid_file' field".to_string(),
                    ))
                }
            };
            ensure_process_exists(pid)?;
            Ok(SessionTarget::Attach {
                pid,
                program: Some(program),
            })
        }
    }
}

fn read_pid_file(path: &Path) -> Result<u32> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, e))?;
    content.trim().parse::<u32>().map_err(|e| {
        Error::Config(format!("Invalid PID in file '{}': {}", path.display(), e))
    })
}

#[cfg(unix)]
fn ensure_process_exists(pid: u32) -> Result<()> {
    // Signal 0 tests process existence without side effects
    let result = unsafe { libc::kill(pid as libc::pid_t, 0) };
    if result != 0 {
        return Err(Error::Config(format!(
            "Process with PID {} not found or not accessible",
            pid
        )));
    }
    Ok(())
}

#[cfg(not(unix))]
fn ensure_process_exists(_pid: u32) -> Result<()> {
    Ok(())
}

fn print_fixture(fixture: &Fixture) {
    println!(
        "{} {} ({} cases)",
        "Fixture:".blue().bold(),
        fixture.name.white().bold(),
        fixture.cases.len()
    );
    println!("  breakpoint: {}", fixture.breakpoint);
    if let Some(line) = fixture.stop.line {
        println!("  stop line:  {}", line);
    }
    if let Some(function) = &fixture.stop.function {
        println!("  stop in:    {}", function);
    }
    for path in fixture.extension_paths() {
        println!("  extension:  {}", path.display());
    }

    for (index, case) in fixture.indexed_cases() {
        match case.extraction() {
            Extraction::Argument => println!("  {:>3}) {}", index, case.expect),
            Extraction::CallerVariable(name) => println!(
                "  {:>3}) {}  {}",
                index,
                case.expect,
                format!("(caller variable {})", name).dimmed()
            ),
        }
    }
}
