//! Conformance run state machine
//!
//! ```text
//! Init → LoadingExtensions → BreakpointsArmed → Running
//!      → (StoppedAtCase ⇄ Resumed) → Done | Aborted
//! ```
//!
//! Cases are checked strictly in fixture order, one per breakpoint hit. The
//! first failure ends the run and the session is terminated; later cases are
//! never looked at. Harness errors (debugger commands failing, frames that
//! do not exist, timeouts) are returned as `Err` after the same cleanup.

use std::fmt;
use std::io::Write;

use serde::Serialize;

use crate::common::{Error, Result};
use crate::session::{DebugSession, FrameLocation, StopEvent};

use super::extract::first_argument_value;
use super::fixture::{ExpectationCase, Extraction, Fixture, StopExpectation};
use super::report::Reporter;

/// Where a run is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", content = "case", rename_all = "snake_case")]
pub enum RunPhase {
    Init,
    LoadingExtensions,
    BreakpointsArmed,
    Running,
    StoppedAtCase(usize),
    Resumed(usize),
    Done,
    Aborted,
}

/// Why a run did not pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Failure {
    /// The debugger rendered something other than the expected string
    ValueMismatch {
        index: usize,
        observed: String,
        expected: String,
    },
    /// The breakpoint fired somewhere the fixture did not expect
    LocationMismatch {
        index: usize,
        expected_line: Option<u32>,
        expected_function: Option<String>,
        actual: String,
        actual_line: u32,
    },
    /// The target went away before every case was checked
    TargetExited {
        index: usize,
        exit_code: Option<i32>,
    },
    /// The target stopped again after the last case
    FixtureExhausted { cases: usize },
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValueMismatch {
                index,
                observed,
                expected,
            } => write!(
                f,
                "case {}: ({}) != expected: ({})",
                index, observed, expected
            ),
            Self::LocationMismatch {
                index,
                expected_line,
                expected_function,
                actual,
                ..
            } => {
                write!(f, "case {}: stopped in {}, expected", index, actual)?;
                if let Some(function) = expected_function {
                    write!(f, " function {}", function)?;
                }
                if let Some(line) = expected_line {
                    write!(f, " line {}", line)?;
                }
                Ok(())
            }
            Self::TargetExited {
                index,
                exit_code: Some(code),
            } => write!(f, "target exited with code {} before case {}", code, index),
            Self::TargetExited {
                index,
                exit_code: None,
            } => write!(f, "debug session ended before case {}", index),
            Self::FixtureExhausted { cases } => write!(
                f,
                "target hit a breakpoint again after all {} cases were checked",
                cases
            ),
        }
    }
}

/// Result of one checked case
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseOutcome {
    pub index: usize,
    pub expected: String,
    pub observed: String,
    pub passed: bool,
}

/// Result of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub fixture: String,
    pub cases_total: usize,
    pub outcomes: Vec<CaseOutcome>,
    pub failure: Option<Failure>,
    pub phase: RunPhase,
}

impl RunReport {
    fn new(fixture: &Fixture) -> Self {
        Self {
            fixture: fixture.name.clone(),
            cases_total: fixture.cases.len(),
            outcomes: Vec::new(),
            failure: None,
            phase: RunPhase::Init,
        }
    }

    /// Number of cases that passed
    pub fn passed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.passed).count()
    }

    /// True when every case passed and the target finished cleanly
    pub fn is_success(&self) -> bool {
        self.failure.is_none() && self.phase == RunPhase::Done
    }

    fn enter(&mut self, phase: RunPhase) {
        tracing::debug!(from = ?self.phase, to = ?phase, "Run phase");
        self.phase = phase;
    }

    fn abort(&mut self, failure: Failure) {
        tracing::info!(%failure, "Run aborted");
        self.failure = Some(failure);
        self.enter(RunPhase::Aborted);
    }

    fn record(&mut self, index: usize, case: &ExpectationCase, observed: String) -> bool {
        let passed = observed == case.expect;
        self.outcomes.push(CaseOutcome {
            index,
            expected: case.expect.clone(),
            observed,
            passed,
        });
        passed
    }
}

/// Run every case of `fixture` against `session`
///
/// The session is terminated before this returns, whatever the outcome.
pub async fn run_fixture<S, L, E>(
    session: &mut S,
    fixture: &Fixture,
    reporter: &mut Reporter<L, E>,
) -> Result<RunReport>
where
    S: DebugSession + ?Sized,
    L: Write,
    E: Write,
{
    let mut report = RunReport::new(fixture);
    reporter.header(
        &fixture.name,
        fixture.description.as_deref(),
        fixture.cases.len(),
    );

    let result = drive(session, fixture, reporter, &mut report).await;

    if let Err(e) = session.terminate().await {
        tracing::warn!(error = %e, "Failed to terminate debug session");
    }

    match result {
        Ok(()) => {
            reporter.summary(&report);
            Ok(report)
        }
        Err(e) => {
            report.enter(RunPhase::Aborted);
            Err(e)
        }
    }
}

async fn drive<S, L, E>(
    session: &mut S,
    fixture: &Fixture,
    reporter: &mut Reporter<L, E>,
    report: &mut RunReport,
) -> Result<()>
where
    S: DebugSession + ?Sized,
    L: Write,
    E: Write,
{
    for command in &fixture.debugger.diagnostics {
        session.execute(command).await?;
    }
    if !fixture.debugger.diagnostics.is_empty() {
        reporter.phase("Debugger diagnostics enabled");
    }

    report.enter(RunPhase::LoadingExtensions);
    for path in fixture.extension_paths() {
        session.load_extension(&path).await?;
        reporter.phase(&format!("Loaded {}", path.display()));
    }

    let armed = session.arm_breakpoints(&fixture.breakpoint).await?;
    report.enter(RunPhase::BreakpointsArmed);
    reporter.phase(&format!(
        "{} breakpoint(s) on {}",
        armed, fixture.breakpoint
    ));

    session.start().await?;
    report.enter(RunPhase::Running);

    for (index, case) in fixture.indexed_cases() {
        match session.wait_for_stop().await? {
            StopEvent::Stopped { reason } => {
                tracing::debug!(index, %reason, "Stopped for case");
            }
            StopEvent::Exited { exit_code } => {
                let failure = Failure::TargetExited {
                    index,
                    exit_code: Some(exit_code),
                };
                reporter.run_failure(&failure);
                report.abort(failure);
                return Ok(());
            }
            StopEvent::Terminated => {
                let failure = Failure::TargetExited {
                    index,
                    exit_code: None,
                };
                reporter.run_failure(&failure);
                report.abort(failure);
                return Ok(());
            }
        }
        report.enter(RunPhase::StoppedAtCase(index));
        reporter.expecting(index, &case.expect);

        // Location is checked on the stopped frame, before any navigation
        let location = session.location().await?;
        if let Some(failure) = check_location(&fixture.stop, index, &location) {
            reporter.failed(&failure);
            report.abort(failure);
            return Ok(());
        }

        let observed = observe(session, case).await?;
        if report.record(index, case, observed.clone()) {
            reporter.passed();
        } else {
            let failure = Failure::ValueMismatch {
                index,
                observed,
                expected: case.expect.clone(),
            };
            reporter.failed(&failure);
            report.abort(failure);
            return Ok(());
        }

        session.resume().await?;
        report.enter(RunPhase::Resumed(index));
    }

    match session.wait_for_stop().await? {
        StopEvent::Stopped { .. } => {
            let failure = Failure::FixtureExhausted {
                cases: fixture.cases.len(),
            };
            reporter.run_failure(&failure);
            report.abort(failure);
        }
        StopEvent::Exited { .. } | StopEvent::Terminated => report.enter(RunPhase::Done),
    }

    Ok(())
}

fn check_location(
    expect: &StopExpectation,
    index: usize,
    location: &FrameLocation,
) -> Option<Failure> {
    let line_ok = expect.line.map_or(true, |line| line == location.line);
    let function_ok = expect
        .function
        .as_deref()
        .map_or(true, |f| location.function.contains(f));

    if line_ok && function_ok {
        return None;
    }
    Some(Failure::LocationMismatch {
        index,
        expected_line: expect.line,
        expected_function: expect.function.clone(),
        actual: location.to_string(),
        actual_line: location.line,
    })
}

/// Obtain the rendered value for one case
///
/// Values are read as the debugger CLI prints them, children included. The
/// structured arguments are only a fallback for debuggers whose "show
/// arguments" output has no `name = value` line.
async fn observe<S>(session: &mut S, case: &ExpectationCase) -> Result<String>
where
    S: DebugSession + ?Sized,
{
    match case.extraction() {
        Extraction::Argument => {
            let dump = session.argument_dump().await?;
            if let Some(value) = first_argument_value(&dump) {
                return Ok(value.to_string());
            }

            tracing::debug!(%dump, "No argument in dump, reading structured arguments");
            match session.arguments().await?.into_iter().next() {
                Some(first) => Ok(first.value),
                None => Err(Error::Extraction(dump)),
            }
        }
        Extraction::CallerVariable(name) => {
            let caller = session.frame_up().await?;
            tracing::debug!(%caller, variable = name, "Reading value from caller frame");
            session.print_variable(name).await
        }
    }
}
