//! Human-readable run output
//!
//! Progress goes to the log stream, mismatches to the error stream. A case
//! line is written in two parts, `N) expecting: X: ` before the value is
//! read and the verdict after, so a harness error mid-case still shows which
//! case it happened on.

use std::io::{self, Stderr, Stdout, Write};

use colored::Colorize;

use super::runner::{Failure, RunReport};

/// Writes progress and failure lines
pub struct Reporter<L: Write = Stdout, E: Write = Stderr> {
    log: L,
    err: E,
}

impl Reporter {
    /// Reporter on the process's stdout and stderr
    pub fn stdio() -> Self {
        Self::new(io::stdout(), io::stderr())
    }
}

impl<L: Write, E: Write> Reporter<L, E> {
    pub fn new(log: L, err: E) -> Self {
        Self { log, err }
    }

    /// Give back the underlying streams
    pub fn into_inner(self) -> (L, E) {
        (self.log, self.err)
    }

    // Output is best-effort: a closed pipe must not abort the run.
    fn log_line(&mut self, line: impl std::fmt::Display) {
        let _ = writeln!(self.log, "{}", line);
    }

    pub fn header(&mut self, name: &str, description: Option<&str>, cases: usize) {
        self.log_line(format!(
            "\n{} {} ({} cases)",
            "Running fixture:".blue().bold(),
            name.white().bold(),
            cases
        ));
        if let Some(desc) = description {
            self.log_line(format!("  {}", desc.trim().dimmed()));
        }
    }

    pub fn phase(&mut self, message: &str) {
        self.log_line(format!("  {} {}", "✓".green(), message.dimmed()));
    }

    pub fn expecting(&mut self, index: usize, expected: &str) {
        let _ = write!(self.log, "{}) expecting: {}: ", index, expected);
        let _ = self.log.flush();
    }

    pub fn passed(&mut self) {
        self.log_line("passed".green());
    }

    pub fn failed(&mut self, failure: &Failure) {
        // Terminate the pending `expecting` line on the log stream
        self.log_line("FAILED".red().bold());
        let _ = match failure {
            Failure::ValueMismatch {
                observed, expected, ..
            } => writeln!(self.err, " ({}) != expected: ({})", observed, expected),
            other => writeln!(self.err, " {}", other),
        };
        let _ = self.err.flush();
    }

    /// Failures detected outside a case (no pending `expecting` line)
    pub fn run_failure(&mut self, failure: &Failure) {
        let _ = writeln!(self.err, "{} {}", "✗".red(), failure);
        let _ = self.err.flush();
    }

    pub fn summary(&mut self, report: &RunReport) {
        match &report.failure {
            None => self.log_line(format!(
                "\n{} {}\n",
                "✓".green().bold(),
                format!("{}/{} cases passed", report.passed(), report.cases_total)
                    .green()
                    .bold()
            )),
            Some(_) => self.log_line(format!(
                "\n{} {}\n",
                "✗".red().bold(),
                format!(
                    "Failed after {}/{} cases passed",
                    report.passed(),
                    report.cases_total
                )
                .red()
                .bold()
            )),
        }
    }
}
