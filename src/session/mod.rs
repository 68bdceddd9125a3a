//! The debugger boundary the conformance runner drives
//!
//! `DebugSession` is the full set of commands the runner needs from a host
//! debugger. `DapSession` implements it over the Debug Adapter Protocol; the
//! runner tests use a scripted in-memory implementation.

mod dap;
#[cfg(test)]
pub(crate) mod scripted;

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::common::Result;

pub use dap::{DapSession, SessionTarget};

/// How breakpoints are installed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum BreakpointSpec {
    /// Every function whose name matches the pattern
    Pattern(String),
    /// A single function by name
    Function(String),
}

impl BreakpointSpec {
    pub fn name(&self) -> &str {
        match self {
            Self::Pattern(name) | Self::Function(name) => name,
        }
    }
}

impl fmt::Display for BreakpointSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pattern(p) => write!(f, "pattern {}", p),
            Self::Function(name) => write!(f, "function {}", name),
        }
    }
}

/// Where the selected frame is
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameLocation {
    pub function: String,
    pub file: Option<String>,
    pub line: u32,
}

impl fmt::Display for FrameLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{} at {}:{}", self.function, file, self.line),
            None => write!(f, "{} at line {}", self.function, self.line),
        }
    }
}

/// A formal argument of the selected frame, as the debugger renders it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argument {
    pub name: String,
    pub value: String,
}

/// Why the target is no longer running
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopEvent {
    /// Stopped at a breakpoint (or any other suspension)
    Stopped { reason: String },
    /// The target process exited
    Exited { exit_code: i32 },
    /// The debug session ended without an exit code
    Terminated,
}

/// Command/response interface to a live debugger session
///
/// Inspection calls are only valid while the target is stopped. Frame
/// selection resets to the innermost frame whenever the target resumes.
#[async_trait]
pub trait DebugSession: Send {
    /// Run a raw debugger command and return its textual output
    async fn execute(&mut self, command: &str) -> Result<String>;

    /// Load a formatting extension into the debugger
    async fn load_extension(&mut self, path: &Path) -> Result<()>;

    /// Install breakpoints, returning how many locations were armed
    async fn arm_breakpoints(&mut self, spec: &BreakpointSpec) -> Result<usize>;

    /// Let the target run (launch it, or release an attached one)
    async fn start(&mut self) -> Result<()>;

    /// Block until the target stops, exits or the session ends
    async fn wait_for_stop(&mut self) -> Result<StopEvent>;

    /// Location of the selected frame
    async fn location(&mut self) -> Result<FrameLocation>;

    /// Structured arguments of the selected frame; empty when the debugger
    /// does not expose them
    ///
    /// Values are the adapter's summary: a pretty printer's children are not
    /// part of it.
    async fn arguments(&mut self) -> Result<Vec<Argument>>;

    /// The debugger's textual "show arguments" output for the selected frame,
    /// children included
    async fn argument_dump(&mut self) -> Result<String>;

    /// Select the caller of the selected frame
    async fn frame_up(&mut self) -> Result<FrameLocation>;

    /// Print a variable of the selected frame as the debugger CLI renders
    /// it, children included
    async fn print_variable(&mut self, name: &str) -> Result<String>;

    /// Resume execution until the next stop
    async fn resume(&mut self) -> Result<()>;

    /// End the session and the target
    async fn terminate(&mut self) -> Result<()>;
}
