//! Error types for the conformance runner
//!
//! Conformance failures (a value or location that differs from the fixture)
//! are not errors: they are recorded in the run report. Everything here means
//! the harness itself could not do its job.

use std::io;
use std::path::Path;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the conformance runner
#[derive(Error, Debug)]
pub enum Error {
    // === Adapter Errors ===
    #[error("Debug adapter '{name}' not found. Searched: {searched}")]
    AdapterNotFound { name: String, searched: String },

    #[error("Debug adapter failed to start: {0}")]
    AdapterStartFailed(String),

    #[error("Debug adapter crashed unexpectedly")]
    AdapterCrashed,

    // === DAP Protocol Errors ===
    #[error("DAP protocol error: {0}")]
    DapProtocol(String),

    #[error("DAP request '{command}' failed: {message}")]
    DapRequestFailed { command: String, message: String },

    // === Session Errors ===
    #[error("Cannot {action} while session is {state}")]
    InvalidState { action: String, state: String },

    #[error("Failed to install breakpoint '{spec}': {reason}")]
    BreakpointFailed { spec: String, reason: String },

    #[error("Frame {0} not found")]
    FrameNotFound(usize),

    #[error("Could not extract a value from argument dump: {0:?}")]
    Extraction(String),

    #[error("Debugger command '{command}' failed: {message}")]
    CommandFailed { command: String, message: String },

    // === Timeout Errors ===
    #[error("DAP request '{0}' timed out after {1} seconds")]
    RequestTimeout(String, u64),

    #[error("No stop event after {0} seconds. The target may never reach the next breakpoint")]
    StopTimeout(u64),

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    #[error("Invalid fixture '{path}': {reason}")]
    Fixture { path: String, reason: String },

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an adapter not found error with search paths
    pub fn adapter_not_found<S: AsRef<str>>(name: &str, paths: &[S]) -> Self {
        Self::AdapterNotFound {
            name: name.to_string(),
            searched: paths.iter().map(|s| s.as_ref()).collect::<Vec<_>>().join(", "),
        }
    }

    /// Create a DAP request failed error
    pub fn dap_request_failed(command: &str, message: &str) -> Self {
        Self::DapRequestFailed {
            command: command.to_string(),
            message: message.to_string(),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(action: &str, state: &str) -> Self {
        Self::InvalidState {
            action: action.to_string(),
            state: state.to_string(),
        }
    }

    /// Create a breakpoint failed error
    pub fn breakpoint_failed(spec: &str, reason: &str) -> Self {
        Self::BreakpointFailed {
            spec: spec.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a fixture error for the given file
    pub fn fixture(path: &Path, reason: impl Into<String>) -> Self {
        Self::Fixture {
            path: path.display().to_string(),
            reason: reason.into(),
        }
    }

    /// Create a file read error
    pub fn file_read(path: &Path, error: io::Error) -> Self {
        Self::FileRead {
            path: path.display().to_string(),
            error: error.to_string(),
        }
    }
}
