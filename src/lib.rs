//! ppcheck - pretty-printer conformance runner
//!
//! Drives a debugger over the Debug Adapter Protocol (DAP) through a series
//! of breakpoint hits and checks that the debugger renders each inspected
//! value exactly as a fixture expects.

pub mod cli;
pub mod commands;
pub mod common;
pub mod conformance;
pub mod dap;
pub mod session;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use conformance::{Fixture, RunReport};
pub use session::{BreakpointSpec, DebugSession};
