//! Pretty-printer conformance checking
//!
//! Loads an expectation fixture, drives a debug session through every
//! breakpoint hit and compares what the debugger renders against the
//! expected strings.

pub mod extract;
pub mod fixture;
pub mod report;
pub mod runner;

pub use fixture::{Fixture, TargetMode};
pub use report::Reporter;
pub use runner::{run_fixture, CaseOutcome, Failure, RunPhase, RunReport};
