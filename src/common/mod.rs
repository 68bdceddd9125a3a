//! Common utilities shared by the CLI, the DAP session and the runner

pub mod config;
pub mod error;
pub mod logging;
pub mod paths;

pub use error::{Error, Result};
