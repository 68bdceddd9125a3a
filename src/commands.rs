//! CLI command definitions
//!
//! Defines the clap commands for the ppcheck CLI.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run a fixture against its target under a debugger
    Run {
        /// Path to the YAML fixture
        fixture: PathBuf,

        /// Debug adapter to use (overrides the fixture and the config default)
        #[arg(long)]
        adapter: Option<String>,

        /// Program to debug (overrides the fixture's target program)
        #[arg(long)]
        program: Option<PathBuf>,

        /// Configuration file (default: platform config dir)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Print the run report as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Validate a fixture and list its cases without starting a debugger
    Check {
        /// Path to the YAML fixture
        fixture: PathBuf,
    },
}
