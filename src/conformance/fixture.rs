//! Expectation fixtures
//!
//! A fixture names the target, the debugger setup, where to break and the
//! ordered list of strings the debugger must render at each hit. Fixtures
//! are YAML files; relative paths inside them resolve against the file's
//! directory.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::common::{Error, Result};
use crate::session::BreakpointSpec;

/// A complete fixture loaded from a YAML file
#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct Fixture {
    /// Name shown in reports
    pub name: String,
    /// Optional description of what the fixture covers
    pub description: Option<String>,
    /// Shell steps to run before the session (e.g., compiling the target)
    #[serde(default)]
    pub setup: Vec<SetupStep>,
    /// The program under test
    pub target: TargetConfig,
    /// Debugger preparation before breakpoints are installed
    #[serde(default)]
    pub debugger: DebuggerSetup,
    /// Where the target stops for each case
    pub breakpoint: BreakpointSpec,
    /// Sanity check applied at every stop
    #[serde(default)]
    pub stop: StopExpectation,
    /// Expected renderings, in breakpoint hit order
    pub cases: Vec<ExpectationCase>,

    /// Directory relative paths are resolved against
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// A setup step that runs before the session starts
#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct SetupStep {
    /// Shell command to execute
    pub shell: String,
}

/// Configuration for the debug target
#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
    /// Path to the program to debug
    pub program: PathBuf,
    /// Arguments to pass to the program
    #[serde(default)]
    pub args: Vec<String>,
    /// Debug mode
    #[serde(default)]
    pub mode: TargetMode,
    /// PID to attach to (attach mode)
    pub pid: Option<u32>,
    /// File containing the PID to attach to (attach mode)
    pub pid_file: Option<PathBuf>,
    /// Debug adapter to use, overriding the configured default
    pub adapter: Option<String>,
}

/// Whether the runner starts the target or attaches to it
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TargetMode {
    #[default]
    Launch,
    Attach,
}

/// Debugger preparation
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct DebuggerSetup {
    /// Commands that make the debugger report internal errors verbosely
    #[serde(default)]
    pub diagnostics: Vec<String>,
    /// Formatting extensions to load, in order
    #[serde(default)]
    pub extensions: Vec<PathBuf>,
}

/// What every stop must look like before its case is checked
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct StopExpectation {
    /// Expected line of the stopped frame
    pub line: Option<u32>,
    /// Expected substring of the stopped frame's function name
    pub function: Option<String>,
}

/// One expected rendering
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct ExpectationCase {
    /// The exact string the debugger must produce
    pub expect: String,
    /// Read this variable from the caller frame instead of the arguments
    pub caller_variable: Option<String>,
}

/// How the observed value of a case is obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extraction<'a> {
    /// The formatted argument of the stopped call
    Argument,
    /// A variable evaluated one frame up
    CallerVariable(&'a str),
}

impl ExpectationCase {
    pub fn extraction(&self) -> Extraction<'_> {
        match &self.caller_variable {
            Some(name) => Extraction::CallerVariable(name),
            None => Extraction::Argument,
        }
    }
}

/// Directory a fixture's relative paths resolve against
///
/// A bare file name has an empty parent, which is the current directory.
fn base_dir_of(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

impl Fixture {
    /// Load and validate a fixture file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, e))?;
        Self::parse(&content, path, base_dir_of(path))
    }

    /// Parse and validate fixture text; `origin` is only used in errors
    pub fn parse(content: &str, origin: &Path, base_dir: PathBuf) -> Result<Self> {
        let mut fixture: Fixture = serde_yaml::from_str(content)
            .map_err(|e| Error::fixture(origin, e.to_string()))?;
        fixture.base_dir = base_dir;
        fixture.validate(origin)?;
        Ok(fixture)
    }

    fn validate(&self, origin: &Path) -> Result<()> {
        if self.cases.is_empty() {
            return Err(Error::fixture(origin, "fixture has no cases"));
        }
        if self.breakpoint.name().trim().is_empty() {
            return Err(Error::fixture(origin, "breakpoint name is empty"));
        }
        if let Some(i) = self
            .cases
            .iter()
            .position(|c| c.caller_variable.as_deref().is_some_and(|v| v.trim().is_empty()))
        {
            return Err(Error::fixture(
                origin,
                format!("case {} has an empty caller_variable", i + 1),
            ));
        }
        if self.target.mode == TargetMode::Attach
            && self.target.pid.is_none()
            && self.target.pid_file.is_none()
        {
            return Err(Error::fixture(
                origin,
                "attach mode requires either 'pid' or 'pid_file'",
            ));
        }
        Ok(())
    }

    /// Resolve a path from the fixture against the fixture's directory
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_relative() {
            self.base_dir.join(path)
        } else {
            path.to_path_buf()
        }
    }

    /// Extension paths, resolved
    pub fn extension_paths(&self) -> Vec<PathBuf> {
        self.debugger
            .extensions
            .iter()
            .map(|p| self.resolve(p))
            .collect()
    }

    /// Cases with their 1-based indices
    pub fn indexed_cases(&self) -> impl Iterator<Item = (usize, &ExpectationCase)> {
        self.cases.iter().enumerate().map(|(i, c)| (i + 1, c))
    }
}
