//! Configuration file handling

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::paths::config_path;
use super::{Error, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Debug adapter configurations
    #[serde(default)]
    pub adapters: HashMap<String, AdapterConfig>,

    /// Default settings
    #[serde(default)]
    pub defaults: Defaults,

    /// Timeout settings
    #[serde(default)]
    pub timeouts: Timeouts,

    /// Debugger command templates issued through the adapter's repl
    #[serde(default)]
    pub commands: CommandTemplates,
}

/// Configuration for a debug adapter
#[derive(Debug, Deserialize, Clone)]
pub struct AdapterConfig {
    /// Path to the adapter executable
    pub path: PathBuf,

    /// Additional arguments to pass to the adapter
    #[serde(default)]
    pub args: Vec<String>,
}

/// Default settings
#[derive(Debug, Deserialize)]
pub struct Defaults {
    /// Default adapter to use
    #[serde(default = "default_adapter")]
    pub adapter: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            adapter: default_adapter(),
        }
    }
}

fn default_adapter() -> String {
    "gdb".to_string()
}

/// Timeout settings in seconds
#[derive(Debug, Deserialize)]
pub struct Timeouts {
    /// Timeout for DAP initialize request
    #[serde(default = "default_dap_initialize")]
    pub dap_initialize_secs: u64,

    /// Timeout for general DAP requests
    #[serde(default = "default_dap_request")]
    pub dap_request_secs: u64,

    /// How long to wait for the next breakpoint hit; 0 waits forever
    #[serde(default = "default_stop")]
    pub stop_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            dap_initialize_secs: default_dap_initialize(),
            dap_request_secs: default_dap_request(),
            stop_secs: default_stop(),
        }
    }
}

fn default_dap_initialize() -> u64 {
    10
}
fn default_dap_request() -> u64 {
    30
}
fn default_stop() -> u64 {
    300
}

/// Debugger command templates
///
/// `{path}` and `{pattern}` are substituted before the command is sent.
#[derive(Debug, Deserialize, Clone)]
pub struct CommandTemplates {
    /// Loads a formatting extension script
    #[serde(default = "default_load_extension")]
    pub load_extension: String,

    /// Sets a breakpoint on every function matching a pattern
    #[serde(default = "default_pattern_breakpoint")]
    pub pattern_breakpoint: String,

    /// Prints the arguments of the selected frame
    #[serde(default = "default_show_arguments")]
    pub show_arguments: String,

    /// Prints one variable of the selected frame, children included
    #[serde(default = "default_print_variable")]
    pub print_variable: String,
}

impl Default for CommandTemplates {
    fn default() -> Self {
        Self {
            load_extension: default_load_extension(),
            pattern_breakpoint: default_pattern_breakpoint(),
            show_arguments: default_show_arguments(),
            print_variable: default_print_variable(),
        }
    }
}

fn default_load_extension() -> String {
    "source {path}".to_string()
}
fn default_pattern_breakpoint() -> String {
    "rbreak {pattern}".to_string()
}
fn default_show_arguments() -> String {
    "info args".to_string()
}
fn default_print_variable() -> String {
    "output {name}".to_string()
}

impl CommandTemplates {
    /// Command that loads the extension at `path`
    pub fn load_extension_command(&self, path: &Path) -> String {
        self.load_extension
            .replace("{path}", &path.display().to_string())
    }

    /// Command that breaks on every function matching `pattern`
    pub fn pattern_breakpoint_command(&self, pattern: &str) -> String {
        self.pattern_breakpoint.replace("{pattern}", pattern)
    }

    /// Command that prints variable `name` the way the debugger CLI renders it
    pub fn print_variable_command(&self, name: &str) -> String {
        self.print_variable.replace("{name}", name)
    }
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        match config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, e))?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::ConfigParse(e.to_string()))
    }

    /// Get adapter configuration by name
    ///
    /// Falls back to searching PATH if not explicitly configured
    pub fn get_adapter(&self, name: &str) -> Option<AdapterConfig> {
        // Check explicit configuration first
        if let Some(config) = self.adapters.get(name) {
            return Some(config.clone());
        }

        which::which(name).ok().map(|path| {
            // GDB only speaks DAP when asked to
            let args = match name {
                "gdb" => vec!["-i".to_string(), "dap".to_string()],
                _ => Vec::new(),
            };
            AdapterConfig { path, args }
        })
    }
}
