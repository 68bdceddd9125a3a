//! In-memory debug session for runner tests
//!
//! Replays a fixed list of breakpoint hits and records every call the runner
//! makes, so tests can assert on ordering as well as outcomes.

use std::collections::{HashMap, VecDeque};
use std::path::Path;

use async_trait::async_trait;

use crate::common::{Error, Result};

use super::{Argument, BreakpointSpec, DebugSession, FrameLocation, StopEvent};

/// One simulated breakpoint hit
#[derive(Debug, Clone)]
pub struct Hit {
    pub location: FrameLocation,
    pub arguments: Vec<Argument>,
    pub dump: String,
    pub caller: FrameLocation,
    pub caller_variables: HashMap<String, String>,
}

impl Hit {
    /// A hit in `myDebug` at line 41 whose single argument renders as `value`
    ///
    /// Like gdb, the structured argument only carries the summary line of a
    /// container (`seq(3, 3)` for `seq(3, 3) = {1, 2, 3}`).
    pub fn arg(value: &str) -> Self {
        Self {
            location: FrameLocation {
                function: "myDebug".to_string(),
                file: Some("tgdb.nim".to_string()),
                line: 41,
            },
            arguments: vec![Argument {
                name: "a".to_string(),
                value: summary(value).to_string(),
            }],
            dump: format!("a = {}\n", value),
            caller: FrameLocation {
                function: "main".to_string(),
                file: Some("tgdb.nim".to_string()),
                line: 80,
            },
            caller_variables: HashMap::new(),
        }
    }

    /// Hit with no parseable dump; only structured arguments carry the value
    pub fn structured_only(value: &str) -> Self {
        let mut hit = Self::arg(value);
        hit.arguments[0].value = value.to_string();
        hit.dump = "No symbol table info available.\n".to_string();
        hit
    }

    /// Same hit, but the debugger exposes no structured arguments
    pub fn dump_only(value: &str) -> Self {
        Self {
            arguments: Vec::new(),
            ..Self::arg(value)
        }
    }

    pub fn with_caller_variable(mut self, name: &str, value: &str) -> Self {
        self.caller_variables
            .insert(name.to_string(), value.to_string());
        self
    }

    pub fn at_line(mut self, line: u32) -> Self {
        self.location.line = line;
        self
    }
}

/// Summary part of a rendering, as a DAP `variables` value shows it
fn summary(rendering: &str) -> &str {
    rendering
        .split_once(" = {")
        .map_or(rendering, |(head, _)| head)
}

/// Scripted `DebugSession`
#[derive(Debug, Default)]
pub struct ScriptedSession {
    hits: VecDeque<Hit>,
    current: Option<Hit>,
    in_caller: bool,
    pub exit_code: i32,
    pub armed: usize,
    /// Command that fails with `CommandFailed`
    pub failing_command: Option<String>,
    /// Every call, in order, e.g. `execute set python print-stack full`
    pub calls: Vec<String>,
}

impl ScriptedSession {
    pub fn new(hits: Vec<Hit>) -> Self {
        Self {
            hits: hits.into(),
            armed: 1,
            ..Default::default()
        }
    }

    fn current(&self, action: &str) -> Result<&Hit> {
        self.current
            .as_ref()
            .ok_or_else(|| Error::invalid_state(action, "running"))
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls.iter().filter(|c| c.starts_with(prefix)).count()
    }
}

#[async_trait]
impl DebugSession for ScriptedSession {
    async fn execute(&mut self, command: &str) -> Result<String> {
        self.calls.push(format!("execute {}", command));
        if self.failing_command.as_deref() == Some(command) {
            return Err(Error::CommandFailed {
                command: command.to_string(),
                message: "Undefined command".to_string(),
            });
        }
        Ok(String::new())
    }

    async fn load_extension(&mut self, path: &Path) -> Result<()> {
        self.calls.push(format!("load {}", path.display()));
        Ok(())
    }

    async fn arm_breakpoints(&mut self, spec: &BreakpointSpec) -> Result<usize> {
        self.calls.push(format!("arm {}", spec));
        if self.armed == 0 {
            return Err(Error::breakpoint_failed(&spec.to_string(), "no function matched"));
        }
        Ok(self.armed)
    }

    async fn start(&mut self) -> Result<()> {
        self.calls.push("start".to_string());
        Ok(())
    }

    async fn wait_for_stop(&mut self) -> Result<StopEvent> {
        self.calls.push("wait".to_string());
        self.in_caller = false;
        self.current = self.hits.pop_front();
        Ok(match self.current {
            Some(_) => StopEvent::Stopped {
                reason: "breakpoint".to_string(),
            },
            None => StopEvent::Exited {
                exit_code: self.exit_code,
            },
        })
    }

    async fn location(&mut self) -> Result<FrameLocation> {
        self.calls.push("location".to_string());
        let in_caller = self.in_caller;
        let hit = self.current("read location")?;
        Ok(if in_caller {
            hit.caller.clone()
        } else {
            hit.location.clone()
        })
    }

    async fn arguments(&mut self) -> Result<Vec<Argument>> {
        self.calls.push("arguments".to_string());
        Ok(self.current("read arguments")?.arguments.clone())
    }

    async fn argument_dump(&mut self) -> Result<String> {
        self.calls.push("dump".to_string());
        Ok(self.current("show arguments")?.dump.clone())
    }

    async fn frame_up(&mut self) -> Result<FrameLocation> {
        self.calls.push("up".to_string());
        if self.in_caller {
            return Err(Error::FrameNotFound(2));
        }
        let caller = self.current("select caller frame")?.caller.clone();
        self.in_caller = true;
        Ok(caller)
    }

    async fn print_variable(&mut self, name: &str) -> Result<String> {
        self.calls.push(format!("print {}", name));
        let in_caller = self.in_caller;
        let hit = self.current("print variable")?;
        let value = if in_caller {
            hit.caller_variables.get(name).cloned()
        } else {
            None
        };
        value.ok_or_else(|| Error::CommandFailed {
            command: format!("output {}", name),
            message: format!("No symbol \"{}\" in current context.", name),
        })
    }

    async fn resume(&mut self) -> Result<()> {
        self.calls.push("resume".to_string());
        self.current("continue")?;
        Ok(())
    }

    async fn terminate(&mut self) -> Result<()> {
        self.calls.push("terminate".to_string());
        self.current = None;
        Ok(())
    }
}
