//! DAP-backed debug session
//!
//! Raw debugger commands (diagnostics settings, extension loading, pattern
//! breakpoints, "show arguments", printing a variable) go through `evaluate`
//! in `repl` context, which gdb and lldb-dap both forward to their command
//! interpreters. Values are always read that way: the structured `variables`
//! of a pretty-printed value only carry its summary line.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use crate::common::config::{CommandTemplates, Config};
use crate::common::{Error, Result};
use crate::dap::{AttachArguments, DapClient, Event, LaunchArguments, StackFrame};

use super::{Argument, BreakpointSpec, DebugSession, FrameLocation, StopEvent};

/// Frames fetched per stack trace request
const FRAME_BATCH: usize = 20;

/// What the session debugs
#[derive(Debug, Clone)]
pub enum SessionTarget {
    /// Start the program under the debugger
    Launch {
        program: PathBuf,
        args: Vec<String>,
        cwd: Option<PathBuf>,
    },
    /// Attach to an already running process
    Attach { pid: u32, program: Option<PathBuf> },
}

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    /// Target not running yet, breakpoints may be installed
    Configuring,
    /// Target is running
    Running,
    /// Target is suspended
    Stopped,
    /// Target exited or the adapter ended the session
    Finished,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuring => write!(f, "configuring"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

/// Debug session over a DAP adapter
pub struct DapSession {
    client: DapClient,
    state: SessionState,
    commands: CommandTemplates,
    /// Bound on `wait_for_stop`, None waits forever
    stop_timeout: Option<Duration>,
    /// launch/attach request whose response may still be outstanding
    deferred: Option<(i64, &'static str)>,
    stopped_thread: Option<i64>,
    frames: Vec<StackFrame>,
    frame_index: usize,
    terminated: bool,
}

impl DapSession {
    /// Spawn the adapter, initialize it and send the launch/attach request
    ///
    /// The target does not run until `start` is called, so breakpoints and
    /// debugger settings can be installed first.
    #[tracing::instrument(skip_all, fields(adapter = %adapter_name))]
    pub async fn connect(config: &Config, adapter_name: &str, target: SessionTarget) -> Result<Self> {
        let adapter = config.get_adapter(adapter_name).ok_or_else(|| {
            Error::adapter_not_found(adapter_name, &["config adapters", "PATH"])
        })?;

        tracing::info!(
            adapter_path = %adapter.path.display(),
            adapter_args = ?adapter.args,
            ?target,
            "Connecting debug session"
        );

        let mut client = DapClient::spawn(&adapter.path, &adapter.args).await?;
        client.set_request_timeout(Duration::from_secs(config.timeouts.dap_request_secs));

        let capabilities = client
            .initialize(
                adapter_name,
                Duration::from_secs(config.timeouts.dap_initialize_secs),
            )
            .await?;
        tracing::debug!(?capabilities, "DAP adapter initialized");

        let deferred = match target {
            SessionTarget::Launch { program, args, cwd } => {
                let cwd = cwd
                    .or_else(|| std::env::current_dir().ok())
                    .map(|p| p.to_string_lossy().into_owned());
                let seq = client
                    .launch_deferred(LaunchArguments {
                        program: program.to_string_lossy().into_owned(),
                        args,
                        cwd,
                        stop_on_entry: false,
                    })
                    .await?;
                (seq, "launch")
            }
            SessionTarget::Attach { pid, program } => {
                let seq = client
                    .attach_deferred(AttachArguments {
                        pid,
                        program: program.map(|p| p.to_string_lossy().into_owned()),
                    })
                    .await?;
                (seq, "attach")
            }
        };

        client.wait_initialized().await?;
        tracing::debug!("Received DAP initialized event");

        let stop_timeout = match config.timeouts.stop_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Ok(Self {
            client,
            state: SessionState::Configuring,
            commands: config.commands.clone(),
            stop_timeout,
            deferred: Some(deferred),
            stopped_thread: None,
            frames: Vec::new(),
            frame_index: 0,
            terminated: false,
        })
    }

    fn ensure_stopped(&self, action: &str) -> Result<()> {
        match self.state {
            SessionState::Stopped => Ok(()),
            state => Err(Error::invalid_state(action, &state.to_string())),
        }
    }

    async fn thread_id(&mut self) -> Result<i64> {
        if let Some(id) = self.stopped_thread {
            return Ok(id);
        }
        let threads = self.client.threads().await?;
        let id = threads
            .first()
            .map(|t| t.id)
            .ok_or_else(|| Error::Internal("No threads available".to_string()))?;
        self.stopped_thread = Some(id);
        Ok(id)
    }

    /// Make sure frame `index` is in the cache and return it
    async fn frame(&mut self, index: usize) -> Result<&StackFrame> {
        if index >= self.frames.len() {
            let thread_id = self.thread_id().await?;
            let levels = (index + 1).max(FRAME_BATCH) as i64;
            self.frames = self.client.stack_trace(thread_id, levels).await?;
        }
        self.frames.get(index).ok_or(Error::FrameNotFound(index))
    }

    async fn selected_frame_id(&mut self) -> Result<i64> {
        let index = self.frame_index;
        Ok(self.frame(index).await?.id)
    }

    fn forget_stop(&mut self) {
        self.stopped_thread = None;
        self.frames.clear();
        self.frame_index = 0;
    }

    async fn next_stop(&mut self) -> Result<StopEvent> {
        loop {
            let event = self.client.next_event().await?;

            match event {
                Event::Stopped(body) => {
                    tracing::debug!(reason = %body.reason, thread = ?body.thread_id, "Target stopped");
                    self.forget_stop();
                    self.stopped_thread = body.thread_id;
                    self.state = SessionState::Stopped;
                    return Ok(StopEvent::Stopped {
                        reason: body.reason,
                    });
                }
                Event::Exited(body) => {
                    tracing::info!(exit_code = body.exit_code, "Target exited");
                    self.state = SessionState::Finished;
                    return Ok(StopEvent::Exited {
                        exit_code: body.exit_code,
                    });
                }
                Event::Terminated => {
                    tracing::info!("Debug session terminated by adapter");
                    self.state = SessionState::Finished;
                    return Ok(StopEvent::Terminated);
                }
                Event::Output(body) => {
                    tracing::debug!(
                        category = body.category.as_deref().unwrap_or("console"),
                        "{}",
                        body.output.trim_end()
                    );
                }
                Event::Initialized => {}
                Event::Other { event, .. } => tracing::trace!(%event, "Ignoring DAP event"),
            }
        }
    }

    fn to_location(frame: &StackFrame) -> FrameLocation {
        FrameLocation {
            function: frame.name.clone(),
            file: frame
                .source
                .as_ref()
                .and_then(|s| s.path.clone().or_else(|| s.name.clone())),
            line: frame.line,
        }
    }
}

/// Count breakpoint locations reported by a pattern-break command
///
/// gdb prints one `Breakpoint N at ...` line per function; lldb prints
/// `Breakpoint N: K locations.` once.
fn count_reported_breakpoints(output: &str) -> usize {
    output
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("Breakpoint "))
        .map(|line| {
            line.split_once(" locations")
                .and_then(|(head, _)| head.rsplit(' ').next())
                .and_then(|n| n.parse::<usize>().ok())
                .unwrap_or(1)
        })
        .sum()
}

#[async_trait]
impl DebugSession for DapSession {
    async fn execute(&mut self, command: &str) -> Result<String> {
        let frame_id = match self.state {
            SessionState::Stopped => Some(self.selected_frame_id().await?),
            _ => None,
        };
        tracing::debug!(%command, ?frame_id, "Executing debugger command");

        match self.client.evaluate(command, frame_id, "repl").await {
            Ok(body) => Ok(body.result),
            Err(Error::DapRequestFailed { message, .. }) => Err(Error::CommandFailed {
                command: command.to_string(),
                message,
            }),
            Err(e) => Err(e),
        }
    }

    async fn load_extension(&mut self, path: &Path) -> Result<()> {
        let command = self.commands.load_extension_command(path);
        let output = self.execute(&command).await?;
        tracing::info!(extension = %path.display(), "Loaded formatting extension");
        if !output.trim().is_empty() {
            tracing::debug!("{}", output.trim_end());
        }
        Ok(())
    }

    async fn arm_breakpoints(&mut self, spec: &BreakpointSpec) -> Result<usize> {
        if self.state != SessionState::Configuring {
            return Err(Error::invalid_state("install breakpoints", &self.state.to_string()));
        }

        let armed = match spec {
            BreakpointSpec::Function(name) => {
                if !self.client.capabilities.supports_function_breakpoints {
                    return Err(Error::breakpoint_failed(
                        &spec.to_string(),
                        "adapter does not support function breakpoints",
                    ));
                }
                let results = self
                    .client
                    .set_function_breakpoints(std::slice::from_ref(name))
                    .await?;
                let verified = results.iter().filter(|bp| bp.verified).count();
                if verified == 0 {
                    let reason = results
                        .iter()
                        .find_map(|bp| bp.message.clone())
                        .unwrap_or_else(|| "adapter did not verify the breakpoint".to_string());
                    return Err(Error::breakpoint_failed(&spec.to_string(), &reason));
                }
                verified
            }
            BreakpointSpec::Pattern(pattern) => {
                let command = self.commands.pattern_breakpoint_command(pattern);
                let output = self.execute(&command).await?;
                match count_reported_breakpoints(&output) {
                    0 => {
                        return Err(Error::breakpoint_failed(
                            &spec.to_string(),
                            &format!("no function matched ({})", output.trim()),
                        ))
                    }
                    n => n,
                }
            }
        };

        tracing::info!(%spec, armed, "Breakpoints installed");
        Ok(armed)
    }

    async fn start(&mut self) -> Result<()> {
        if self.state != SessionState::Configuring {
            return Err(Error::invalid_state("start", &self.state.to_string()));
        }
        self.client.configuration_done().await?;
        // gdb answers launch/attach only once configuration is done
        if let Some((seq, command)) = self.deferred.take() {
            self.client.finish_deferred(seq, command).await?;
        }
        self.state = SessionState::Running;
        tracing::debug!("DAP configuration complete, target running");
        Ok(())
    }

    async fn wait_for_stop(&mut self) -> Result<StopEvent> {
        if self.state == SessionState::Finished {
            return Ok(StopEvent::Terminated);
        }
        match self.stop_timeout {
            Some(limit) => tokio::time::timeout(limit, self.next_stop())
                .await
                .map_err(|_| Error::StopTimeout(limit.as_secs()))?,
            None => self.next_stop().await,
        }
    }

    async fn location(&mut self) -> Result<FrameLocation> {
        self.ensure_stopped("read location")?;
        let index = self.frame_index;
        let frame = self.frame(index).await?;
        Ok(Self::to_location(frame))
    }

    async fn arguments(&mut self) -> Result<Vec<Argument>> {
        self.ensure_stopped("read arguments")?;
        let frame_id = self.selected_frame_id().await?;
        let scopes = self.client.scopes(frame_id).await?;

        let Some(scope) = scopes.into_iter().find(|s| s.is_arguments()) else {
            return Ok(Vec::new());
        };

        let variables = self.client.variables(scope.variables_reference).await?;
        Ok(variables
            .into_iter()
            .map(|v| Argument {
                name: v.name,
                value: v.value,
            })
            .collect())
    }

    async fn argument_dump(&mut self) -> Result<String> {
        self.ensure_stopped("show arguments")?;
        let command = self.commands.show_arguments.clone();
        self.execute(&command).await
    }

    async fn frame_up(&mut self) -> Result<FrameLocation> {
        self.ensure_stopped("select caller frame")?;
        let index = self.frame_index + 1;
        let location = Self::to_location(self.frame(index).await?);
        self.frame_index = index;
        Ok(location)
    }

    async fn print_variable(&mut self, name: &str) -> Result<String> {
        self.ensure_stopped("print variable")?;
        let command = self.commands.print_variable_command(name);
        let output = self.execute(&command).await?;
        Ok(output.trim_end_matches(['\r', '\n']).to_string())
    }

    async fn resume(&mut self) -> Result<()> {
        self.ensure_stopped("continue")?;
        let thread_id = self.thread_id().await?;
        self.client.continue_execution(thread_id).await?;
        self.forget_stop();
        self.state = SessionState::Running;
        Ok(())
    }

    async fn terminate(&mut self) -> Result<()> {
        if self.terminated {
            return Ok(());
        }
        self.terminated = true;
        self.state = SessionState::Finished;
        self.client.terminate().await
    }
}
