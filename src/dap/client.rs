//! DAP client for communicating with debug adapters
//!
//! The client owns the adapter subprocess and talks to it over stdio. It is
//! strictly request/response driven: nothing reads from the adapter unless a
//! caller is waiting for a response or an event. Events that arrive while a
//! response is awaited are queued for `next_event`.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::io::{BufReader, BufWriter};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use crate::common::{Error, Result};

use super::codec;
use super::types::*;

/// A message read from the adapter
enum Incoming {
    Response(ResponseMessage),
    Event(Event),
}

/// DAP client for communicating with a debug adapter
pub struct DapClient {
    /// Adapter subprocess
    adapter: Child,
    /// Buffered reader for adapter stdout
    reader: BufReader<ChildStdout>,
    /// Buffered writer for adapter stdin
    writer: BufWriter<ChildStdin>,
    /// Sequence number for the next request
    seq: i64,
    /// Per-request timeout
    request_timeout: Duration,
    /// Adapter capabilities (populated after initialize)
    pub capabilities: Capabilities,
    /// Events received while waiting for responses
    events: VecDeque<Event>,
    /// Responses to requests nobody was waiting on yet
    unclaimed: HashMap<i64, ResponseMessage>,
}

impl DapClient {
    /// Spawn a new DAP adapter and create a client
    pub async fn spawn(adapter_path: &Path, args: &[String]) -> Result<Self> {
        let mut cmd = Command::new(adapter_path);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut adapter = cmd.spawn().map_err(|e| {
            Error::AdapterStartFailed(format!(
                "Failed to start {}: {}",
                adapter_path.display(),
                e
            ))
        })?;

        let stdin = adapter
            .stdin
            .take()
            .ok_or_else(|| Error::AdapterStartFailed("Failed to get adapter stdin".to_string()))?;
        let stdout = adapter.stdout.take().ok_or_else(|| {
            Error::AdapterStartFailed("Failed to get adapter stdout".to_string())
        })?;

        tracing::debug!(adapter = %adapter_path.display(), ?args, "Spawned DAP adapter");

        Ok(Self {
            adapter,
            reader: BufReader::new(stdout),
            writer: BufWriter::new(stdin),
            seq: 1,
            request_timeout: Duration::from_secs(30),
            capabilities: Capabilities::default(),
            events: VecDeque::new(),
            unclaimed: HashMap::new(),
        })
    }

    /// Set the timeout applied to every request
    pub fn set_request_timeout(&mut self, timeout: Duration) {
        self.request_timeout = timeout;
    }

    /// Send a request and return its sequence number
    pub async fn send_request(&mut self, command: &str, arguments: Option<Value>) -> Result<i64> {
        let seq = self.seq;
        self.seq += 1;

        let mut request = serde_json::json!({
            "seq": seq,
            "type": "request",
            "command": command,
        });
        if let Some(args) = arguments {
            request["arguments"] = args;
        }

        let json = serde_json::to_string(&request)?;
        tracing::debug!("DAP >>> {}", json);
        codec::write_message(&mut self.writer, &json).await?;

        Ok(seq)
    }

    async fn read_incoming(&mut self) -> Result<Incoming> {
        loop {
            let json = codec::read_message(&mut self.reader).await?;
            tracing::debug!("DAP <<< {}", json);

            let msg: Value = serde_json::from_str(&json)
                .map_err(|e| Error::DapProtocol(format!("Invalid JSON: {}", e)))?;

            match msg.get("type").and_then(|v| v.as_str()) {
                Some("response") => return Ok(Incoming::Response(serde_json::from_value(msg)?)),
                Some("event") => {
                    let event_msg: EventMessage = serde_json::from_value(msg)?;
                    return Ok(Incoming::Event(Event::from_message(&event_msg)));
                }
                // Reverse requests (runInTerminal etc.) are not supported
                other => tracing::warn!("Ignoring DAP message of type {:?}", other),
            }
        }
    }

    /// Read until the response for `seq` arrives, queueing everything else
    async fn wait_response(&mut self, seq: i64) -> Result<ResponseMessage> {
        if let Some(response) = self.unclaimed.remove(&seq) {
            return Ok(response);
        }
        loop {
            match self.read_incoming().await? {
                Incoming::Response(response) if response.request_seq == seq => return Ok(response),
                Incoming::Response(response) => {
                    self.unclaimed.insert(response.request_seq, response);
                }
                Incoming::Event(event) => self.events.push_back(event),
            }
        }
    }

    fn response_body<T: DeserializeOwned>(command: &str, response: ResponseMessage) -> Result<T> {
        if !response.success {
            return Err(Error::dap_request_failed(
                command,
                &response.message.unwrap_or_else(|| "Unknown error".to_string()),
            ));
        }
        let body = response.body.unwrap_or(Value::Null);
        serde_json::from_value(body).map_err(|e| {
            Error::DapProtocol(format!("Failed to parse {} response: {}", command, e))
        })
    }

    /// Send a request and wait for its response body
    pub async fn request<T: DeserializeOwned>(
        &mut self,
        command: &str,
        arguments: Option<Value>,
    ) -> Result<T> {
        let timeout = self.request_timeout;
        let seq = self.send_request(command, arguments).await?;
        let response = tokio::time::timeout(timeout, self.wait_response(seq))
            .await
            .map_err(|_| Error::RequestTimeout(command.to_string(), timeout.as_secs()))??;
        Self::response_body(command, response)
    }

    async fn request_with<A: Serialize, T: DeserializeOwned>(
        &mut self,
        command: &str,
        arguments: &A,
    ) -> Result<T> {
        let args = serde_json::to_value(arguments)?;
        self.request(command, Some(args)).await
    }

    /// Wait for the response to an earlier deferred request
    pub async fn finish_deferred(&mut self, seq: i64, command: &str) -> Result<()> {
        let timeout = self.request_timeout;
        let response = tokio::time::timeout(timeout, self.wait_response(seq))
            .await
            .map_err(|_| Error::RequestTimeout(command.to_string(), timeout.as_secs()))??;
        Self::response_body::<Value>(command, response).map(|_| ())
    }

    /// Next event from the adapter, queued ones first
    pub async fn next_event(&mut self) -> Result<Event> {
        if let Some(event) = self.events.pop_front() {
            return Ok(event);
        }
        loop {
            match self.read_incoming().await? {
                Incoming::Event(event) => return Ok(event),
                Incoming::Response(response) => {
                    self.unclaimed.insert(response.request_seq, response);
                }
            }
        }
    }

    /// Initialize the debug adapter
    pub async fn initialize(&mut self, adapter_id: &str, timeout: Duration) -> Result<Capabilities> {
        let args = serde_json::to_value(InitializeArguments::new(adapter_id))?;
        let seq = self.send_request("initialize", Some(args)).await?;
        let response = tokio::time::timeout(timeout, self.wait_response(seq))
            .await
            .map_err(|_| Error::RequestTimeout("initialize".to_string(), timeout.as_secs()))??;

        let caps: Capabilities = Self::response_body("initialize", response)?;
        self.capabilities = caps.clone();
        Ok(caps)
    }

    /// Wait for the initialized event, keeping other events queued
    pub async fn wait_initialized(&mut self) -> Result<()> {
        let timeout = self.request_timeout;
        tokio::time::timeout(timeout, self.read_until_initialized())
            .await
            .map_err(|_| Error::RequestTimeout("initialized event".to_string(), timeout.as_secs()))?
    }

    async fn read_until_initialized(&mut self) -> Result<()> {
        if let Some(pos) = self
            .events
            .iter()
            .position(|e| matches!(e, Event::Initialized))
        {
            self.events.remove(pos);
            return Ok(());
        }
        loop {
            match self.read_incoming().await? {
                Incoming::Event(Event::Initialized) => return Ok(()),
                Incoming::Event(event) => self.events.push_back(event),
                Incoming::Response(response) => {
                    self.unclaimed.insert(response.request_seq, response);
                }
            }
        }
    }

    /// Send a launch request without waiting for its response
    ///
    /// Several adapters only answer `launch` after `configurationDone`.
    pub async fn launch_deferred(&mut self, args: LaunchArguments) -> Result<i64> {
        self.send_request("launch", Some(serde_json::to_value(&args)?))
            .await
    }

    /// Send an attach request without waiting for its response
    pub async fn attach_deferred(&mut self, args: AttachArguments) -> Result<i64> {
        self.send_request("attach", Some(serde_json::to_value(&args)?))
            .await
    }

    /// Signal that configuration is done
    pub async fn configuration_done(&mut self) -> Result<()> {
        self.request::<Value>("configurationDone", None).await?;
        Ok(())
    }

    /// Set function breakpoints
    pub async fn set_function_breakpoints(&mut self, names: &[String]) -> Result<Vec<Breakpoint>> {
        let args = SetFunctionBreakpointsArguments {
            breakpoints: names
                .iter()
                .map(|name| FunctionBreakpoint { name: name.clone() })
                .collect(),
        };
        let response: BreakpointsResponseBody =
            self.request_with("setFunctionBreakpoints", &args).await?;
        Ok(response.breakpoints)
    }

    /// Continue execution
    pub async fn continue_execution(&mut self, thread_id: i64) -> Result<()> {
        self.request_with::<_, Value>("continue", &ContinueArguments { thread_id })
            .await?;
        Ok(())
    }

    /// Get stack trace
    pub async fn stack_trace(&mut self, thread_id: i64, levels: i64) -> Result<Vec<StackFrame>> {
        let args = StackTraceArguments {
            thread_id,
            start_frame: 0,
            levels,
        };
        let response: StackTraceResponseBody = self.request_with("stackTrace", &args).await?;
        Ok(response.stack_frames)
    }

    /// Get threads
    pub async fn threads(&mut self) -> Result<Vec<Thread>> {
        let response: ThreadsResponseBody = self.request("threads", None).await?;
        Ok(response.threads)
    }

    /// Get scopes for a frame
    pub async fn scopes(&mut self, frame_id: i64) -> Result<Vec<Scope>> {
        let response: ScopesResponseBody = self
            .request_with("scopes", &ScopesArguments { frame_id })
            .await?;
        Ok(response.scopes)
    }

    /// Get variables
    pub async fn variables(&mut self, variables_reference: i64) -> Result<Vec<Variable>> {
        let response: VariablesResponseBody = self
            .request_with("variables", &VariablesArguments { variables_reference })
            .await?;
        Ok(response.variables)
    }

    /// Evaluate an expression
    ///
    /// `context` is "repl" for raw debugger commands and "watch" for
    /// expressions in the given frame.
    pub async fn evaluate(
        &mut self,
        expression: &str,
        frame_id: Option<i64>,
        context: &str,
    ) -> Result<EvaluateResponseBody> {
        let args = EvaluateArguments {
            expression: expression.to_string(),
            frame_id,
            context: context.to_string(),
        };
        self.request_with("evaluate", &args).await
    }

    /// Disconnect from the debug adapter
    pub async fn disconnect(&mut self, terminate_debuggee: bool) -> Result<()> {
        let args = DisconnectArguments { terminate_debuggee };

        // Don't wait for response - adapter might exit immediately
        self.send_request("disconnect", Some(serde_json::to_value(&args)?))
            .await?;

        Ok(())
    }

    /// Disconnect and make sure the adapter process is gone
    pub async fn terminate(&mut self) -> Result<()> {
        if let Err(e) = self.disconnect(true).await {
            tracing::debug!(error = %e, "Disconnect failed, killing adapter");
        }

        match tokio::time::timeout(Duration::from_millis(500), self.adapter.wait()).await {
            Ok(Ok(status)) => tracing::debug!(%status, "Adapter exited"),
            _ => {
                let _ = self.adapter.kill().await;
            }
        }

        Ok(())
    }
}
