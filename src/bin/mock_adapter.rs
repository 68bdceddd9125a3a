//! Mock DAP adapter binary for integration testing
//!
//! Plays a scripted target: a function that is called once per entry of
//! `calls`, each call stopping at a breakpoint when one was installed. The
//! script is a JSON file named by `PPCHECK_MOCK_SCRIPT`:
//!
//! ```json
//! {
//!   "function": "myDebug", "file": "tgdb.nim", "line": 41,
//!   "structured_arguments": true, "dump_arguments": true,
//!   "function_breakpoints": true, "stall_on_continue": false,
//!   "calls": [{"value": "meTwo"}, {"value": "0x7ff", "caller_variables": {"myArray": "..."}}],
//!   "exit_code": 0
//! }
//! ```
//!
//! Raw debugger commands (`set`, `source`, `rbreak`, `info args`, `output`)
//! arrive as `evaluate` requests in `repl` context and are answered
//! gdb-style. Like gdb, structured values (`variables`, watch expressions)
//! only carry a container's summary line: `seq(3, 3)` for
//! `seq(3, 3) = {1, 2, 3}`.

use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;

const SCRIPT_ENV: &str = "PPCHECK_MOCK_SCRIPT";

const THREAD_ID: i64 = 1;
const CALLEE_FRAME: i64 = 1;
const CALLER_FRAME: i64 = 2;
const CALLER_LINE: u32 = 80;
const ARGUMENTS_REF: i64 = 100;
const LOCALS_REF: i64 = 200;

#[derive(Debug, Deserialize)]
struct Script {
    #[serde(default = "default_function")]
    function: String,
    #[serde(default = "default_file")]
    file: String,
    #[serde(default = "default_line")]
    line: u32,
    #[serde(default = "default_true")]
    structured_arguments: bool,
    /// `info args` prints the arguments; otherwise it has no symbol info
    #[serde(default = "default_true")]
    dump_arguments: bool,
    #[serde(default = "default_true")]
    function_breakpoints: bool,
    /// Accept `continue` but never report another stop
    #[serde(default)]
    stall_on_continue: bool,
    calls: Vec<Call>,
    #[serde(default)]
    exit_code: i32,
}

#[derive(Debug, Deserialize)]
struct Call {
    value: String,
    /// Overrides the script's line for this call
    line: Option<u32>,
    #[serde(default)]
    caller_variables: HashMap<String, String>,
}

fn default_function() -> String {
    "myDebug".to_string()
}

fn default_file() -> String {
    "tgdb.nim".to_string()
}

fn default_line() -> u32 {
    41
}

fn default_true() -> bool {
    true
}

/// Summary line of a pretty-printed value
fn summary(rendering: &str) -> &str {
    rendering
        .split_once(" = {")
        .map_or(rendering, |(head, _)| head)
}

fn main() {
    let script = match load_script() {
        Ok(script) => script,
        Err(e) => {
            eprintln!("mock_adapter: {}", e);
            std::process::exit(2);
        }
    };

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let mut reader = BufReader::new(stdin.lock());
    let mut writer = stdout.lock();

    let mut state = MockState::new(script);

    loop {
        // Read Content-Length header
        let mut header_line = String::new();
        if reader.read_line(&mut header_line).unwrap_or(0) == 0 {
            break; // EOF
        }

        if !header_line.starts_with("Content-Length:") {
            continue;
        }

        let content_length: usize = header_line
            .trim_start_matches("Content-Length:")
            .trim()
            .parse()
            .unwrap_or(0);

        // Read empty line
        let mut empty_line = String::new();
        reader.read_line(&mut empty_line).ok();

        // Read JSON body
        let mut body = vec![0u8; content_length];
        if reader.read_exact(&mut body).is_err() {
            break;
        }

        let message: Value = match serde_json::from_slice(&body) {
            Ok(v) => v,
            Err(_) => continue,
        };

        for outgoing in state.process_message(&message) {
            send_message(&mut writer, &outgoing);
        }

        if state.disconnected {
            break;
        }
    }
}

fn load_script() -> Result<Script, String> {
    let path = std::env::var(SCRIPT_ENV).map_err(|_| format!("{} is not set", SCRIPT_ENV))?;
    let content =
        std::fs::read_to_string(&path).map_err(|e| format!("cannot read {}: {}", path, e))?;
    serde_json::from_str(&content).map_err(|e| format!("invalid script {}: {}", path, e))
}

fn send_message<W: Write>(writer: &mut W, message: &Value) {
    let body = message.to_string();
    let header = format!("Content-Length: {}\r\n\r\n", body.len());
    writer.write_all(header.as_bytes()).ok();
    writer.write_all(body.as_bytes()).ok();
    writer.flush().ok();
}

struct MockState {
    script: Script,
    seq: i64,
    /// launch/attach request answered after configurationDone
    pending_start: Option<(i64, String)>,
    armed: bool,
    /// Index into `script.calls` of the call the target is stopped in
    current: Option<usize>,
    next_call: usize,
    disconnected: bool,
}

impl MockState {
    fn new(script: Script) -> Self {
        Self {
            script,
            seq: 1,
            pending_start: None,
            armed: false,
            current: None,
            next_call: 0,
            disconnected: false,
        }
    }

    fn next_seq(&mut self) -> i64 {
        let seq = self.seq;
        self.seq += 1;
        seq
    }

    fn response(&mut self, request_seq: i64, command: &str, result: Result<Value, String>) -> Value {
        let seq = self.next_seq();
        match result {
            Ok(body) => json!({
                "seq": seq,
                "type": "response",
                "request_seq": request_seq,
                "success": true,
                "command": command,
                "body": body,
            }),
            Err(message) => json!({
                "seq": seq,
                "type": "response",
                "request_seq": request_seq,
                "success": false,
                "command": command,
                "message": message,
            }),
        }
    }

    fn event(&mut self, event: &str, body: Value) -> Value {
        let seq = self.next_seq();
        json!({
            "seq": seq,
            "type": "event",
            "event": event,
            "body": body,
        })
    }

    /// Run the target until the next armed call, or to exit
    fn run_target(&mut self, out: &mut Vec<Value>) {
        self.current = None;
        if self.armed && self.next_call < self.script.calls.len() {
            self.current = Some(self.next_call);
            self.next_call += 1;
            let stopped = self.event(
                "stopped",
                json!({"reason": "breakpoint", "threadId": THREAD_ID, "allThreadsStopped": true}),
            );
            out.push(stopped);
            return;
        }

        self.next_call = self.script.calls.len();
        let exited = self.event("exited", json!({"exitCode": self.script.exit_code}));
        out.push(exited);
        let terminated = self.event("terminated", json!({}));
        out.push(terminated);
    }

    fn current_call(&self) -> Result<&Call, String> {
        self.current
            .and_then(|i| self.script.calls.get(i))
            .ok_or_else(|| "The program is not being run.".to_string())
    }

    fn process_message(&mut self, message: &Value) -> Vec<Value> {
        let mut out = Vec::new();

        if message.get("type").and_then(Value::as_str) != Some("request") {
            return out;
        }
        let Some(command) = message.get("command").and_then(Value::as_str) else {
            return out;
        };
        let request_seq = message.get("seq").and_then(Value::as_i64).unwrap_or(0);
        let arguments = message.get("arguments").cloned().unwrap_or(json!({}));

        let result = match command {
            "initialize" => Ok(json!({
                "supportsConfigurationDoneRequest": true,
                "supportsFunctionBreakpoints": self.script.function_breakpoints,
                "supportsTerminateRequest": true
            })),
            "launch" | "attach" => {
                // Answered after configurationDone, like gdb
                self.pending_start = Some((request_seq, command.to_string()));
                let initialized = self.event("initialized", json!({}));
                out.push(initialized);
                return out;
            }
            "setFunctionBreakpoints" => {
                let names: Vec<String> = arguments
                    .get("breakpoints")
                    .and_then(Value::as_array)
                    .map(|bps| {
                        bps.iter()
                            .filter_map(|bp| bp.get("name").and_then(Value::as_str))
                            .map(String::from)
                            .collect()
                    })
                    .unwrap_or_default();
                let breakpoints: Vec<Value> = names
                    .iter()
                    .enumerate()
                    .map(|(i, name)| {
                        let verified = *name == self.script.function;
                        self.armed |= verified;
                        if verified {
                            json!({"id": i + 1, "verified": true, "line": self.script.line})
                        } else {
                            json!({"verified": false, "message": format!("Function \"{}\" not defined.", name)})
                        }
                    })
                    .collect();
                Ok(json!({ "breakpoints": breakpoints }))
            }
            "configurationDone" => {
                let done = self.response(request_seq, command, Ok(Value::Null));
                out.push(done);
                if let Some((seq, start_command)) = self.pending_start.take() {
                    let started = self.response(seq, &start_command, Ok(Value::Null));
                    out.push(started);
                }
                self.run_target(&mut out);
                return out;
            }
            "evaluate" => self.evaluate(&arguments),
            "threads" => Ok(json!({"threads": [{"id": THREAD_ID, "name": "main"}]})),
            "stackTrace" => self.current_call().map(|call| {
                let line = call.line.unwrap_or(self.script.line);
                json!({
                    "stackFrames": [
                        {
                            "id": CALLEE_FRAME,
                            "name": self.script.function,
                            "source": {"name": self.script.file, "path": format!("/src/{}", self.script.file)},
                            "line": line,
                            "column": 1
                        },
                        {
                            "id": CALLER_FRAME,
                            "name": "main",
                            "source": {"name": self.script.file, "path": format!("/src/{}", self.script.file)},
                            "line": CALLER_LINE,
                            "column": 1
                        }
                    ],
                    "totalFrames": 2
                })
            }),
            "scopes" => {
                let frame_id = arguments.get("frameId").and_then(Value::as_i64);
                let mut scopes = Vec::new();
                if self.script.structured_arguments && frame_id == Some(CALLEE_FRAME) {
                    scopes.push(json!({
                        "name": "Arguments",
                        "presentationHint": "arguments",
                        "variablesReference": ARGUMENTS_REF,
                        "expensive": false
                    }));
                }
                scopes.push(json!({
                    "name": "Locals",
                    "presentationHint": "locals",
                    "variablesReference": LOCALS_REF,
                    "expensive": false
                }));
                Ok(json!({ "scopes": scopes }))
            }
            "variables" => {
                let reference = arguments.get("variablesReference").and_then(Value::as_i64);
                match (reference, self.current_call()) {
                    (Some(ARGUMENTS_REF), Ok(call)) => Ok(json!({
                        "variables": [{"name": "a", "value": summary(&call.value), "variablesReference": 0}]
                    })),
                    (_, Ok(_)) => Ok(json!({ "variables": [] })),
                    (_, Err(e)) => Err(e),
                }
            }
            "continue" => {
                let resp = self.response(request_seq, command, Ok(json!({"allThreadsContinued": true})));
                out.push(resp);
                if !self.script.stall_on_continue {
                    self.run_target(&mut out);
                }
                return out;
            }
            "disconnect" | "terminate" => {
                self.disconnected = command == "disconnect";
                Ok(Value::Null)
            }
            other => Err(format!("Unsupported request '{}'", other)),
        };

        let resp = self.response(request_seq, command, result);
        out.push(resp);
        out
    }

    fn evaluate(&mut self, arguments: &Value) -> Result<Value, String> {
        let expression = arguments
            .get("expression")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim();
        let context = arguments
            .get("context")
            .and_then(Value::as_str)
            .unwrap_or("repl");
        let frame_id = arguments.get("frameId").and_then(Value::as_i64);

        let result = if context == "repl" {
            self.repl(expression, frame_id)?
        } else {
            let call = self.current_call()?;
            let value = match frame_id {
                Some(CALLER_FRAME) => call.caller_variables.get(expression),
                _ => None,
            };
            value
                .map(|v| summary(v).to_string())
                .ok_or_else(|| format!("No symbol \"{}\" in current context.", expression))?
        };

        Ok(json!({"result": result, "variablesReference": 0}))
    }

    fn repl(&mut self, command: &str, frame_id: Option<i64>) -> Result<String, String> {
        let (verb, rest) = command.split_once(' ').unwrap_or((command, ""));
        match verb {
            "set" => Ok(String::new()),
            "source" => {
                if Path::new(rest).is_file() {
                    Ok(String::new())
                } else {
                    Err(format!("{}: No such file or directory.", rest))
                }
            }
            "rbreak" => {
                if self.script.function.contains(rest) {
                    self.armed = true;
                    Ok(format!(
                        "Breakpoint 1 at 0x401136: file {}, line {}.\nvoid {}(int);\n",
                        self.script.file, self.script.line, self.script.function
                    ))
                } else {
                    Ok(String::new())
                }
            }
            "info" if rest == "args" => {
                let call = self.current_call()?;
                if frame_id == Some(CALLER_FRAME) {
                    Ok("No arguments.\n".to_string())
                } else if self.script.dump_arguments {
                    Ok(format!("a = {}\n", call.value))
                } else {
                    Ok("No symbol table info available.\n".to_string())
                }
            }
            "output" => {
                let call = self.current_call()?;
                let value = match frame_id {
                    Some(CALLER_FRAME) => call.caller_variables.get(rest),
                    _ => None,
                };
                value
                    .cloned()
                    .ok_or_else(|| format!("No symbol \"{}\" in current context.", rest))
            }
            _ => Err(format!("Undefined command: \"{}\".", verb)),
        }
    }
}
