//! End-to-end tests for the ppcheck CLI
//!
//! Each test writes a fixture, a config and a mock adapter script into a
//! temporary directory, then runs the `ppcheck` binary against the
//! `mock_adapter` binary over real DAP stdio.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::{json, Value};
use tempfile::TempDir;

/// Test context with a scratch directory holding fixture, config and script
struct TestContext {
    dir: TempDir,
}

impl TestContext {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");

        // Stand-ins for the compiled target and the formatting extension
        fs::write(dir.path().join("tgdb"), "").unwrap();
        fs::write(dir.path().join("nim-gdb.py"), "# printers\n").unwrap();

        let ctx = Self { dir };
        ctx.write_config(20);
        ctx
    }

    fn write_config(&self, stop_secs: u64) {
        let config = format!(
            "[adapters.mock]\npath = {:?}\n\n[defaults]\nadapter = \"mock\"\n\n[timeouts]\nstop_secs = {}\n",
            env!("CARGO_BIN_EXE_mock_adapter"),
            stop_secs
        );
        fs::write(self.path("config.toml"), config).unwrap();
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn write_fixture(&self, cases: &str) -> PathBuf {
        self.write_raw_fixture(&format!(
            r#"name: mock printers
target:
  program: tgdb
debugger:
  diagnostics: ["set python print-stack full"]
  extensions: [nim-gdb.py]
breakpoint: {{kind: pattern, name: myDebug}}
stop: {{line: 41, function: myDebug}}
cases:
{}"#,
            cases
        ))
    }

    fn write_raw_fixture(&self, content: &str) -> PathBuf {
        let path = self.path("fixture.yaml");
        fs::write(&path, content).unwrap();
        path
    }

    fn write_script(&self, script: Value) {
        fs::write(self.path("script.json"), script.to_string()).unwrap();
    }

    fn ppcheck(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_ppcheck"))
            .args(args)
            .env("PPCHECK_MOCK_SCRIPT", self.path("script.json"))
            .env("NO_COLOR", "1")
            .env_remove("RUST_LOG")
            .current_dir(self.dir.path())
            .output()
            .expect("Failed to run ppcheck")
    }

    fn run(&self, fixture: &Path, extra: &[&str]) -> Output {
        let fixture = fixture.to_string_lossy().into_owned();
        let config = self.path("config.toml").to_string_lossy().into_owned();
        let mut args = vec!["run", fixture.as_str(), "--config", config.as_str()];
        args.extend_from_slice(extra);
        self.ppcheck(&args)
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn calls(values: &[&str]) -> Value {
    Value::Array(values.iter().map(|v| json!({ "value": v })).collect())
}

#[test]
fn test_all_cases_pass() {
    let ctx = TestContext::new();
    let fixture = ctx.write_fixture(
        "  - expect: meTwo\n  - expect: '\"\"'\n  - expect: 'Table(3, 64) = {[4] = \"four\", [5] = \"five\", [6] = \"six\"}'\n",
    );
    ctx.write_script(json!({
        "calls": calls(&["meTwo", "\"\"", "Table(3, 64) = {[4] = \"four\", [5] = \"five\", [6] = \"six\"}"])
    }));

    let output = ctx.run(&fixture, &[]);
    let out = stdout(&output);

    assert_eq!(output.status.code(), Some(0), "stdout:\n{}\nstderr:\n{}", out, stderr(&output));
    assert!(out.contains("1) expecting: meTwo: passed"), "{}", out);
    assert!(out.contains("2) expecting: \"\": passed"), "{}", out);
    assert!(out.contains(
        "3) expecting: Table(3, 64) = {[4] = \"four\", [5] = \"five\", [6] = \"six\"}: passed"
    ));
}

#[test]
fn test_container_rendered_in_full() {
    let ctx = TestContext::new();
    let fixture = ctx.write_fixture("  - expect: 'seq(3, 3) = {1, 2, 3}'\n");
    ctx.write_script(json!({ "calls": calls(&["seq(3, 3) = {1, 2, 3}"]) }));

    let output = ctx.run(&fixture, &[]);
    let out = stdout(&output);

    assert_eq!(output.status.code(), Some(0), "stdout:\n{}\nstderr:\n{}", out, stderr(&output));
    assert!(out.contains("1) expecting: seq(3, 3) = {1, 2, 3}: passed"), "{}", out);
}

#[test]
fn test_structured_arguments_when_dump_has_none() {
    let ctx = TestContext::new();
    let fixture = ctx.write_fixture("  - expect: MyOtherEnum(1)\n");
    ctx.write_script(json!({
        "dump_arguments": false,
        "calls": calls(&["MyOtherEnum(1)"])
    }));

    let output = ctx.run(&fixture, &[]);

    assert_eq!(output.status.code(), Some(0), "{}", stderr(&output));
    assert!(stdout(&output).contains("1) expecting: MyOtherEnum(1): passed"));
}

#[test]
fn test_no_structured_arguments() {
    let ctx = TestContext::new();
    let fixture = ctx.write_fixture("  - expect: '{a = 1, b = \"some string\"}'\n");
    ctx.write_script(json!({
        "structured_arguments": false,
        "calls": calls(&["{a = 1, b = \"some string\"}"])
    }));

    let output = ctx.run(&fixture, &[]);

    assert_eq!(output.status.code(), Some(0), "{}", stderr(&output));
    assert!(stdout(&output).contains("1) expecting: {a = 1, b = \"some string\"}: passed"));
}

#[test]
fn test_caller_variable_case() {
    let ctx = TestContext::new();
    let fixture = ctx.write_fixture(
        "  - expect: '5'\n  - expect: 'array = {1, 2, 3, 4, 5}'\n    caller_variable: myArray\n",
    );
    ctx.write_script(json!({
        "calls": [
            {"value": "5"},
            {"value": "0x7ffd5c", "caller_variables": {"myArray": "array = {1, 2, 3, 4, 5}"}}
        ]
    }));

    let output = ctx.run(&fixture, &[]);

    assert_eq!(output.status.code(), Some(0), "{}", stderr(&output));
    assert!(stdout(&output).contains("2) expecting: array = {1, 2, 3, 4, 5}: passed"));
}

#[test]
fn test_mismatch_halts_run() {
    let ctx = TestContext::new();
    let fixture =
        ctx.write_fixture("  - expect: meTwo\n  - expect: seq(0, 0)\n  - expect: seq(0, 10)\n");
    ctx.write_script(json!({ "calls": calls(&["meTwo", "seq(0, 1)", "seq(0, 10)"]) }));

    let output = ctx.run(&fixture, &[]);
    let out = stdout(&output);

    assert_eq!(output.status.code(), Some(1));
    assert!(out.contains("2) expecting: seq(0, 0): FAILED"), "{}", out);
    assert!(!out.contains("3) expecting"), "{}", out);
    assert!(stderr(&output).contains(" (seq(0, 1)) != expected: (seq(0, 0))"));
}

#[test]
fn test_wrong_stop_line_fails() {
    let ctx = TestContext::new();
    let fixture = ctx.write_fixture("  - expect: meTwo\n");
    ctx.write_script(json!({ "calls": [{"value": "meTwo", "line": 17}] }));

    let output = ctx.run(&fixture, &[]);

    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    assert!(err.contains("17") && err.contains("41"), "{}", err);
}

#[test]
fn test_extra_breakpoint_hit_fails() {
    let ctx = TestContext::new();
    let fixture = ctx.write_fixture("  - expect: meTwo\n");
    ctx.write_script(json!({ "calls": calls(&["meTwo", "meOne"]) }));

    let output = ctx.run(&fixture, &[]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("after all 1 cases"));
}

#[test]
fn test_target_exits_early() {
    let ctx = TestContext::new();
    let fixture = ctx.write_fixture("  - expect: meTwo\n  - expect: meOne\n");
    ctx.write_script(json!({ "calls": calls(&["meTwo"]), "exit_code": 0 }));

    let output = ctx.run(&fixture, &[]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("before case 2"));
}

#[test]
fn test_json_report() {
    let ctx = TestContext::new();
    let fixture = ctx.write_fixture("  - expect: meTwo\n  - expect: meOne\n");
    ctx.write_script(json!({ "calls": calls(&["meTwo", "meThree"]) }));

    let output = ctx.run(&fixture, &["--json"]);
    let report: Value = serde_json::from_slice(&output.stdout).expect("stdout is a JSON report");

    assert_eq!(output.status.code(), Some(1));
    assert_eq!(report["cases_total"], 2);
    assert_eq!(report["failure"]["kind"], "value_mismatch");
    assert_eq!(report["failure"]["observed"], "meThree");
    assert_eq!(report["outcomes"][0]["passed"], true);
}

#[test]
fn test_missing_extension_is_harness_error() {
    let ctx = TestContext::new();
    fs::remove_file(ctx.path("nim-gdb.py")).unwrap();
    let fixture = ctx.write_fixture("  - expect: meTwo\n");
    ctx.write_script(json!({ "calls": calls(&["meTwo"]) }));

    let output = ctx.run(&fixture, &[]);

    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("No such file"));
}

#[test]
fn test_unmatched_breakpoint_pattern_is_harness_error() {
    let ctx = TestContext::new();
    let fixture = ctx.write_fixture("  - expect: meTwo\n");
    ctx.write_script(json!({ "function": "somethingElse", "calls": calls(&["meTwo"]) }));

    let output = ctx.run(&fixture, &[]);

    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("myDebug"));
}

#[test]
fn test_function_breakpoint() {
    let ctx = TestContext::new();
    let fixture = ctx.write_raw_fixture(
        r#"name: function breakpoint
target: {program: tgdb}
breakpoint: {kind: function, name: myDebug}
cases:
  - expect: MyOtherEnum(1)
"#,
    );
    ctx.write_script(json!({ "calls": calls(&["MyOtherEnum(1)"]) }));

    let output = ctx.run(&fixture, &[]);

    assert_eq!(output.status.code(), Some(0), "{}", stderr(&output));
}

#[test]
fn test_fixture_given_as_bare_file_name() {
    let ctx = TestContext::new();
    ctx.write_fixture("  - expect: meTwo\n");
    ctx.write_script(json!({ "calls": calls(&["meTwo"]) }));

    let output = ctx.run(Path::new("fixture.yaml"), &[]);

    assert_eq!(output.status.code(), Some(0), "{}", stderr(&output));
    assert!(stdout(&output).contains("1) expecting: meTwo: passed"));
}

#[test]
fn test_function_breakpoints_unsupported_is_harness_error() {
    let ctx = TestContext::new();
    let fixture = ctx.write_raw_fixture(
        r#"name: function breakpoint
target: {program: tgdb}
breakpoint: {kind: function, name: myDebug}
cases:
  - expect: MyOtherEnum(1)
"#,
    );
    ctx.write_script(json!({
        "function_breakpoints": false,
        "calls": calls(&["MyOtherEnum(1)"])
    }));

    let output = ctx.run(&fixture, &[]);
    let err = stderr(&output);

    assert_eq!(output.status.code(), Some(2), "{}", err);
    assert!(err.contains("does not support function breakpoints"), "{}", err);
}

#[test]
fn test_stop_timeout_is_harness_error() {
    let ctx = TestContext::new();
    ctx.write_config(1);
    let fixture = ctx.write_fixture("  - expect: meTwo\n  - expect: meOne\n");
    ctx.write_script(json!({
        "stall_on_continue": true,
        "calls": calls(&["meTwo", "meOne"])
    }));

    let output = ctx.run(&fixture, &[]);
    let err = stderr(&output);

    assert_eq!(output.status.code(), Some(2), "{}", err);
    assert!(err.contains("No stop event after 1 seconds"), "{}", err);
    assert!(stdout(&output).contains("1) expecting: meTwo: passed"));
}

#[test]
fn test_check_shipped_fixture() {
    let ctx = TestContext::new();
    let fixture = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures")
        .join("nim-gdb.yaml");

    let output = ctx.ppcheck(&["check", fixture.to_str().unwrap()]);
    let out = stdout(&output);

    assert_eq!(output.status.code(), Some(0), "{}", stderr(&output));
    assert!(out.contains("(15 cases)"), "{}", out);
    assert!(out.contains("caller variable myArray"), "{}", out);
}

#[test]
fn test_invalid_fixture_is_harness_error() {
    let ctx = TestContext::new();
    let fixture = ctx.write_raw_fixture("name: broken\ncases: []\n");

    let output = ctx.ppcheck(&["check", fixture.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("fixture.yaml"));
}
