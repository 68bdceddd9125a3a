//! Text extraction from "show arguments" output
//!
//! This is the primary way argument values are read: structured DAP values
//! stop at a pretty printer's summary line, the CLI dump does not.
//! Debuggers print one `name = value` line per argument;
//! the value may itself contain ` = ` (tables, records), so the split is at
//! the first separator.

/// Separator between an argument's name and its rendering
const SEPARATOR: &str = " = ";

/// Right-hand side of the first `name = value` line in a dump
///
/// Returns None when the dump has no such line (e.g. "No arguments.").
pub fn first_argument_value(dump: &str) -> Option<&str> {
    dump.lines()
        .map(|line| line.trim_end_matches('\r'))
        .find_map(|line| {
            let (name, value) = line.split_once(SEPARATOR)?;
            is_identifier(name.trim()).then_some(value)
        })
}

/// Argument names as debuggers print them (`a`, `x_1`, `this`, `self.x`)
fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '.' || c == '$')
}
