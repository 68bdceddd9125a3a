//! Logging and tracing configuration
//!
//! Logs go to stderr so they never interleave with the progress lines on
//! stdout. A log file can be added for CI runs that want the DAP traffic.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

/// Log file directives; the file always gets this crate's debug output
const FILE_DIRECTIVES: &str = "ppcheck=debug,warn";

/// Default stderr directives when `RUST_LOG` is unset
///
/// Without `verbose` only warnings reach stderr, so lifecycle logs do not
/// interleave with the failure lines the reporter writes there.
fn stderr_directives(verbose: bool) -> &'static str {
    if verbose {
        "ppcheck=debug,warn"
    } else {
        "warn"
    }
}

/// Initialize tracing for the CLI
///
/// Stderr logs are controlled by the `RUST_LOG` environment variable and
/// default to warnings (this crate's DEBUG with `verbose`). When `log_file`
/// is given, a second layer with its own filter writes this crate's DEBUG
/// output there; keep the returned guard alive until exit so it flushes.
pub fn init_cli(verbose: bool, log_file: Option<&Path>) -> Option<WorkerGuard> {
    let stderr_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(stderr_directives(verbose)));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .with_filter(stderr_filter);

    let file_writer = log_file.and_then(|path| match open_log_file(path) {
        Ok(file) => Some(tracing_appender::non_blocking(file)),
        Err(e) => {
            eprintln!("Warning: Could not open log file {}: {}", path.display(), e);
            None
        }
    });

    let (file_layer, guard) = match file_writer {
        Some((writer, guard)) => {
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(EnvFilter::new(FILE_DIRECTIVES));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();

    guard
}

fn open_log_file(path: &Path) -> std::io::Result<std::fs::File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
}
