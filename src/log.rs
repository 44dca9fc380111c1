//! Structured logging for tribunal.
//!
//! Log levels:
//! - ERROR: Critical failures that prevent a request from being built
//! - WARN: Recoverable conditions (degraded tasks, cache outages, dropped selections)
//! - INFO: High-level pipeline notifications (request start, phase changes, decision)
//! - DEBUG: Per-task traces (tool calls, cache hits)
//! - TRACE: Very detailed traces (shared state writes)
//!
//! Debug mode can be enabled with the `--debug` flag or `TRIBUNAL_DEBUG=1`.
//! `TRIBUNAL_LOG` takes an `EnvFilter` directive and wins over both.

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable enabling debug logging.
pub const DEBUG_ENV: &str = "TRIBUNAL_DEBUG";

/// Environment variable holding an explicit filter directive.
pub const FILTER_ENV: &str = "TRIBUNAL_LOG";

const LOG_FILE: &str = "tribunal.log";

/// Initialize logging to ~/.tribunal/tribunal.log
pub fn init() -> Option<WorkerGuard> {
    init_with_debug(false)
}

/// Initialize logging with explicit debug mode setting.
///
/// Returns the appender guard; dropping it flushes and stops the writer, so
/// callers keep it alive for the lifetime of the process. Returns `None` when
/// no home directory is available or a subscriber is already installed.
pub fn init_with_debug(debug: bool) -> Option<WorkerGuard> {
    let debug_enabled = debug || env_debug();
    let filter = EnvFilter::try_from_env(FILTER_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_directive(debug_enabled)));

    let dir = log_dir()?;
    let _ = std::fs::create_dir_all(&dir);
    // Truncate file on startup
    let _ = std::fs::write(dir.join(LOG_FILE), "");

    let appender = tracing_appender::rolling::never(&dir, LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true),
        )
        .try_init()
        .ok()?;

    Some(guard)
}

/// Directory holding the log file.
pub fn log_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".tribunal"))
}

fn env_debug() -> bool {
    std::env::var(DEBUG_ENV)
        .map(|v| v == "1" || v.to_lowercase() == "true")
        .unwrap_or(false)
}

fn default_directive(debug: bool) -> &'static str {
    if debug {
        "tribunal=debug"
    } else {
        "tribunal=info"
    }
}
