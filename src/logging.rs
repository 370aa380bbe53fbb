//! Tracing setup for the bridge binary.
//!
//! `start` logs to stderr and to a daily-rotated JSON file so webhook
//! deliveries can be traced after the fact. One-shot commands log to stderr
//! only, quiet by default so their stdout stays scriptable.

use std::path::Path;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// File name prefix of the rotated server log.
pub const LOG_FILE_PREFIX: &str = "wasapi-bridge.log";

/// Keeps the background log writer alive. Drop it last to flush.
pub struct LoggingGuard {
    _file: WorkerGuard,
}

/// `RUST_LOG` if set and valid, otherwise `fallback`.
fn filter_or(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Install the webhook server subscriber.
///
/// Events go to `{logs_dir}/wasapi-bridge.log.YYYY-MM-DD` as JSON lines and
/// to stderr in the compact format. Default level is `info`.
///
/// # Errors
///
/// Fails if `logs_dir` cannot be created or another global subscriber is
/// already installed.
pub fn init_server(logs_dir: &Path) -> anyhow::Result<LoggingGuard> {
    std::fs::create_dir_all(logs_dir)
        .with_context(|| format!("failed to create logs directory {}", logs_dir.display()))?;

    let appender = RollingFileAppender::new(Rotation::DAILY, logs_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(filter_or("info"))
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_writer(writer),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr),
        )
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(LoggingGuard { _file: guard })
}

/// Install a stderr-only subscriber for one-shot commands (default `warn`).
///
/// # Errors
///
/// Fails if another global subscriber is already installed.
pub fn init_cli() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(filter_or("warn"))
        .with_writer(std::io::stderr)
        .without_time()
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}
