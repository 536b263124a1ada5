//! Logging setup.
//!
//! All diagnostics go to stderr so that stdout carries nothing but the
//! description.

use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

use crate::config::Mode;

/// Logging configuration error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracingInit(String),
}

/// Whether log lines carry a timestamp in `mode`.
///
/// Only the daemon variant has them; a service runs under a supervisor
/// that stamps lines itself.
pub fn timestamps(mode: Option<Mode>) -> bool {
    matches!(mode, Some(Mode::Daemon))
}

/// Install the global subscriber for a run in `mode`.
///
/// # Environment Variables
///
/// - `ZPINFO_LOG_LEVEL`: Override log level (error, warn, info, debug, trace)
/// - `RUST_LOG`: Used when `ZPINFO_LOG_LEVEL` is not set
///
/// The default level is `info`.
pub fn init(mode: Option<Mode>) -> Result<(), LoggingError> {
    use std::io::IsTerminal;
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let ansi = std::io::stderr().is_terminal();
    Registry::default()
        .with(fmt_layer(mode, std::io::stderr, ansi))
        .with(create_env_filter("info"))
        .try_init()
        .map_err(|e| LoggingError::TracingInit(e.to_string()))
}

/// The line format used for a run in `mode`, writing to `writer`.
///
/// Lines are `LEVEL message`, prefixed with a timestamp when
/// [`timestamps`] says so.
pub fn fmt_layer<S, W>(mode: Option<Mode>, writer: W, ansi: bool) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a> + 'static,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact();

    if timestamps(mode) {
        layer.boxed()
    } else {
        layer.without_time().boxed()
    }
}

/// Create an environment filter with fallback to default level
fn create_env_filter(default_level: &str) -> EnvFilter {
    // First try ZPINFO_LOG_LEVEL, then RUST_LOG, then default
    if let Ok(level) = std::env::var("ZPINFO_LOG_LEVEL") {
        EnvFilter::new(level)
    } else if let Ok(rust_log) = std::env::var("RUST_LOG") {
        EnvFilter::new(rust_log)
    } else {
        EnvFilter::new(default_level)
    }
}
