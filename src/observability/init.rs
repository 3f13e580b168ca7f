//! Tracing initialization and subscriber setup.
//!
//! This module configures the global `tracing` subscriber: an `EnvFilter`
//! for level selection and a JSON `fmt` layer writing either to a rotating log
//! file or to stderr.

use super::file_writer::RotatingFileWriter;
use crate::Config;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter directive when neither `RUST_LOG` nor the config sets one.
const DEFAULT_LEVEL: &str = "info";

/// Builds the level filter.
///
/// Level is determined by:
/// 1. `RUST_LOG` environment variable, if set and valid
/// 2. `config.log_level`, if set and valid
/// 3. Default: `"info"`
fn build_filter(config: &Config) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    config
        .log_level
        .as_deref()
        .and_then(|level| EnvFilter::try_new(level).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LEVEL))
}

/// Initializes the global tracing subscriber.
///
/// With `config.log_file` set, events are written as JSON lines to that file
/// (resolved against the data directory), rotated at 10 MB with 3 backups.
/// Otherwise they go to stderr.
///
/// # Initialization Behavior
///
/// - Creates the log directory if it doesn't exist
/// - Falls back to stderr if the log directory cannot be created
/// - Idempotent: safe to call multiple times (only the first call takes effect)
///
/// # Example
///
/// ```rust
/// use watch_history::observability::init_tracing;
/// use watch_history::Config;
///
/// let config = Config {
///     log_level: Some("debug".to_string()),
///     ..Default::default()
/// };
///
/// init_tracing(&config);
///
/// tracing::debug!("tracing is now active");
/// ```
pub fn init_tracing(config: &Config) {
    let filter = build_filter(config);
    let layer = fmt::layer().json().with_current_span(true).with_span_list(false);

    let log_path = config.log_path().filter(|path| {
        path.parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map_or(true, |dir| std::fs::create_dir_all(dir).is_ok())
    });

    let result = match log_path {
        Some(path) => tracing_subscriber::registry()
            .with(filter)
            .with(layer.with_writer(RotatingFileWriter::new(path)))
            .try_init(),
        None => tracing_subscriber::registry()
            .with(filter)
            .with(layer.with_writer(std::io::stderr))
            .try_init(),
    };

    if result.is_ok() {
        tracing::debug!(version = env!("CARGO_PKG_VERSION"), "tracing initialized");
    }
}
