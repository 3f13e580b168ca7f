//! Watch History: durable playback history for media players.
//!
//! This crate stores one record per media file a user has played, and keeps
//! it in sync with whoever is displaying it:
//! - Durable JSON file storage with atomic writes and per-key upserts
//! - Recency-ordered queries, age-based pruning, bulk delete
//! - Live subscriptions that receive the full ordered history on every change
//! - JSON import/export with skip-or-overwrite merging
//! - A throttled progress recorder for high-frequency playback position reports

#![allow(clippy::multiple_crate_versions)]

//!
//! # Architecture
//!
//! The crate follows a layered architecture pattern:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │  Command-line tool (main.rs)                        │  ← Entry point
//! └─────────────────────────────────────────────────────┘
//!                        │
//! ┌─────────────────────────────────────────────────────┐
//! │  Progress Recorder (recorder.rs)                    │  ← Throttled saves
//! └─────────────────────────────────────────────────────┘
//!                        │
//! ┌─────────────────────────────────────────────────────┐
//! │  Repository Façade (repository.rs)                  │  ← Async API
//! │  - Merge on save, import/export, live queries       │
//! └─────────────────────────────────────────────────────┘
//!                        │ mpsc + oneshot
//! ┌─────────────────────────────────────────────────────┐
//! │  Store Worker (worker/)                             │  ← One OS thread
//! │  - Serializes every request                         │
//! │  - Notifies subscribers after mutations             │
//! └─────────────────────────────────────────────────────┘
//!         │                                     │
//! ┌───────────────────────┐         ┌───────────────────────┐
//! │ Storage Layer         │         │ Change Notifier       │
//! │ (storage/)            │         │ (notifier.rs)         │
//! │ - RecordStore trait   │         │ - Per-subscriber FIFO │
//! │ - Recency index       │         │ - Callback / Stream   │
//! │ - JSON file store     │         │                       │
//! └───────────────────────┘         └───────────────────────┘
//!                        │
//! ┌─────────────────────────────────────────────────────┐
//! │  Infrastructure & Domain Layers                     │
//! │  - Platform paths (infrastructure/)                 │
//! │  - Error types, item model, queries (domain/)       │
//! │  - Logging setup (observability/)                   │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`domain`]: Core domain types (item, errors, queries)
//! - [`storage`]: Record store trait and JSON file persistence
//! - [`worker`]: Store worker thread and its request protocol
//! - [`notifier`]: Change subscriptions
//! - [`repository`]: Async façade used by applications
//! - [`recorder`]: Throttled progress recording
//! - [`infrastructure`]: Platform-specific utilities (paths)
//! - [`observability`]: Tracing subscriber setup
//!
//! # Configuration
//!
//! Configuration is read from `~/.config/watch-history/config.toml` (or the
//! platform equivalent). Every key is optional:
//!
//! ```toml
//! data_dir = "~/.local/share/watch-history"
//! store_file = "history.json"
//! save_interval_ms = 5000
//! log_level = "debug"
//! log_file = "watch-history.log"
//! ```
//!
//! # Examples
//!
//! ```rust
//! use std::path::Path;
//! use watch_history::{ProgressRecorder, WatchHistoryRepository};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> watch_history::Result<()> {
//! let repository = WatchHistoryRepository::in_memory()?;
//! let mut recorder = ProgressRecorder::new(repository.clone());
//!
//! recorder
//!     .record_progress(Path::new("/media/film.mkv"), 42.0, 5400.0, None)
//!     .await;
//!
//! let position = repository.resume_position("film.mkv").await?;
//! assert_eq!(position, Some(42.0));
//! # Ok(())
//! # }
//! ```
//!
//! # Key Design Decisions
//!
//! ## Single Store Worker
//!
//! The store is owned by one thread that processes requests in arrival order:
//! - Per-key upserts are atomic without locks in the store
//! - Notifications follow mutations in commit order
//! - Async callers never block on file I/O
//!
//! ## Full Snapshots
//!
//! Subscribers always receive the complete ordered history, recomputed after
//! each mutation. At a few thousand records this is cheap, and it keeps
//! observers free of incremental-merge logic.

pub mod domain;
pub mod infrastructure;
pub mod notifier;
pub mod observability;
pub mod recorder;
pub mod repository;
pub mod storage;
pub mod worker;

pub use domain::{
    format_position, HistoryQuery, Result, SortKey, SortOrder, WatchHistoryError,
    WatchHistoryItem,
};
pub use notifier::{Snapshot, SnapshotStream, Subscription};
pub use recorder::{FlushOutcome, ProgressRecorder, RecordOutcome};
pub use repository::WatchHistoryRepository;

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Configuration loaded from a TOML file.
///
/// Every field has a default, so an empty or missing file is valid.
///
/// # Example
///
/// ```rust
/// use watch_history::Config;
///
/// let config: Config = toml::from_str("save_interval_ms = 2000").unwrap();
/// assert_eq!(config.save_interval_ms, 2000);
/// assert!(config.store_path().ends_with("history.json"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the store file and logs.
    ///
    /// A leading `~` is expanded. Default: the platform data directory
    /// (`~/.local/share/watch-history` on Linux).
    pub data_dir: Option<PathBuf>,

    /// Store file name, resolved against `data_dir` unless absolute.
    /// Default: `"history.json"`
    pub store_file: PathBuf,

    /// Throttle window of the progress recorder. Default: `5000`
    pub save_interval_ms: i64,

    /// Log filter directive, overridden by `RUST_LOG`.
    ///
    /// Options: `trace`, `debug`, `info`, `warn`, `error`, or any `EnvFilter`
    /// directive. Default: `"info"`
    pub log_level: Option<String>,

    /// Log file, resolved against `data_dir` unless absolute. Logs go to
    /// stderr when unset.
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            store_file: PathBuf::from(infrastructure::paths::DEFAULT_STORE_FILE),
            save_interval_ms: recorder::DEFAULT_SAVE_INTERVAL_MS,
            log_level: None,
            log_file: None,
        }
    }
}

impl Config {
    /// Parses a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`WatchHistoryError::Config`] if the file cannot be read or is
    /// not valid configuration.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            WatchHistoryError::Config(format!("failed to read {}: {e}", path.display()))
        })?;

        toml::from_str(&contents).map_err(|e| {
            WatchHistoryError::Config(format!("invalid config {}: {e}", path.display()))
        })
    }

    /// Loads configuration from `path`, or from the default location.
    ///
    /// An explicit `path` must exist. Without one, the platform default file is
    /// used if present, and built-in defaults otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`WatchHistoryError::Config`] if a file is found but cannot be
    /// parsed, or if an explicit `path` is missing.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }

        match infrastructure::default_config_path().filter(|p| p.is_file()) {
            Some(default_path) => Self::from_file(&default_path),
            None => Ok(Self::default()),
        }
    }

    /// Resolved data directory.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .as_deref()
            .map_or_else(infrastructure::data_dir, infrastructure::expand_tilde)
    }

    /// Full path of the store file.
    #[must_use]
    pub fn store_path(&self) -> PathBuf {
        infrastructure::resolve(&self.data_dir(), &self.store_file)
    }

    /// Full path of the log file, if file logging is configured.
    #[must_use]
    pub fn log_path(&self) -> Option<PathBuf> {
        self.log_file
            .as_deref()
            .map(|file| infrastructure::resolve(&self.data_dir(), file))
    }
}

/// Opens the repository described by `config`.
///
/// # Errors
///
/// Returns [`WatchHistoryError::StorageUnavailable`] if the store file cannot
/// be opened or is corrupted.
pub fn open_repository(config: &Config) -> Result<WatchHistoryRepository> {
    let path = config.store_path();
    tracing::debug!(path = ?path, "opening watch history");
    WatchHistoryRepository::open(path)
}

/// Initializes logging and opens the repository described by `config`.
///
/// # Errors
///
/// Returns [`WatchHistoryError::StorageUnavailable`] if the store file cannot
/// be opened or is corrupted.
pub fn initialize(config: &Config) -> Result<WatchHistoryRepository> {
    observability::init_tracing(config);
    open_repository(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.save_interval_ms, 5_000);
        assert!(config.log_path().is_none());
    }

    #[test]
    fn relative_files_resolve_against_data_dir() {
        let config: Config = toml::from_str(
            r#"
            data_dir = "/srv/history"
            store_file = "mine.json"
            log_file = "/var/log/wh.log"
            "#,
        )
        .unwrap();

        assert_eq!(config.store_path(), Path::new("/srv/history/mine.json"));
        assert_eq!(config.log_path().unwrap(), Path::new("/var/log/wh.log"));
    }

    #[test]
    fn from_file_reports_config_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "save_interval_ms = \"soon\"").unwrap();

        let err = Config::from_file(&path).unwrap_err();
        assert!(matches!(err, WatchHistoryError::Config(_)));

        let missing = Config::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(missing, WatchHistoryError::Config(_)));
    }
}
