//! Error types for the watch-history engine.
//!
//! This module defines the centralized error type [`WatchHistoryError`] and a type
//! alias [`Result`] used throughout the crate. Lookups that find nothing are not
//! errors: they return `Ok(None)`.

use thiserror::Error;

/// The main error type for watch-history operations.
///
/// Store and repository operations surface [`WatchHistoryError::StorageUnavailable`]
/// to their caller without retrying. The progress recorder catches these and
/// logs them instead, so playback never fails because history could not be saved.
///
/// # Examples
///
/// ```
/// use watch_history::WatchHistoryError;
///
/// fn open_store() -> Result<(), WatchHistoryError> {
///     Err(WatchHistoryError::StorageUnavailable("disk full".to_string()))
/// }
///
/// assert!(open_store().unwrap_err().is_storage_unavailable());
/// ```
#[derive(Debug, Error)]
pub enum WatchHistoryError {
    /// The durable medium could not be opened, is corrupted, or rejected a write.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// An import payload was not a JSON array of well-formed history items.
    ///
    /// Automatically converts from `serde_json::Error`, so only decoding
    /// paths may use `?` on serde results. Encoding goes through
    /// [`WatchHistoryError::serialization`].
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// History items could not be encoded as JSON for export or display.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Filesystem or I/O operation outside the store failed (config, export files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration is invalid or could not be read.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The store worker thread is gone or dropped a reply.
    #[error("Store worker error: {0}")]
    Worker(String),
}

impl WatchHistoryError {
    /// Returns `true` for [`WatchHistoryError::StorageUnavailable`].
    #[must_use]
    pub const fn is_storage_unavailable(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_))
    }

    /// Wraps an encoding failure as [`WatchHistoryError::Serialization`].
    #[must_use]
    pub fn serialization(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }

    /// Returns `true` for [`WatchHistoryError::Parse`].
    #[must_use]
    pub const fn is_parse(&self) -> bool {
        matches!(self, Self::Parse(_))
    }
}

/// A specialized `Result` type for watch-history operations.
pub type Result<T> = std::result::Result<T, WatchHistoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding_failures_are_not_parse_errors() {
        let unencodable = std::collections::BTreeMap::from([((1, 2), 3)]);
        let source = serde_json::to_string(&unencodable).unwrap_err();
        let error = WatchHistoryError::serialization(source);

        assert!(!error.is_parse());
        assert!(!error.is_storage_unavailable());
        assert!(error.to_string().starts_with("Serialization error:"));
    }
}
