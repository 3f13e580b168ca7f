//! JSON file-based record store.
//!
//! Keeps the whole history in memory and rewrites the file after every change,
//! using atomic writes (write-to-temp + fsync + rename) so a crash never leaves
//! a half-written file behind. If a write fails, the in-memory state is rolled
//! back so it keeps matching the file.
//!
//! # Performance Characteristics
//!
//! - **Read**: O(1) lookups, O(n) ordered scans, no I/O
//! - **Write**: O(n), serializes and writes the entire dataset
//! - **Best for**: a few thousand items, writes every few seconds at most

use crate::domain::error::{Result, WatchHistoryError};
use crate::domain::WatchHistoryItem;
use crate::storage::backend::RecordStore;
use crate::storage::index::HistoryIndex;
use crate::storage::models::{StorageData, STORAGE_FORMAT_VERSION};
use std::fmt::Display;
use std::io::Write;
use std::path::{Path, PathBuf};

fn unavailable(context: &str, error: impl Display) -> WatchHistoryError {
    WatchHistoryError::StorageUnavailable(format!("{context}: {error}"))
}

/// JSON file record store.
///
/// # Thread Safety
///
/// This type is `Send` but not meant to be shared. It is owned by the store
/// worker thread, which serializes every request.
///
/// # File Format
///
/// See [`StorageData`]. Items are flattened into each record next to the
/// storage-only `seq` field.
#[derive(Debug)]
pub struct JsonStore {
    /// Path to the JSON file, `None` for a purely in-memory store.
    file_path: Option<PathBuf>,

    /// Records and recency index, loaded on open.
    index: HistoryIndex,
}

impl JsonStore {
    /// Creates or opens a JSON store at `file_path`.
    ///
    /// If the file exists its records are loaded; otherwise the store starts
    /// empty and the file is created on the first write. Parent directories
    /// are created automatically.
    ///
    /// # Errors
    ///
    /// Returns [`WatchHistoryError::StorageUnavailable`] if:
    /// - Parent directory creation fails
    /// - The file cannot be read
    /// - The file is not valid store JSON or has an unknown format version
    pub fn open(file_path: PathBuf) -> Result<Self> {
        tracing::debug!(path = ?file_path, "opening JSON store");

        if let Some(parent) = file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| unavailable("failed to create store directory", e))?;
        }

        let index = if file_path.exists() {
            Self::load_from_file(&file_path)?
        } else {
            tracing::debug!("store file absent, starting empty");
            HistoryIndex::default()
        };

        tracing::debug!(record_count = index.len(), "store opened");

        Ok(Self {
            file_path: Some(file_path),
            index,
        })
    }

    /// Creates a store that keeps everything in memory and never touches disk.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            file_path: None,
            index: HistoryIndex::default(),
        }
    }

    /// Path of the backing file, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    fn load_from_file(path: &Path) -> Result<HistoryIndex> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| unavailable("failed to read store file", e))?;

        if contents.trim().is_empty() {
            tracing::warn!(path = ?path, "store file is empty, starting empty");
            return Ok(HistoryIndex::default());
        }

        let data: StorageData = serde_json::from_str(&contents)
            .map_err(|e| unavailable("store file is corrupted", e))?;

        if data.version != STORAGE_FORMAT_VERSION {
            return Err(WatchHistoryError::StorageUnavailable(format!(
                "unsupported store format version {}",
                data.version
            )));
        }

        tracing::debug!(
            version = data.version,
            records = data.records.len(),
            "loaded store data"
        );

        Ok(HistoryIndex::from_data(data))
    }

    /// Writes the current index to disk using an atomic replace.
    fn persist(&self) -> Result<()> {
        let Some(file_path) = self.file_path.as_ref() else {
            return Ok(());
        };

        tracing::trace!(path = ?file_path, "persisting store");

        let json = serde_json::to_string_pretty(&self.index.to_data())
            .map_err(|e| unavailable("failed to serialize store", e))?;

        let tmp_path = file_path.with_extension("tmp");
        let write_tmp = || -> std::io::Result<()> {
            let mut file = std::fs::File::create(&tmp_path)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()
        };
        write_tmp().map_err(|e| unavailable("failed to write store file", e))?;

        std::fs::rename(&tmp_path, file_path)
            .map_err(|e| unavailable("failed to replace store file", e))?;

        tracing::trace!("store persisted");
        Ok(())
    }

    /// Applies `change` to the index and persists it when `changed` says so.
    ///
    /// If persisting fails the index is restored to its previous state.
    fn commit<T>(
        &mut self,
        change: impl FnOnce(&mut HistoryIndex) -> T,
        changed: impl FnOnce(&T) -> bool,
    ) -> Result<T> {
        let backup = self.file_path.as_ref().map(|_| self.index.clone());
        let outcome = change(&mut self.index);

        if changed(&outcome) {
            if let Err(e) = self.persist() {
                if let Some(backup) = backup {
                    self.index = backup;
                }
                tracing::warn!(error = %e, "store write failed, rolled back");
                return Err(e);
            }
        }

        Ok(outcome)
    }
}

impl RecordStore for JsonStore {
    fn upsert(&mut self, item: &WatchHistoryItem) -> Result<()> {
        let _span = tracing::debug_span!("json_upsert", id = %item.id).entered();

        let inserted = self.commit(|index| index.upsert(item.clone()), |_| true)?;

        tracing::debug!(inserted, "record upserted");
        Ok(())
    }

    fn get_all(&self) -> Result<Vec<WatchHistoryItem>> {
        let items: Vec<WatchHistoryItem> = self.index.ordered().cloned().collect();
        tracing::trace!(count = items.len(), "retrieved all records");
        Ok(items)
    }

    fn get_most_recent(&self, n: usize) -> Result<Vec<WatchHistoryItem>> {
        Ok(self.index.ordered().take(n).cloned().collect())
    }

    fn get_by_key(&self, id: &str) -> Result<Option<WatchHistoryItem>> {
        Ok(self.index.get(id).cloned())
    }

    fn delete_by_key(&mut self, id: &str) -> Result<bool> {
        let _span = tracing::debug_span!("json_delete", id = %id).entered();

        let removed = self.commit(|index| index.remove(id), |removed| *removed)?;

        tracing::debug!(removed, "delete complete");
        Ok(removed)
    }

    fn delete_where_last_watched_below(&mut self, threshold: i64) -> Result<usize> {
        let _span = tracing::debug_span!("json_delete_below", threshold).entered();

        let removed = self.commit(|index| index.remove_below(threshold), |n| *n > 0)?;

        tracing::debug!(removed, "age-based delete complete");
        Ok(removed)
    }

    fn clear(&mut self) -> Result<usize> {
        let _span = tracing::debug_span!("json_clear").entered();

        let removed = self.commit(HistoryIndex::clear, |n| *n > 0)?;

        tracing::debug!(removed, "store cleared");
        Ok(removed)
    }
}
