//! Record store abstraction.
//!
//! This module defines the [`RecordStore`] trait that the store worker drives.
//! The trait is minimal and maps one-to-one onto the operations the repository
//! needs; it is not a general-purpose database API.
//!
//! # Atomicity
//!
//! Implementations must make [`RecordStore::upsert`] atomic per key: a reader
//! never observes a half-written record, and two upserts for the same id never
//! produce two records. The repository's "preserve `first_watched`" merge is a
//! read followed by a write and relies on this guarantee to keep ids unique.
//! The store worker processes one request at a time, which provides it for any
//! implementation driven through the worker.

use crate::domain::error::{Result, WatchHistoryError};
use crate::domain::WatchHistoryItem;

/// A bulk delete that failed part-way.
#[derive(Debug)]
pub struct PartialDelete {
    /// Records removed before the failure.
    pub removed: usize,
    pub error: WatchHistoryError,
}

/// Abstraction over durable watch-history storage.
///
/// All failures of the underlying medium are reported as
/// [`WatchHistoryError::StorageUnavailable`](crate::WatchHistoryError::StorageUnavailable)
/// and are never retried by the store.
///
/// Mutating methods report how much actually changed so the caller can skip
/// change notifications for no-op writes.
///
/// # Implementations
///
/// - [`JsonStore`](crate::storage::JsonStore): JSON file with atomic writes (default)
///
/// # Examples
///
/// ```no_run
/// use watch_history::storage::{JsonStore, RecordStore};
/// use std::path::PathBuf;
///
/// let store = JsonStore::open(PathBuf::from("/tmp/watch-history.json"))?;
/// let newest = store.get_most_recent(10)?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub trait RecordStore: Send {
    /// Inserts `item` if its id is absent, otherwise replaces every field of
    /// the existing record.
    ///
    /// The caller is responsible for carrying over `first_watched`.
    ///
    /// # Errors
    ///
    /// Returns an error if the write is rejected by the medium.
    fn upsert(&mut self, item: &WatchHistoryItem) -> Result<()>;

    /// Returns every record ordered by `last_watched` descending; ties put the
    /// later insertion first.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn get_all(&self) -> Result<Vec<WatchHistoryItem>>;

    /// Returns at most `n` records with the same ordering as [`get_all`].
    /// `n == 0` yields an empty vector.
    ///
    /// [`get_all`]: RecordStore::get_all
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn get_most_recent(&self, n: usize) -> Result<Vec<WatchHistoryItem>>;

    /// Retrieves a single record by id. Returns `Ok(None)` if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn get_by_key(&self, id: &str) -> Result<Option<WatchHistoryItem>>;

    /// Removes the record with `id`. A missing id is not an error.
    ///
    /// Returns `true` if a record was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the write is rejected by the medium.
    fn delete_by_key(&mut self, id: &str) -> Result<bool>;

    /// Removes every record whose id is in `ids`, ignoring missing ids, and
    /// returns the number removed.
    ///
    /// The default implementation calls [`delete_by_key`] once per id and
    /// stops at the first failure. Ids removed before it stay removed.
    ///
    /// [`delete_by_key`]: RecordStore::delete_by_key
    ///
    /// # Errors
    ///
    /// Returns a [`PartialDelete`] carrying the first error and how many
    /// records were removed before it.
    fn delete_by_keys(&mut self, ids: &[String]) -> std::result::Result<usize, PartialDelete> {
        let mut removed = 0;
        for id in ids {
            match self.delete_by_key(id) {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(error) => return Err(PartialDelete { removed, error }),
            }
        }
        Ok(removed)
    }

    /// Removes every record with `last_watched < threshold` (strict) and
    /// returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the write is rejected by the medium.
    fn delete_where_last_watched_below(&mut self, threshold: i64) -> Result<usize>;

    /// Removes all records and returns how many there were.
    ///
    /// # Errors
    ///
    /// Returns an error if the write is rejected by the medium.
    fn clear(&mut self) -> Result<usize>;
}
