//! Repository façade over the record store.
//!
//! [`WatchHistoryRepository`] is the single entry point the rest of an
//! application uses. It merges saves with existing records, converts import
//! and export payloads, and hands out live subscriptions. Every operation is
//! async and runs on the store worker thread, one at a time.
//!
//! # Examples
//!
//! ```no_run
//! use watch_history::WatchHistoryRepository;
//!
//! # async fn demo() -> watch_history::Result<()> {
//! let repository = WatchHistoryRepository::in_memory()?;
//! let recent = repository.fetch(10).await?;
//! println!("{} recent items", recent.len());
//! # Ok(())
//! # }
//! ```

use crate::domain::error::{Result, WatchHistoryError};
use crate::domain::{HistoryQuery, WatchHistoryItem, MILLIS_PER_DAY};
use crate::notifier::{SnapshotStream, Subscription};
use crate::recorder::{Clock, SystemClock};
use crate::storage::{JsonStore, RecordStore};
use crate::worker::StoreHandle;
use chrono::{DateTime, Local, NaiveDate};
use std::path::PathBuf;
use std::sync::Arc;

/// Returns the file name used for an export made on `date`.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use watch_history::repository::export_file_name;
///
/// let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
/// assert_eq!(export_file_name(date), "watch-history-2024-03-09.json");
/// ```
#[must_use]
pub fn export_file_name(date: NaiveDate) -> String {
    format!("watch-history-{}.json", date.format("%Y-%m-%d"))
}

/// Async façade over the store worker.
///
/// Cheap to clone; clones share the same worker. The worker shuts down when
/// the last clone and the last live subscription are dropped.
#[derive(Debug, Clone)]
pub struct WatchHistoryRepository {
    store: StoreHandle,
    clock: Arc<dyn Clock>,
}

impl WatchHistoryRepository {
    /// Starts a worker owning `store` and returns a repository over it.
    ///
    /// # Errors
    ///
    /// Returns [`WatchHistoryError::Worker`](crate::WatchHistoryError::Worker)
    /// if the worker thread cannot be started.
    pub fn new(store: Box<dyn RecordStore>) -> Result<Self> {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    /// Like [`new`](Self::new), with an explicit clock for day-based pruning
    /// and the recorders created from this repository.
    ///
    /// # Errors
    ///
    /// Returns [`WatchHistoryError::Worker`](crate::WatchHistoryError::Worker)
    /// if the worker thread cannot be started.
    pub fn with_clock(store: Box<dyn RecordStore>, clock: Arc<dyn Clock>) -> Result<Self> {
        let store = StoreHandle::spawn(store)?;
        Ok(Self { store, clock })
    }

    /// Opens (or creates) a JSON store at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`WatchHistoryError::StorageUnavailable`](crate::WatchHistoryError::StorageUnavailable)
    /// if the file cannot be read or is corrupted.
    pub fn open(path: PathBuf) -> Result<Self> {
        Self::new(Box::new(JsonStore::open(path)?))
    }

    /// Creates a repository that never touches disk.
    ///
    /// # Errors
    ///
    /// Returns [`WatchHistoryError::Worker`](crate::WatchHistoryError::Worker)
    /// if the worker thread cannot be started.
    pub fn in_memory() -> Result<Self> {
        Self::new(Box::new(JsonStore::in_memory()))
    }

    /// Clock used by this repository.
    #[must_use]
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Saves `item`, keeping the `first_watched` of an existing record with
    /// the same id.
    ///
    /// Negative or non-finite durations and positions are clamped to zero.
    /// `last_watched` is stored as given.
    ///
    /// # Errors
    ///
    /// Returns [`WatchHistoryError::StorageUnavailable`](crate::WatchHistoryError::StorageUnavailable)
    /// if the lookup or the write fails.
    pub async fn save(&self, item: WatchHistoryItem) -> Result<()> {
        let mut item = item.sanitized();

        if let Some(existing) = self.store.get_by_key(item.id.clone()).await? {
            tracing::trace!(id = %item.id, first_watched = existing.first_watched, "merging with existing record");
            item.first_watched = existing.first_watched;
        }

        self.store.upsert(item).await
    }

    /// Removes the record `id`. Missing ids are not an error.
    ///
    /// # Errors
    ///
    /// Returns [`WatchHistoryError::StorageUnavailable`](crate::WatchHistoryError::StorageUnavailable)
    /// if the write fails.
    pub async fn delete(&self, id: &str) -> Result<()> {
        self.store.delete_by_key(id.to_string()).await.map(|_| ())
    }

    /// Removes each id in order and returns how many existed.
    ///
    /// Missing ids are skipped. If a delete fails, the ones before it stay
    /// deleted and the rest are not attempted.
    ///
    /// # Errors
    ///
    /// Returns [`WatchHistoryError::StorageUnavailable`](crate::WatchHistoryError::StorageUnavailable)
    /// if a write fails.
    pub async fn delete_multiple(&self, ids: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        self.store.delete_by_keys(ids.to_vec()).await
    }

    /// Removes every record with `last_watched` strictly below `timestamp_ms`
    /// and returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`WatchHistoryError::StorageUnavailable`](crate::WatchHistoryError::StorageUnavailable)
    /// if the write fails.
    pub async fn delete_older_than(&self, timestamp_ms: i64) -> Result<usize> {
        let removed = self.store.delete_below(timestamp_ms).await?;
        tracing::debug!(threshold = timestamp_ms, removed, "pruned old history");
        Ok(removed)
    }

    /// Removes records last watched more than `days` days ago.
    ///
    /// # Errors
    ///
    /// Returns [`WatchHistoryError::StorageUnavailable`](crate::WatchHistoryError::StorageUnavailable)
    /// if the write fails.
    pub async fn delete_older_than_days(&self, days: u32) -> Result<usize> {
        let age = i64::from(days).saturating_mul(MILLIS_PER_DAY);
        let threshold = self.clock.now_ms().saturating_sub(age);
        self.delete_older_than(threshold).await
    }

    /// Looks up a record by its id (the media file name).
    ///
    /// # Errors
    ///
    /// Returns [`WatchHistoryError::Worker`](crate::WatchHistoryError::Worker)
    /// if the worker is gone.
    pub async fn find_by_name(&self, name: &str) -> Result<Option<WatchHistoryItem>> {
        self.store.get_by_key(name.to_string()).await
    }

    /// Position to resume `name` from, if one was recorded.
    ///
    /// # Errors
    ///
    /// Returns [`WatchHistoryError::Worker`](crate::WatchHistoryError::Worker)
    /// if the worker is gone.
    pub async fn resume_position(&self, name: &str) -> Result<Option<f64>> {
        Ok(self
            .find_by_name(name)
            .await?
            .map(|item| item.last_position)
            .filter(|position| *position > 0.0))
    }

    /// Returns at most `count` records, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`WatchHistoryError::Worker`](crate::WatchHistoryError::Worker)
    /// if the worker is gone.
    pub async fn fetch(&self, count: usize) -> Result<Vec<WatchHistoryItem>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        self.store.get_most_recent(count).await
    }

    /// Returns every record, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`WatchHistoryError::Worker`](crate::WatchHistoryError::Worker)
    /// if the worker is gone.
    pub async fn fetch_all(&self) -> Result<Vec<WatchHistoryItem>> {
        self.store.get_all().await
    }

    /// Returns the records passing `query`, in its order.
    ///
    /// # Errors
    ///
    /// Returns [`WatchHistoryError::Worker`](crate::WatchHistoryError::Worker)
    /// if the worker is gone.
    pub async fn query(&self, query: &HistoryQuery) -> Result<Vec<WatchHistoryItem>> {
        Ok(query.apply(&self.fetch_all().await?))
    }

    /// Returns every record for export, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`WatchHistoryError::Worker`](crate::WatchHistoryError::Worker)
    /// if the worker is gone.
    pub async fn export_all(&self) -> Result<Vec<WatchHistoryItem>> {
        self.fetch_all().await
    }

    /// Exports every record as a pretty-printed JSON array.
    ///
    /// # Errors
    ///
    /// Returns [`WatchHistoryError::Worker`](crate::WatchHistoryError::Worker)
    /// if the worker is gone, or
    /// [`WatchHistoryError::Serialization`](crate::WatchHistoryError::Serialization)
    /// if the items cannot be encoded.
    pub async fn export_json(&self) -> Result<String> {
        let items = self.export_all().await?;
        serde_json::to_string_pretty(&items).map_err(WatchHistoryError::serialization)
    }

    /// File name for an export made today, in local time.
    #[must_use]
    pub fn default_export_file_name(&self) -> String {
        let today = DateTime::from_timestamp_millis(self.clock.now_ms())
            .map_or_else(|| Local::now().date_naive(), |at| {
                at.with_timezone(&Local).date_naive()
            });
        export_file_name(today)
    }

    /// Imports `items` in order and returns how many were saved.
    ///
    /// An item whose id already exists is skipped unless `overwrite` is set;
    /// overwritten items count as imported. Each save is independent, so a
    /// failure leaves earlier items imported.
    ///
    /// # Errors
    ///
    /// Returns [`WatchHistoryError::StorageUnavailable`](crate::WatchHistoryError::StorageUnavailable)
    /// if a lookup or write fails.
    pub async fn import_all(&self, items: Vec<WatchHistoryItem>, overwrite: bool) -> Result<usize> {
        let total = items.len();
        let mut imported = 0;

        for item in items {
            if !overwrite && self.store.get_by_key(item.id.clone()).await?.is_some() {
                tracing::trace!(id = %item.id, "skipping existing record");
                continue;
            }
            self.save(item).await?;
            imported += 1;
        }

        tracing::debug!(total, imported, overwrite, "import complete");
        Ok(imported)
    }

    /// Parses a JSON array of history items and imports it.
    ///
    /// Objects may carry extra fields, but every item field is required.
    ///
    /// # Errors
    ///
    /// Returns [`WatchHistoryError::Parse`](crate::WatchHistoryError::Parse)
    /// without importing anything if `json` is not an array of well-formed
    /// items, or any error from [`import_all`](Self::import_all).
    pub async fn import_json(&self, json: &str, overwrite: bool) -> Result<usize> {
        let items: Vec<WatchHistoryItem> = serde_json::from_str(json).map_err(|e| {
            tracing::warn!(error = %e, "rejected import payload");
            e
        })?;
        self.import_all(items, overwrite).await
    }

    /// Removes every record and returns how many there were.
    ///
    /// # Errors
    ///
    /// Returns [`WatchHistoryError::StorageUnavailable`](crate::WatchHistoryError::StorageUnavailable)
    /// if the write fails.
    pub async fn clear(&self) -> Result<usize> {
        self.store.clear().await
    }

    /// Calls `callback` with the full ordered history now and after every
    /// change, until the returned [`Subscription`] is dropped or unsubscribed.
    ///
    /// Callbacks run on a tokio task, so this must be called from within a
    /// tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`WatchHistoryError::StorageUnavailable`](crate::WatchHistoryError::StorageUnavailable)
    /// if the initial snapshot cannot be read.
    pub async fn live_fetch<F>(&self, callback: F) -> Result<Subscription>
    where
        F: FnMut(&[WatchHistoryItem]) + Send + 'static,
    {
        Subscription::start(&self.store, Box::new(callback)).await
    }

    /// Stream of full ordered snapshots: the current one, then one per change.
    ///
    /// # Errors
    ///
    /// Returns [`WatchHistoryError::StorageUnavailable`](crate::WatchHistoryError::StorageUnavailable)
    /// if the initial snapshot cannot be read.
    pub async fn watch(&self) -> Result<SnapshotStream> {
        SnapshotStream::open(&self.store).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::ManualClock;

    fn item(id: &str, first: i64, last: i64) -> WatchHistoryItem {
        WatchHistoryItem {
            id: id.to_string(),
            name: id.to_string(),
            total_duration: 100.0,
            last_position: 10.0,
            first_watched: first,
            last_watched: last,
            subtitle_name: String::new(),
            video_path: format!("/media/{id}"),
            subtitle_path: String::new(),
        }
    }

    #[test]
    fn export_file_name_is_zero_padded() {
        let date = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        assert_eq!(export_file_name(date), "watch-history-2023-01-02.json");
    }

    #[tokio::test]
    async fn save_keeps_first_watched_and_clamps() {
        let repository = WatchHistoryRepository::in_memory().unwrap();
        repository.save(item("a.mkv", 100, 100)).await.unwrap();

        let mut update = item("a.mkv", 999, 500);
        update.last_position = -4.0;
        repository.save(update).await.unwrap();

        let stored = repository.find_by_name("a.mkv").await.unwrap().unwrap();
        assert_eq!(stored.first_watched, 100);
        assert_eq!(stored.last_watched, 500);
        assert_eq!(stored.last_position, 0.0);
    }

    #[tokio::test]
    async fn prune_by_days_uses_clock() {
        let clock = ManualClock::new(10 * MILLIS_PER_DAY);
        let repository =
            WatchHistoryRepository::with_clock(Box::new(JsonStore::in_memory()), Arc::new(clock))
                .unwrap();
        repository.save(item("old", 0, MILLIS_PER_DAY)).await.unwrap();
        repository.save(item("new", 0, 9 * MILLIS_PER_DAY)).await.unwrap();

        assert_eq!(repository.delete_older_than_days(7).await.unwrap(), 1);
        assert!(repository.find_by_name("old").await.unwrap().is_none());
        assert_eq!(repository.delete_older_than_days(u32::MAX).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn resume_position_ignores_zero() {
        let repository = WatchHistoryRepository::in_memory().unwrap();
        let mut fresh = item("fresh", 1, 1);
        fresh.last_position = 0.0;
        repository.save(fresh).await.unwrap();
        repository.save(item("started", 1, 2)).await.unwrap();

        assert_eq!(repository.resume_position("fresh").await.unwrap(), None);
        assert_eq!(repository.resume_position("started").await.unwrap(), Some(10.0));
        assert_eq!(repository.resume_position("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn fetch_zero_is_empty() {
        let repository = WatchHistoryRepository::in_memory().unwrap();
        repository.save(item("a", 1, 1)).await.unwrap();
        assert!(repository.fetch(0).await.unwrap().is_empty());
        assert_eq!(repository.fetch(5).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn default_export_name_follows_clock() {
        let clock = ManualClock::new(0);
        let repository =
            WatchHistoryRepository::with_clock(Box::new(JsonStore::in_memory()), Arc::new(clock))
                .unwrap();
        let name = repository.default_export_file_name();
        assert!(name.starts_with("watch-history-19"));
        assert!(name.ends_with(".json"));
    }
}
