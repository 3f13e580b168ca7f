#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use watch_history::recorder::ManualClock;
use watch_history::storage::{JsonStore, RecordStore};
use watch_history::{Result, WatchHistoryError, WatchHistoryItem, WatchHistoryRepository};

pub const WAIT: Duration = Duration::from_secs(2);

pub fn item(id: &str, last_watched: i64) -> WatchHistoryItem {
    WatchHistoryItem {
        id: id.to_string(),
        name: id.to_string(),
        total_duration: 1_440.0,
        last_position: 300.0,
        first_watched: last_watched,
        last_watched,
        subtitle_name: String::new(),
        video_path: format!("/media/{id}"),
        subtitle_path: String::new(),
    }
}

pub fn ids(items: &[WatchHistoryItem]) -> Vec<String> {
    items.iter().map(|i| i.id.clone()).collect()
}

pub fn repository_at(clock: &ManualClock) -> WatchHistoryRepository {
    WatchHistoryRepository::with_clock(Box::new(JsonStore::in_memory()), Arc::new(clock.clone()))
        .unwrap()
}

/// Store whose every operation fails.
#[derive(Debug, Default)]
pub struct FailingStore;

fn offline() -> WatchHistoryError {
    WatchHistoryError::StorageUnavailable("medium offline".to_string())
}

impl RecordStore for FailingStore {
    fn upsert(&mut self, _item: &WatchHistoryItem) -> Result<()> {
        Err(offline())
    }

    fn get_all(&self) -> Result<Vec<WatchHistoryItem>> {
        Err(offline())
    }

    fn get_most_recent(&self, _n: usize) -> Result<Vec<WatchHistoryItem>> {
        Err(offline())
    }

    fn get_by_key(&self, _id: &str) -> Result<Option<WatchHistoryItem>> {
        Err(offline())
    }

    fn delete_by_key(&mut self, _id: &str) -> Result<bool> {
        Err(offline())
    }

    fn delete_where_last_watched_below(&mut self, _threshold: i64) -> Result<usize> {
        Err(offline())
    }

    fn clear(&mut self) -> Result<usize> {
        Err(offline())
    }
}

/// In-memory store that counts upserts.
#[derive(Debug)]
pub struct CountingStore {
    inner: JsonStore,
    upserts: Arc<AtomicUsize>,
}

impl CountingStore {
    pub fn new() -> (Self, Arc<AtomicUsize>) {
        let upserts = Arc::new(AtomicUsize::new(0));
        let store = Self {
            inner: JsonStore::in_memory(),
            upserts: Arc::clone(&upserts),
        };
        (store, upserts)
    }
}

impl RecordStore for CountingStore {
    fn upsert(&mut self, item: &WatchHistoryItem) -> Result<()> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        self.inner.upsert(item)
    }

    fn get_all(&self) -> Result<Vec<WatchHistoryItem>> {
        self.inner.get_all()
    }

    fn get_most_recent(&self, n: usize) -> Result<Vec<WatchHistoryItem>> {
        self.inner.get_most_recent(n)
    }

    fn get_by_key(&self, id: &str) -> Result<Option<WatchHistoryItem>> {
        self.inner.get_by_key(id)
    }

    fn delete_by_key(&mut self, id: &str) -> Result<bool> {
        self.inner.delete_by_key(id)
    }

    fn delete_where_last_watched_below(&mut self, threshold: i64) -> Result<usize> {
        self.inner.delete_where_last_watched_below(threshold)
    }

    fn clear(&mut self) -> Result<usize> {
        self.inner.clear()
    }
}

/// In-memory store whose deletes fail for one id.
#[derive(Debug)]
pub struct PoisonedStore {
    inner: JsonStore,
    poison: String,
}

impl PoisonedStore {
    pub fn new(poison: &str) -> Self {
        Self {
            inner: JsonStore::in_memory(),
            poison: poison.to_string(),
        }
    }
}

impl RecordStore for PoisonedStore {
    fn upsert(&mut self, item: &WatchHistoryItem) -> Result<()> {
        self.inner.upsert(item)
    }

    fn get_all(&self) -> Result<Vec<WatchHistoryItem>> {
        self.inner.get_all()
    }

    fn get_most_recent(&self, n: usize) -> Result<Vec<WatchHistoryItem>> {
        self.inner.get_most_recent(n)
    }

    fn get_by_key(&self, id: &str) -> Result<Option<WatchHistoryItem>> {
        self.inner.get_by_key(id)
    }

    fn delete_by_key(&mut self, id: &str) -> Result<bool> {
        if id == self.poison {
            return Err(offline());
        }
        self.inner.delete_by_key(id)
    }

    fn delete_where_last_watched_below(&mut self, threshold: i64) -> Result<usize> {
        self.inner.delete_where_last_watched_below(threshold)
    }

    fn clear(&mut self) -> Result<usize> {
        self.inner.clear()
    }
}
