//! In-memory keyed index with recency ordering.
//!
//! Records are keyed by id in a `HashMap`, and a `BTreeMap` keyed by
//! `(Reverse(last_watched), Reverse(seq))` keeps them ordered newest first.
//! Among equal `last_watched` values, the record inserted later comes first.

use super::models::{StorageData, StoredRecord, STORAGE_FORMAT_VERSION};
use crate::domain::WatchHistoryItem;
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

type RecencyKey = (Reverse<i64>, Reverse<u64>);

fn recency_key(record: &StoredRecord) -> RecencyKey {
    (Reverse(record.item.last_watched), Reverse(record.seq))
}

/// Keyed history records plus a `last_watched`-descending index.
#[derive(Debug, Clone)]
pub struct HistoryIndex {
    records: HashMap<String, StoredRecord>,
    by_recency: BTreeMap<RecencyKey, String>,
    next_seq: u64,
}

impl Default for HistoryIndex {
    fn default() -> Self {
        Self {
            records: HashMap::new(),
            by_recency: BTreeMap::new(),
            next_seq: 1,
        }
    }
}

impl HistoryIndex {
    /// Rebuilds the index from persisted data.
    ///
    /// If the data holds the same id more than once, the record with the highest
    /// sequence wins. `next_seq` is raised past every sequence seen.
    #[must_use]
    pub fn from_data(data: StorageData) -> Self {
        let mut index = Self::default();
        let mut highest_seq = 0;

        for record in data.records {
            highest_seq = highest_seq.max(record.seq);
            if let Some(existing) = index.records.get(&record.item.id) {
                if existing.seq > record.seq {
                    tracing::warn!(id = %record.item.id, "dropping duplicate stored record");
                    continue;
                }
                let stale = recency_key(existing);
                index.by_recency.remove(&stale);
                tracing::warn!(id = %record.item.id, "replacing duplicate stored record");
            }
            index.by_recency.insert(recency_key(&record), record.item.id.clone());
            index.records.insert(record.item.id.clone(), record);
        }

        index.next_seq = data.next_seq.max(highest_seq.saturating_add(1));
        index
    }

    /// Exports the index as persistable data, records in insertion order.
    #[must_use]
    pub fn to_data(&self) -> StorageData {
        let mut records: Vec<StoredRecord> = self.records.values().cloned().collect();
        records.sort_by_key(|record| record.seq);

        StorageData {
            version: STORAGE_FORMAT_VERSION,
            next_seq: self.next_seq,
            records,
        }
    }

    /// Inserts `item`, or replaces every field of the record with the same id.
    ///
    /// Returns `true` if the id was new.
    pub fn upsert(&mut self, item: WatchHistoryItem) -> bool {
        if let Some(existing) = self.records.get_mut(&item.id) {
            self.by_recency.remove(&recency_key(existing));
            existing.item = item;
            self.by_recency
                .insert(recency_key(existing), existing.item.id.clone());
            return false;
        }

        let record = StoredRecord::new(self.next_seq, item);
        self.next_seq = self.next_seq.saturating_add(1);
        self.by_recency
            .insert(recency_key(&record), record.item.id.clone());
        self.records.insert(record.item.id.clone(), record);
        true
    }

    /// Looks up a record by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&WatchHistoryItem> {
        self.records.get(id).map(|record| &record.item)
    }

    /// Iterates over all items, most recently watched first.
    pub fn ordered(&self) -> impl Iterator<Item = &WatchHistoryItem> + '_ {
        self.by_recency
            .values()
            .filter_map(|id| self.records.get(id))
            .map(|record| &record.item)
    }

    /// Removes the record with `id`. Returns `true` if one existed.
    pub fn remove(&mut self, id: &str) -> bool {
        match self.records.remove(id) {
            Some(record) => {
                self.by_recency.remove(&recency_key(&record));
                true
            }
            None => false,
        }
    }

    /// Removes every record with `last_watched < threshold` and returns how many.
    pub fn remove_below(&mut self, threshold: i64) -> usize {
        // Keys sort newest first, so everything strictly older than `threshold`
        // lies after the last possible key for `last_watched == threshold`.
        let boundary: RecencyKey = (Reverse(threshold), Reverse(0));
        let doomed: Vec<RecencyKey> = self
            .by_recency
            .range((Bound::Excluded(boundary), Bound::Unbounded))
            .map(|(key, _)| *key)
            .collect();

        for key in &doomed {
            if let Some(id) = self.by_recency.remove(key) {
                self.records.remove(&id);
            }
        }

        doomed.len()
    }

    /// Removes all records and returns how many there were.
    ///
    /// The sequence counter keeps counting so later inserts still order after
    /// anything exported before the clear.
    pub fn clear(&mut self) -> usize {
        let count = self.records.len();
        self.records.clear();
        self.by_recency.clear();
        count
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, last_watched: i64) -> WatchHistoryItem {
        WatchHistoryItem {
            id: id.to_string(),
            name: id.to_string(),
            total_duration: 100.0,
            last_position: 1.0,
            first_watched: last_watched,
            last_watched,
            subtitle_name: String::new(),
            video_path: id.to_string(),
            subtitle_path: String::new(),
        }
    }

    fn ids(index: &HistoryIndex) -> Vec<String> {
        index.ordered().map(|i| i.id.clone()).collect()
    }

    #[test]
    fn orders_newest_first() {
        let mut index = HistoryIndex::default();
        index.upsert(item("a", 100));
        index.upsert(item("b", 300));
        index.upsert(item("c", 200));
        assert_eq!(ids(&index), ["b", "c", "a"]);
    }

    #[test]
    fn ties_put_later_insertions_first() {
        let mut index = HistoryIndex::default();
        index.upsert(item("first", 100));
        index.upsert(item("second", 100));
        assert_eq!(ids(&index), ["second", "first"]);
    }

    #[test]
    fn upsert_replaces_and_reorders() {
        let mut index = HistoryIndex::default();
        assert!(index.upsert(item("a", 100)));
        index.upsert(item("b", 200));
        assert!(!index.upsert(item("a", 300)));
        assert_eq!(index.len(), 2);
        assert_eq!(ids(&index), ["a", "b"]);
        assert_eq!(index.get("a").unwrap().last_watched, 300);
    }

    #[test]
    fn update_keeps_insertion_sequence_for_ties() {
        let mut index = HistoryIndex::default();
        index.upsert(item("old", 100));
        index.upsert(item("new", 100));
        index.upsert(item("old", 100));
        assert_eq!(ids(&index), ["new", "old"]);
    }

    #[test]
    fn remove_below_is_strict() {
        let mut index = HistoryIndex::default();
        index.upsert(item("a", 100));
        index.upsert(item("b", 200));
        index.upsert(item("c", 300));
        assert_eq!(index.remove_below(200), 1);
        assert_eq!(ids(&index), ["c", "b"]);
        assert_eq!(index.remove_below(i64::MIN), 0);
    }

    #[test]
    fn remove_below_handles_extremes() {
        let mut index = HistoryIndex::default();
        index.upsert(item("min", i64::MIN));
        index.upsert(item("max", i64::MAX));
        assert_eq!(index.remove_below(i64::MAX), 1);
        assert_eq!(ids(&index), ["max"]);
    }

    #[test]
    fn remove_missing_is_a_no_op() {
        let mut index = HistoryIndex::default();
        index.upsert(item("a", 1));
        assert!(!index.remove("zzz"));
        assert!(index.remove("a"));
        assert!(index.is_empty());
    }

    #[test]
    fn data_round_trip_preserves_order_and_sequence() {
        let mut index = HistoryIndex::default();
        index.upsert(item("a", 100));
        index.upsert(item("b", 100));
        let data = index.to_data();
        assert_eq!(data.next_seq, 3);

        let mut restored = HistoryIndex::from_data(data);
        assert_eq!(ids(&restored), ["b", "a"]);
        restored.upsert(item("c", 100));
        assert_eq!(ids(&restored), ["c", "b", "a"]);
    }

    #[test]
    fn from_data_drops_duplicate_ids() {
        let data = StorageData {
            version: STORAGE_FORMAT_VERSION,
            next_seq: 0,
            records: vec![
                StoredRecord::new(5, item("a", 500)),
                StoredRecord::new(2, item("a", 200)),
            ],
        };
        let index = HistoryIndex::from_data(data);
        assert_eq!(index.len(), 1);
        assert_eq!(index.get("a").unwrap().last_watched, 500);
        assert_eq!(index.to_data().next_seq, 6);
    }
}
