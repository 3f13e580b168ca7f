//! Storage record models for the persistence layer.
//!
//! These types describe what is written to disk. They wrap the domain
//! [`WatchHistoryItem`] with storage-only bookkeeping such as the insertion
//! sequence used to break ordering ties.

use crate::domain::WatchHistoryItem;
use serde::{Deserialize, Serialize};

/// Current version of the on-disk format.
pub const STORAGE_FORMAT_VERSION: u32 = 1;

/// A history item as kept by the store.
///
/// `seq` is assigned on first insertion and kept across updates, so an item
/// that is saved again does not lose its place among items with the same
/// `last_watched`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// Insertion sequence number, unique per store.
    pub seq: u64,

    /// The stored item, flattened into the record object on disk.
    #[serde(flatten)]
    pub item: WatchHistoryItem,
}

impl StoredRecord {
    /// Creates a record for `item` with insertion sequence `seq`.
    pub const fn new(seq: u64, item: WatchHistoryItem) -> Self {
        Self { seq, item }
    }
}

/// JSON storage container format.
///
/// The top-level object serialized to the store file.
///
/// ```json
/// {
///   "version": 1,
///   "nextSeq": 3,
///   "records": [
///     { "seq": 1, "id": "a.mkv", "name": "a.mkv", "totalDuration": 1440.0, ... }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageData {
    /// Version of the storage format for future migrations.
    pub version: u32,

    /// Next insertion sequence to hand out.
    #[serde(default)]
    pub next_seq: u64,

    /// All stored records, in insertion order.
    #[serde(default)]
    pub records: Vec<StoredRecord>,
}

impl Default for StorageData {
    fn default() -> Self {
        Self {
            version: STORAGE_FORMAT_VERSION,
            next_seq: 1,
            records: Vec::new(),
        }
    }
}
