//! Storage layer for durable watch-history records.
//!
//! This module provides the record store abstraction and its JSON file
//! implementation. Records are kept in a keyed index ordered by `last_watched`
//! so "most recent N" and "older than" queries never need a full sort.
//!
//! # Modules
//!
//! - `backend`: `RecordStore` trait and its atomicity requirements
//! - `index`: In-memory keyed index with recency ordering
//! - `json`: JSON file-based store with atomic writes
//! - `models`: On-disk record and container types

pub mod backend;
pub mod index;
pub mod json;
pub mod models;

pub use backend::{PartialDelete, RecordStore};
pub use index::HistoryIndex;
pub use json::JsonStore;
pub use models::{StorageData, StoredRecord};
