//! Domain layer for the watch-history engine.
//!
//! This module contains the history item model, the crate error type, and the
//! pure search/sort logic applied to snapshots. Nothing here touches storage or
//! threads.
//!
//! # Organization
//!
//! - [`error`]: Error types and result aliases
//! - [`item`]: `WatchHistoryItem` and display helpers
//! - [`query`]: Search and sort over snapshots
//!
//! # Examples
//!
//! ```
//! use watch_history::domain::{HistoryQuery, WatchHistoryItem};
//! use std::path::Path;
//!
//! let item = WatchHistoryItem::from_progress(Path::new("a.mkv"), 12.0, 60.0, None, 0);
//! let visible = HistoryQuery::default().apply(&[item]);
//! assert_eq!(visible.len(), 1);
//! ```

pub mod error;
pub mod item;
pub mod query;

pub use error::{Result, WatchHistoryError};
pub use item::{format_position, WatchHistoryItem, MILLIS_PER_DAY};
pub use query::{HistoryQuery, SortKey, SortOrder};
