//! Search and sort over a history snapshot.
//!
//! Snapshots are small (thousands of items), so queries run over the full
//! vector in memory.

use super::item::WatchHistoryItem;
use std::cmp::Ordering;

/// Column a history listing can be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    Name,
    FirstWatched,
    #[default]
    LastWatched,
    TotalDuration,
    LastPosition,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Filter and ordering applied to a snapshot for display.
///
/// The default query keeps everything, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryQuery {
    /// Case-insensitive substring matched against `name` and `subtitle_name`.
    pub search: Option<String>,
    pub sort_key: SortKey,
    pub order: SortOrder,
}

impl HistoryQuery {
    /// Returns `true` if `item` passes the search filter.
    #[must_use]
    pub fn matches(&self, item: &WatchHistoryItem) -> bool {
        let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) else {
            return true;
        };
        let needle = search.to_lowercase();
        item.name.to_lowercase().contains(&needle)
            || item.subtitle_name.to_lowercase().contains(&needle)
    }

    /// Filters and sorts `items`. The sort is stable, so items that compare
    /// equal keep their snapshot order.
    #[must_use]
    pub fn apply(&self, items: &[WatchHistoryItem]) -> Vec<WatchHistoryItem> {
        let mut result: Vec<WatchHistoryItem> =
            items.iter().filter(|item| self.matches(item)).cloned().collect();

        result.sort_by(|a, b| {
            let ordering = self.compare(a, b);
            match self.order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });

        result
    }

    fn compare(&self, a: &WatchHistoryItem, b: &WatchHistoryItem) -> Ordering {
        match self.sort_key {
            SortKey::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            SortKey::FirstWatched => a.first_watched.cmp(&b.first_watched),
            SortKey::LastWatched => a.last_watched.cmp(&b.last_watched),
            SortKey::TotalDuration => a.total_duration.total_cmp(&b.total_duration),
            SortKey::LastPosition => a.last_position.total_cmp(&b.last_position),
        }
    }
}
