//! Watch-history item model and display helpers.
//!
//! A [`WatchHistoryItem`] is one entry per distinct media file ever played. Its
//! `id` is the file name without any directory component, which makes it the
//! uniqueness key of the store.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Number of milliseconds in one minute.
const MILLIS_PER_MINUTE: i64 = 60_000;

/// Number of milliseconds in one hour.
const MILLIS_PER_HOUR: i64 = 3_600_000;

/// Number of milliseconds in one day.
pub const MILLIS_PER_DAY: i64 = 86_400_000;

/// Playback progress recorded for a single media file.
///
/// Serialized with the field names of the import/export payload
/// (`totalDuration`, `lastPosition`, `firstWatched`, ...). Unknown fields are
/// ignored on import so payloads carrying extra bookkeeping columns still load.
///
/// # Fields
///
/// - `id`: file name, unique across the store
/// - `name`: display name, normally the same as `id`
/// - `total_duration` / `last_position`: seconds, never negative once saved
/// - `first_watched` / `last_watched`: epoch milliseconds
/// - `subtitle_name`, `video_path`, `subtitle_path`: local references, possibly empty
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchHistoryItem {
    pub id: String,
    pub name: String,
    pub total_duration: f64,
    pub last_position: f64,
    pub first_watched: i64,
    pub last_watched: i64,
    pub subtitle_name: String,
    pub video_path: String,
    pub subtitle_path: String,
}

impl WatchHistoryItem {
    /// Builds an item for a playback position of `video`, stamped with `now_ms`
    /// as both `first_watched` and `last_watched`.
    ///
    /// The id and name are the file name of `video`. Negative or non-finite
    /// positions and durations are clamped to zero.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::path::Path;
    /// use watch_history::WatchHistoryItem;
    ///
    /// let item = WatchHistoryItem::from_progress(
    ///     Path::new("/media/show/episode-01.mkv"),
    ///     -3.0,
    ///     1440.0,
    ///     Some(Path::new("/media/show/episode-01.srt")),
    ///     1_700_000_000_000,
    /// );
    /// assert_eq!(item.id, "episode-01.mkv");
    /// assert_eq!(item.last_position, 0.0);
    /// assert_eq!(item.subtitle_name, "episode-01.srt");
    /// ```
    #[must_use]
    pub fn from_progress(
        video: &Path,
        current_time: f64,
        duration: f64,
        subtitle: Option<&Path>,
        now_ms: i64,
    ) -> Self {
        let name = file_name_of(video);
        let (subtitle_name, subtitle_path) = subtitle.map_or_else(
            || (String::new(), String::new()),
            |path| (file_name_of(path), path.display().to_string()),
        );

        Self {
            id: name.clone(),
            name,
            total_duration: non_negative(duration),
            last_position: non_negative(current_time),
            first_watched: now_ms,
            last_watched: now_ms,
            subtitle_name,
            video_path: video.display().to_string(),
            subtitle_path,
        }
    }

    /// Returns a copy with negative or non-finite durations and positions
    /// clamped to zero.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        self.total_duration = non_negative(self.total_duration);
        self.last_position = non_negative(self.last_position);
        self
    }

    /// Returns `true` if durations and positions are already valid.
    #[must_use]
    pub fn is_sane(&self) -> bool {
        non_negative(self.total_duration) == self.total_duration
            && non_negative(self.last_position) == self.last_position
    }

    /// Fraction of the media already watched, in `[0, 1]`.
    ///
    /// Returns `0.0` when the total duration is unknown (zero).
    #[must_use]
    pub fn progress_ratio(&self) -> f64 {
        if self.total_duration <= 0.0 {
            return 0.0;
        }
        (self.last_position / self.total_duration).clamp(0.0, 1.0)
    }

    /// Returns a human-readable string describing how long ago the item was
    /// last watched, relative to `now_ms`.
    ///
    /// - Less than 1 minute: "just now"
    /// - Less than 1 hour: "Xm ago"
    /// - Less than 1 day: "Xh ago"
    /// - Otherwise: "Xd ago"
    #[must_use]
    pub fn time_ago(&self, now_ms: i64) -> String {
        let diff = now_ms.saturating_sub(self.last_watched);

        if diff < MILLIS_PER_MINUTE {
            "just now".to_string()
        } else if diff < MILLIS_PER_HOUR {
            format!("{}m ago", diff / MILLIS_PER_MINUTE)
        } else if diff < MILLIS_PER_DAY {
            format!("{}h ago", diff / MILLIS_PER_HOUR)
        } else {
            format!("{}d ago", diff / MILLIS_PER_DAY)
        }
    }
}

/// Formats a playback offset in seconds as `MM:SS`, or `HH:MM:SS` from one hour on.
///
/// Fractions of a second are floored; negative input formats as `00:00`.
///
/// # Examples
///
/// ```
/// use watch_history::format_position;
///
/// assert_eq!(format_position(75.9), "01:15");
/// assert_eq!(format_position(3725.0), "01:02:05");
/// ```
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn format_position(seconds: f64) -> String {
    let total = non_negative(seconds).floor() as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes:02}:{secs:02}")
    }
}

/// Last path component as a string, or the whole path if it has none.
fn file_name_of(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    )
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}
