//! Throttled playback progress recording.
//!
//! A media player reports its position several times per second. The
//! [`ProgressRecorder`] keeps the latest report as a pending item and saves at
//! most once per fixed window (default 5 seconds). It is not a debounce: the
//! first report in a fresh window is saved right away, and nothing is flushed
//! later by a timer. Call [`ProgressRecorder::force_save`] on pause, stop, or
//! shutdown to persist the last report.
//!
//! Storage failures never reach the player. They are logged and reported back
//! as an outcome value.

use crate::domain::WatchHistoryItem;
use crate::repository::WatchHistoryRepository;
use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tracing::Instrument;

/// Default throttle window in milliseconds.
pub const DEFAULT_SAVE_INTERVAL_MS: i64 = 5_000;

/// Source of "now" in epoch milliseconds.
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now_ms(&self) -> i64;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Clock that only moves when told to. Clones share the same time.
///
/// # Examples
///
/// ```
/// use watch_history::recorder::{Clock, ManualClock};
///
/// let clock = ManualClock::new(1_000);
/// let shared = clock.clone();
/// clock.advance(500);
/// assert_eq!(shared.now_ms(), 1_500);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    #[must_use]
    pub fn new(start_ms: i64) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(start_ms)),
        }
    }

    pub fn set(&self, now_ms: i64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ms: i64) {
        self.now.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// What [`ProgressRecorder::record_progress`] did with a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// The report opened a new window and was saved.
    Saved,
    /// The report was kept as pending without any I/O.
    Throttled,
    /// The save was attempted and failed; the report stays pending.
    Failed,
}

/// What [`ProgressRecorder::force_save`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// The pending item was saved and cleared.
    Flushed,
    /// There was nothing to save.
    NothingPending,
    /// The save failed; the pending item is kept for a later retry.
    Failed,
}

/// Per-session progress recorder.
///
/// Holds the throttle state for one playback session; create one per player.
#[derive(Debug)]
pub struct ProgressRecorder {
    repository: WatchHistoryRepository,
    clock: Arc<dyn Clock>,
    interval_ms: i64,
    last_save: Option<i64>,
    pending: Option<WatchHistoryItem>,
}

impl ProgressRecorder {
    /// Creates a recorder with the default 5 second window and the
    /// repository's clock.
    #[must_use]
    pub fn new(repository: WatchHistoryRepository) -> Self {
        Self::with_interval(repository, DEFAULT_SAVE_INTERVAL_MS)
    }

    /// Creates a recorder with a custom window. Non-positive windows save
    /// every report.
    #[must_use]
    pub fn with_interval(repository: WatchHistoryRepository, interval_ms: i64) -> Self {
        let clock = repository.clock();
        Self {
            repository,
            clock,
            interval_ms,
            last_save: None,
            pending: None,
        }
    }

    /// Replaces the clock used for throttling and timestamps.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn interval_ms(&self) -> i64 {
        self.interval_ms
    }

    /// Latest report not yet known to be saved by [`force_save`](Self::force_save).
    #[must_use]
    pub fn pending(&self) -> Option<&WatchHistoryItem> {
        self.pending.as_ref()
    }

    /// Records a playback position of `video`.
    ///
    /// The report always replaces the pending item. It is saved only when no
    /// save has happened yet or the last one is at least one window old; the
    /// window starts when the save is attempted, successful or not.
    pub async fn record_progress(
        &mut self,
        video: &Path,
        current_time: f64,
        duration: f64,
        subtitle: Option<&Path>,
    ) -> RecordOutcome {
        let now = self.clock.now_ms();
        let item = WatchHistoryItem::from_progress(video, current_time, duration, subtitle, now);
        let span = tracing::debug_span!("record_progress", id = %item.id, now);

        let due = self
            .last_save
            .map_or(true, |last| now.saturating_sub(last) >= self.interval_ms);
        self.pending = Some(item.clone());

        if !due {
            span.in_scope(|| tracing::trace!("progress throttled"));
            return RecordOutcome::Throttled;
        }

        self.last_save = Some(now);
        let result = self.repository.save(item).instrument(span.clone()).await;

        let _enter = span.enter();
        match result {
            Ok(()) => {
                tracing::debug!(position = current_time, "progress saved");
                RecordOutcome::Saved
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to save progress");
                RecordOutcome::Failed
            }
        }
    }

    /// Saves the pending item regardless of the throttle window.
    pub async fn force_save(&mut self) -> FlushOutcome {
        let Some(item) = self.pending.clone() else {
            tracing::trace!("nothing pending to flush");
            return FlushOutcome::NothingPending;
        };
        let span = tracing::debug_span!("force_save", id = %item.id);

        let result = self.repository.save(item).instrument(span.clone()).await;

        let _enter = span.enter();
        match result {
            Ok(()) => {
                self.pending = None;
                tracing::debug!("pending progress flushed");
                FlushOutcome::Flushed
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to flush pending progress");
                FlushOutcome::Failed
            }
        }
    }
}
