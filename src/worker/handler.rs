//! Store worker thread and its client handle.
//!
//! The worker owns the [`RecordStore`] and the [`ChangeNotifier`] on a dedicated
//! OS thread and processes one request at a time. That serialization is what
//! gives every store per-key upsert atomicity, and it orders change
//! notifications exactly like the mutations that caused them.

use crate::domain::error::{Result, WatchHistoryError};
use crate::domain::WatchHistoryItem;
use crate::notifier::{ChangeNotifier, Snapshot, SubscriptionId};
use crate::storage::RecordStore;
use crate::worker::messages::{Envelope, Reply, StoreRequest};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Name given to the worker thread.
const WORKER_THREAD_NAME: &str = "watch-history-store";

/// Worker state: the store plus the subscribers to notify after mutations.
pub struct StoreWorker {
    store: Box<dyn RecordStore>,
    notifier: ChangeNotifier,
}

impl StoreWorker {
    /// Creates a worker around `store` with no subscribers.
    #[must_use]
    pub fn new(store: Box<dyn RecordStore>) -> Self {
        Self {
            store,
            notifier: ChangeNotifier::default(),
        }
    }

    /// Sends `result` back to the caller with consistent logging.
    ///
    /// A caller that stopped waiting is not an error: the operation has already
    /// been applied.
    fn respond<T>(operation: &str, reply: Reply<T>, result: Result<T>) {
        match &result {
            Ok(_) => tracing::debug!(operation, "store operation successful"),
            Err(e) => tracing::warn!(operation, error = %e, "store operation failed"),
        }
        if reply.send(result).is_err() {
            tracing::debug!(operation, "caller dropped before reply");
        }
    }

    /// Recomputes the ordered snapshot and pushes it to every subscriber.
    fn notify_change(&mut self, operation: &str) {
        if !self.notifier.has_subscribers() {
            return;
        }

        match self.store.get_all() {
            Ok(items) => {
                let delivered = self.notifier.broadcast(Snapshot::from(items));
                tracing::debug!(operation, subscribers = delivered, "change broadcast");
            }
            Err(e) => {
                tracing::warn!(operation, error = %e, "failed to read snapshot for subscribers");
            }
        }
    }

    fn handle_upsert(&mut self, item: &WatchHistoryItem) -> Result<()> {
        self.store.upsert(item)?;
        self.notify_change("upsert");
        Ok(())
    }

    fn handle_delete_by_key(&mut self, id: &str) -> Result<bool> {
        let removed = self.store.delete_by_key(id)?;
        if removed {
            self.notify_change("delete_by_key");
        }
        Ok(removed)
    }

    /// Ids removed before a failure stay removed, and subscribers hear about
    /// them.
    fn handle_delete_by_keys(&mut self, ids: &[String]) -> Result<usize> {
        let (removed, outcome) = match self.store.delete_by_keys(ids) {
            Ok(removed) => (removed, Ok(())),
            Err(partial) => (partial.removed, Err(partial.error)),
        };

        if removed > 0 {
            self.notify_change("delete_by_keys");
        }
        outcome.map(|()| removed)
    }

    fn handle_delete_below(&mut self, threshold: i64) -> Result<usize> {
        let removed = self.store.delete_where_last_watched_below(threshold)?;
        if removed > 0 {
            self.notify_change("delete_below");
        }
        Ok(removed)
    }

    fn handle_clear(&mut self) -> Result<usize> {
        let removed = self.store.clear()?;
        if removed > 0 {
            self.notify_change("clear");
        }
        Ok(removed)
    }

    fn handle_subscribe(
        &mut self,
        id: SubscriptionId,
        sender: mpsc::UnboundedSender<Snapshot>,
    ) -> Result<()> {
        let snapshot = Snapshot::from(self.store.get_all()?);
        if self.notifier.register(id, sender, snapshot) {
            tracing::debug!(subscription = %id, subscribers = self.notifier.len(), "subscriber registered");
        } else {
            tracing::debug!(subscription = %id, "subscriber gone before registration");
        }
        Ok(())
    }

    /// Processes a single request and replies to its sender.
    pub fn handle_message(&mut self, request: StoreRequest) {
        let span = tracing::debug_span!("store_request", kind = request.kind());
        let _guard = span.entered();

        match request {
            StoreRequest::Upsert { item, reply } => {
                Self::respond("upsert", reply, self.handle_upsert(&item));
            }
            StoreRequest::GetAll { reply } => {
                Self::respond("get_all", reply, self.store.get_all());
            }
            StoreRequest::GetMostRecent { count, reply } => {
                Self::respond("get_most_recent", reply, self.store.get_most_recent(count));
            }
            StoreRequest::GetByKey { id, reply } => {
                Self::respond("get_by_key", reply, self.store.get_by_key(&id));
            }
            StoreRequest::DeleteByKey { id, reply } => {
                Self::respond("delete_by_key", reply, self.handle_delete_by_key(&id));
            }
            StoreRequest::DeleteByKeys { ids, reply } => {
                Self::respond("delete_by_keys", reply, self.handle_delete_by_keys(&ids));
            }
            StoreRequest::DeleteBelow { threshold, reply } => {
                Self::respond("delete_below", reply, self.handle_delete_below(threshold));
            }
            StoreRequest::Clear { reply } => {
                Self::respond("clear", reply, self.handle_clear());
            }
            StoreRequest::Subscribe { id, sender, reply } => {
                Self::respond("subscribe", reply, self.handle_subscribe(id, sender));
            }
            StoreRequest::Unsubscribe { id } => {
                let removed = self.notifier.remove(id);
                tracing::debug!(subscription = %id, removed, "subscriber removed");
            }
        }
    }

    /// Runs until every handle has been dropped.
    fn run(mut self, mut receiver: mpsc::UnboundedReceiver<Envelope>) {
        tracing::debug!("store worker started");

        while let Some(Envelope { request, span }) = receiver.blocking_recv() {
            let _parent = span.enter();
            self.handle_message(request);
        }

        tracing::debug!("store worker stopped");
    }
}

impl std::fmt::Debug for StoreWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreWorker")
            .field("subscribers", &self.notifier.len())
            .finish_non_exhaustive()
    }
}

/// Cloneable client for the store worker.
///
/// Every method sends one request and awaits its reply; requests from one
/// handle are applied in the order they were sent. Dropping the future of a
/// mutating call does not cancel it: the worker still applies the change.
///
/// The worker thread stops once the last handle (including the ones held by
/// live subscriptions) is dropped.
#[derive(Debug, Clone)]
pub struct StoreHandle {
    sender: mpsc::UnboundedSender<Envelope>,
    next_subscription: Arc<AtomicU64>,
}

impl StoreHandle {
    /// Starts a worker thread that owns `store` and returns a handle to it.
    ///
    /// # Errors
    ///
    /// Returns [`WatchHistoryError::Worker`] if the thread cannot be spawned.
    pub fn spawn(store: Box<dyn RecordStore>) -> Result<Self> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let worker = StoreWorker::new(store);

        std::thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || worker.run(receiver))
            .map_err(|e| WatchHistoryError::Worker(format!("failed to spawn store worker: {e}")))?;

        Ok(Self {
            sender,
            next_subscription: Arc::new(AtomicU64::new(1)),
        })
    }

    /// Sends the request built by `build` and waits for its reply.
    pub(crate) async fn call<T>(&self, build: impl FnOnce(Reply<T>) -> StoreRequest) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(Envelope::new(build(reply)))
            .map_err(|_| WatchHistoryError::Worker("store worker is not running".to_string()))?;

        response
            .await
            .map_err(|_| WatchHistoryError::Worker("store worker dropped the reply".to_string()))?
    }

    /// Allocates an id for a new subscription.
    pub(crate) fn next_subscription_id(&self) -> SubscriptionId {
        SubscriptionId::new(self.next_subscription.fetch_add(1, Ordering::Relaxed))
    }

    /// Asks the worker to drop subscriber `id` without waiting.
    pub(crate) fn forget_subscriber(&self, id: SubscriptionId) {
        if self
            .sender
            .send(Envelope::new(StoreRequest::Unsubscribe { id }))
            .is_err()
        {
            tracing::trace!(subscription = %id, "store worker already stopped");
        }
    }
}
