//! Change notification for live history queries.
//!
//! The store worker owns a [`ChangeNotifier`] and, after every mutation that
//! changed data, pushes one ordered snapshot into each subscriber's unbounded
//! channel. Each subscriber drains its own channel on its own task, so a slow
//! observer never holds up the worker or the other subscribers.
//!
//! Subscribers come in two shapes:
//!
//! - [`Subscription`]: a callback invoked on a tokio task. Dropping or
//!   [`unsubscribe`](Subscription::unsubscribe)-ing it guarantees the callback
//!   is never invoked again, even if a snapshot was already queued or being
//!   delivered at that moment.
//! - [`SnapshotStream`]: a [`Stream`] of snapshots for async consumers.

use crate::domain::error::Result;
use crate::domain::WatchHistoryItem;
use crate::worker::StoreHandle;
use futures_util::Stream;
use std::collections::HashMap;
use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::thread::ThreadId;
use tokio::sync::mpsc;

/// Full ordered contents of the store at one point in time.
pub type Snapshot = Arc<[WatchHistoryItem]>;

/// Observer callback for [`Subscription`]s.
pub type Callback = Box<dyn FnMut(&[WatchHistoryItem]) + Send>;

/// Identifies one subscriber within a store worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub(crate) const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw numeric value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Registry of subscriber channels, owned by the store worker.
#[derive(Debug, Default)]
pub struct ChangeNotifier {
    subscribers: HashMap<SubscriptionId, mpsc::UnboundedSender<Snapshot>>,
}

impl ChangeNotifier {
    /// Registers `sender` under `id` after handing it `initial`.
    ///
    /// Returns `false` (and registers nothing) if the receiving side is
    /// already gone.
    pub fn register(
        &mut self,
        id: SubscriptionId,
        sender: mpsc::UnboundedSender<Snapshot>,
        initial: Snapshot,
    ) -> bool {
        if sender.send(initial).is_err() {
            return false;
        }
        self.subscribers.insert(id, sender);
        true
    }

    /// Removes subscriber `id`, returning whether it was registered.
    pub fn remove(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.remove(&id).is_some()
    }

    #[must_use]
    pub fn has_subscribers(&self) -> bool {
        !self.subscribers.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Queues `snapshot` for every subscriber and drops the ones whose
    /// receiver has gone away. Returns the number still registered.
    pub fn broadcast(&mut self, snapshot: Snapshot) -> usize {
        self.subscribers.retain(|id, sender| {
            let alive = sender.send(Arc::clone(&snapshot)).is_ok();
            if !alive {
                tracing::trace!(subscription = %id, "pruning closed subscriber");
            }
            alive
        });
        self.subscribers.len()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared state between a delivery task and its [`Subscription`].
///
/// The callback lock is held for the whole invocation, so revoking from
/// another thread waits for an in-flight call to finish. Revoking from inside
/// the callback itself only sets the flag.
pub(crate) struct DeliverySlot {
    revoked: AtomicBool,
    callback: Mutex<Option<Callback>>,
    delivering_thread: Mutex<Option<ThreadId>>,
}

impl DeliverySlot {
    pub(crate) fn new(callback: Callback) -> Self {
        Self {
            revoked: AtomicBool::new(false),
            callback: Mutex::new(Some(callback)),
            delivering_thread: Mutex::new(None),
        }
    }

    /// Invokes the callback with `snapshot` unless revoked. Returns whether
    /// further deliveries are wanted.
    pub(crate) fn deliver(&self, snapshot: &[WatchHistoryItem]) -> bool {
        let mut callback = lock(&self.callback);
        if self.revoked.load(Ordering::Acquire) {
            return false;
        }
        let Some(callback) = callback.as_mut() else {
            return false;
        };

        *lock(&self.delivering_thread) = Some(std::thread::current().id());
        callback(snapshot);
        *lock(&self.delivering_thread) = None;

        !self.revoked.load(Ordering::Acquire)
    }

    /// Stops all future deliveries and releases the callback.
    pub(crate) fn revoke(&self) {
        self.revoked.store(true, Ordering::Release);

        let inside_callback =
            *lock(&self.delivering_thread) == Some(std::thread::current().id());
        if !inside_callback {
            drop(lock(&self.callback).take());
        }
    }

    pub(crate) fn is_revoked(&self) -> bool {
        self.revoked.load(Ordering::Acquire)
    }
}

/// Deregisters a subscriber from the worker when dropped.
struct SubscriptionGuard {
    id: SubscriptionId,
    store: StoreHandle,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.store.forget_subscriber(self.id);
    }
}

/// Registers a new subscriber with the worker and returns its receiver along
/// with the guard that removes it again.
async fn register(
    store: &StoreHandle,
) -> Result<(SubscriptionGuard, mpsc::UnboundedReceiver<Snapshot>)> {
    let id = store.next_subscription_id();
    let (sender, receiver) = mpsc::unbounded_channel();
    let guard = SubscriptionGuard {
        id,
        store: store.clone(),
    };

    store.subscribe(id, sender).await?;
    Ok((guard, receiver))
}

/// A live callback subscription.
///
/// The callback receives the current snapshot right after subscribing and a
/// fresh snapshot after every mutation, in commit order. Once
/// [`unsubscribe`](Self::unsubscribe) returns, or the value is dropped, the
/// callback is never called again.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: SubscriptionId,
    slot: Arc<DeliverySlot>,
    guard: Option<SubscriptionGuard>,
}

impl Subscription {
    /// Subscribes `callback` to changes in `store`.
    ///
    /// Must be called from within a tokio runtime; deliveries run on a
    /// spawned task.
    pub(crate) async fn start(store: &StoreHandle, callback: Callback) -> Result<Self> {
        let (guard, mut receiver) = register(store).await?;
        let id = guard.id;
        let slot = Arc::new(DeliverySlot::new(callback));

        let task_slot = Arc::clone(&slot);
        tokio::spawn(async move {
            while let Some(snapshot) = receiver.recv().await {
                if !task_slot.deliver(&snapshot) {
                    break;
                }
            }
            tracing::trace!(subscription = %id, "delivery task finished");
        });

        tracing::debug!(subscription = %id, "live subscription started");
        Ok(Self {
            id,
            slot,
            guard: Some(guard),
        })
    }

    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Returns `true` while the callback may still be invoked.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.slot.is_revoked()
    }

    /// Stops deliveries. Safe to call from inside the callback.
    pub fn unsubscribe(mut self) {
        self.cancel();
    }

    fn cancel(&mut self) {
        if let Some(guard) = self.guard.take() {
            self.slot.revoke();
            tracing::debug!(subscription = %guard.id, "live subscription stopped");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Stream of snapshots: the current one first, then one per mutation.
///
/// Dropping the stream deregisters it.
pub struct SnapshotStream {
    receiver: mpsc::UnboundedReceiver<Snapshot>,
    guard: SubscriptionGuard,
}

impl SnapshotStream {
    pub(crate) async fn open(store: &StoreHandle) -> Result<Self> {
        let (guard, receiver) = register(store).await?;
        tracing::debug!(subscription = %guard.id, "snapshot stream opened");
        Ok(Self { receiver, guard })
    }

    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.guard.id
    }

    /// Waits for the next snapshot. Returns `None` once the store is gone.
    pub async fn next_snapshot(&mut self) -> Option<Snapshot> {
        self.receiver.recv().await
    }
}

impl Stream for SnapshotStream {
    type Item = Snapshot;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl fmt::Debug for SnapshotStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotStream")
            .field("id", &self.guard.id)
            .finish_non_exhaustive()
    }
}
