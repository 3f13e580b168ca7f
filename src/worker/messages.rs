//! Store worker request protocol.
//!
//! This module defines the requests sent from repository handles to the store
//! worker thread, and generates the async [`StoreHandle`] methods that send
//! them and await the reply. Every request travels in an [`Envelope`] together
//! with the caller's tracing span, so spans opened by the worker nest under the
//! operation that caused them.

use crate::domain::error::Result;
use crate::domain::WatchHistoryItem;
use crate::notifier::{Snapshot, SubscriptionId};
use crate::worker::handler::StoreHandle;
use tokio::sync::{mpsc, oneshot};

/// Reply channel for a request producing `T`.
pub type Reply<T> = oneshot::Sender<Result<T>>;

/// A request together with the span of the code that sent it.
#[derive(Debug)]
pub struct Envelope {
    /// The operation to perform.
    pub request: StoreRequest,

    /// Caller's span at send time, entered by the worker while handling.
    pub span: tracing::Span,
}

impl Envelope {
    /// Wraps `request` with the current tracing span.
    pub fn new(request: StoreRequest) -> Self {
        Self {
            request,
            span: tracing::Span::current(),
        }
    }
}

/// Operations handled by the store worker, one at a time in arrival order.
///
/// Mutating variants trigger a change notification when they alter stored
/// data. Reads never notify.
#[derive(Debug)]
pub enum StoreRequest {
    /// Insert or replace a record by id.
    Upsert {
        item: WatchHistoryItem,
        reply: Reply<()>,
    },

    /// Read every record, newest first.
    GetAll { reply: Reply<Vec<WatchHistoryItem>> },

    /// Read at most `count` records, newest first.
    GetMostRecent {
        count: usize,
        reply: Reply<Vec<WatchHistoryItem>>,
    },

    /// Look up one record.
    GetByKey {
        id: String,
        reply: Reply<Option<WatchHistoryItem>>,
    },

    /// Remove one record; replies whether it existed.
    DeleteByKey { id: String, reply: Reply<bool> },

    /// Remove several records one after another; replies with the number removed.
    DeleteByKeys {
        ids: Vec<String>,
        reply: Reply<usize>,
    },

    /// Remove records with `last_watched < threshold`.
    DeleteBelow { threshold: i64, reply: Reply<usize> },

    /// Remove everything.
    Clear { reply: Reply<usize> },

    /// Register a subscriber and push the current snapshot to it.
    Subscribe {
        id: SubscriptionId,
        sender: mpsc::UnboundedSender<Snapshot>,
        reply: Reply<()>,
    },

    /// Drop a subscriber. Sent without waiting for a reply.
    Unsubscribe { id: SubscriptionId },
}

impl StoreRequest {
    /// Short name of the operation, used in logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Upsert { .. } => "upsert",
            Self::GetAll { .. } => "get_all",
            Self::GetMostRecent { .. } => "get_most_recent",
            Self::GetByKey { .. } => "get_by_key",
            Self::DeleteByKey { .. } => "delete_by_key",
            Self::DeleteByKeys { .. } => "delete_by_keys",
            Self::DeleteBelow { .. } => "delete_below",
            Self::Clear { .. } => "clear",
            Self::Subscribe { .. } => "subscribe",
            Self::Unsubscribe { .. } => "unsubscribe",
        }
    }
}

/// Generates async `StoreHandle` methods that send a request variant and
/// await its reply.
macro_rules! store_request_methods {
    (
        $(
            $(#[$doc:meta])*
            $method:ident($variant:ident { $($field:ident: $ty:ty),* $(,)? }) -> $ret:ty
        ),* $(,)?
    ) => {
        impl StoreHandle {
            $(
                $(#[$doc])*
                ///
                /// # Errors
                ///
                /// Returns the store's error, or [`WatchHistoryError::Worker`](crate::WatchHistoryError::Worker)
                /// if the worker thread is gone.
                pub async fn $method(&self, $($field: $ty),*) -> Result<$ret> {
                    self.call(|reply| StoreRequest::$variant { $($field,)* reply }).await
                }
            )*
        }
    };
}

store_request_methods! {
    /// Inserts or replaces `item` by id.
    upsert(Upsert { item: WatchHistoryItem }) -> (),
    /// Returns every record, newest first.
    get_all(GetAll {}) -> Vec<WatchHistoryItem>,
    /// Returns at most `count` records, newest first.
    get_most_recent(GetMostRecent { count: usize }) -> Vec<WatchHistoryItem>,
    /// Looks up a record by id.
    get_by_key(GetByKey { id: String }) -> Option<WatchHistoryItem>,
    /// Removes a record by id, returning whether it existed.
    delete_by_key(DeleteByKey { id: String }) -> bool,
    /// Removes records by id in order, returning how many existed.
    delete_by_keys(DeleteByKeys { ids: Vec<String> }) -> usize,
    /// Removes records with `last_watched < threshold`.
    delete_below(DeleteBelow { threshold: i64 }) -> usize,
    /// Removes every record.
    clear(Clear {}) -> usize,
    /// Registers `sender` as subscriber `id` and pushes the current snapshot to it.
    subscribe(Subscribe { id: SubscriptionId, sender: mpsc::UnboundedSender<Snapshot> }) -> (),
}
