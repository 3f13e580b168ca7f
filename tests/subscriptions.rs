mod common;

use common::{ids, item, FailingStore, PoisonedStore, WAIT};
use futures_util::StreamExt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use watch_history::{Subscription, WatchHistoryRepository};

/// Subscribes and forwards every delivered snapshot's ids into a channel.
async fn subscribe_ids(
    repository: &WatchHistoryRepository,
) -> (Subscription, mpsc::UnboundedReceiver<Vec<String>>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let subscription = repository
        .live_fetch(move |snapshot| {
            let _ = tx.send(ids(snapshot));
        })
        .await
        .unwrap();
    (subscription, rx)
}

async fn next(rx: &mut mpsc::UnboundedReceiver<Vec<String>>) -> Vec<String> {
    timeout(WAIT, rx.recv())
        .await
        .expect("snapshot not delivered in time")
        .expect("subscription closed")
}

#[tokio::test]
async fn receives_current_snapshot_then_changes() {
    let repository = WatchHistoryRepository::in_memory().unwrap();
    repository.save(item("a", 1)).await.unwrap();

    let (_subscription, mut rx) = subscribe_ids(&repository).await;
    assert_eq!(next(&mut rx).await, ["a"]);

    repository.save(item("b", 2)).await.unwrap();
    assert_eq!(next(&mut rx).await, ["b", "a"]);

    repository.delete("a").await.unwrap();
    assert_eq!(next(&mut rx).await, ["b"]);

    repository.clear().await.unwrap();
    assert!(next(&mut rx).await.is_empty());
}

#[tokio::test]
async fn one_snapshot_per_mutation_in_order() {
    let repository = WatchHistoryRepository::in_memory().unwrap();
    let (_subscription, mut rx) = subscribe_ids(&repository).await;

    for (n, id) in ["a", "b", "c"].into_iter().enumerate() {
        repository.save(item(id, n as i64)).await.unwrap();
    }

    let lengths: Vec<usize> = [
        next(&mut rx).await,
        next(&mut rx).await,
        next(&mut rx).await,
        next(&mut rx).await,
    ]
    .iter()
    .map(Vec::len)
    .collect();
    assert_eq!(lengths, [0, 1, 2, 3]);
}

#[tokio::test]
async fn reads_and_no_op_deletes_do_not_notify() {
    let repository = WatchHistoryRepository::in_memory().unwrap();
    repository.save(item("a", 1)).await.unwrap();
    let (_subscription, mut rx) = subscribe_ids(&repository).await;
    assert_eq!(next(&mut rx).await, ["a"]);

    repository.fetch_all().await.unwrap();
    repository.find_by_name("a").await.unwrap();
    repository.delete("missing").await.unwrap();
    repository.delete_older_than(0).await.unwrap();
    repository.save(item("b", 2)).await.unwrap();

    assert_eq!(next(&mut rx).await, ["b", "a"]);
}

#[tokio::test]
async fn unsubscribe_stops_deliveries() {
    let repository = WatchHistoryRepository::in_memory().unwrap();
    let (subscription, mut rx) = subscribe_ids(&repository).await;
    assert!(next(&mut rx).await.is_empty());
    assert!(subscription.is_active());

    subscription.unsubscribe();
    repository.save(item("a", 1)).await.unwrap();

    // The callback, and with it the sender, is released on unsubscribe.
    assert_eq!(timeout(WAIT, rx.recv()).await.unwrap(), None);
}

#[tokio::test]
async fn dropping_subscription_stops_deliveries() {
    let repository = WatchHistoryRepository::in_memory().unwrap();
    let (subscription, mut rx) = subscribe_ids(&repository).await;
    next(&mut rx).await;

    drop(subscription);
    repository.save(item("a", 1)).await.unwrap();

    assert_eq!(timeout(WAIT, rx.recv()).await.unwrap(), None);
}

#[tokio::test]
async fn unsubscribe_from_inside_callback() {
    let repository = WatchHistoryRepository::in_memory().unwrap();
    let holder: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
    let (tx, mut rx) = mpsc::unbounded_channel();

    let inner = Arc::clone(&holder);
    let subscription = repository
        .live_fetch(move |snapshot| {
            let seen = ids(snapshot);
            let stop = seen.iter().any(|id| id == "stop");
            let _ = tx.send(seen);
            if stop {
                if let Some(subscription) = inner.lock().unwrap().take() {
                    subscription.unsubscribe();
                }
            }
        })
        .await
        .unwrap();
    *holder.lock().unwrap() = Some(subscription);

    next(&mut rx).await;
    repository.save(item("stop", 1)).await.unwrap();
    assert_eq!(next(&mut rx).await, ["stop"]);

    repository.save(item("after", 2)).await.unwrap();
    assert_eq!(timeout(WAIT, rx.recv()).await.unwrap(), None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn slow_subscriber_does_not_hold_up_others() {
    let repository = WatchHistoryRepository::in_memory().unwrap();
    let slow = repository
        .live_fetch(|_| std::thread::sleep(Duration::from_millis(500)))
        .await
        .unwrap();
    let (_fast, mut rx) = subscribe_ids(&repository).await;
    next(&mut rx).await;

    for n in 0..3 {
        timeout(Duration::from_millis(300), repository.save(item(&format!("m{n}"), n)))
            .await
            .expect("mutation waited on a subscriber")
            .unwrap();
    }

    assert_eq!(next(&mut rx).await.len(), 1);
    assert_eq!(next(&mut rx).await.len(), 2);
    assert_eq!(next(&mut rx).await.len(), 3);
    drop(slow);
}

#[tokio::test]
async fn independent_subscribers_see_the_same_sequence() {
    let repository = WatchHistoryRepository::in_memory().unwrap();
    let (_first, mut rx_first) = subscribe_ids(&repository).await;
    let (_second, mut rx_second) = subscribe_ids(&repository).await;

    repository.save(item("a", 1)).await.unwrap();
    repository.save(item("b", 2)).await.unwrap();

    for _ in 0..3 {
        assert_eq!(next(&mut rx_first).await, next(&mut rx_second).await);
    }
}

#[tokio::test]
async fn snapshot_stream_follows_changes() {
    let repository = WatchHistoryRepository::in_memory().unwrap();
    repository.save(item("a", 1)).await.unwrap();

    let mut stream = repository.watch().await.unwrap();
    let initial = timeout(WAIT, stream.next()).await.unwrap().unwrap();
    assert_eq!(ids(&initial), ["a"]);

    repository.save(item("b", 5)).await.unwrap();
    let updated = timeout(WAIT, stream.next_snapshot()).await.unwrap().unwrap();
    assert_eq!(ids(&updated), ["b", "a"]);
}

#[tokio::test]
async fn subscribing_to_unavailable_store_fails() {
    let repository = WatchHistoryRepository::new(Box::new(FailingStore)).unwrap();

    let err = repository.live_fetch(|_| {}).await.unwrap_err();
    assert!(err.is_storage_unavailable());
    assert!(repository.watch().await.unwrap_err().is_storage_unavailable());
}

#[tokio::test]
async fn failed_bulk_delete_still_announces_removed_ids() {
    let repository = WatchHistoryRepository::new(Box::new(PoisonedStore::new("stuck"))).unwrap();
    repository.save(item("a", 1)).await.unwrap();
    repository.save(item("b", 2)).await.unwrap();
    let (_subscription, mut rx) = subscribe_ids(&repository).await;
    assert_eq!(next(&mut rx).await, ["b", "a"]);

    let err = repository
        .delete_multiple(&["a".to_string(), "stuck".to_string(), "b".to_string()])
        .await
        .unwrap_err();
    assert!(err.is_storage_unavailable());

    assert_eq!(next(&mut rx).await, ["b"]);
    assert_eq!(ids(&repository.fetch_all().await.unwrap()), ["b"]);
}
