//! Integration tests for load queue scheduling: concurrency, ordering,
//! stop-on-error, cancellation and removal.

mod common;

use std::sync::Arc;

use common::{gated_queue, items, lines, position, record, settle_briefly, wait_for_state};
use lq_core::scheduler::EntryState;
use lq_core::{EventKind, LoadError, LoadItem, QueueConfig, QueueEvent};
use parking_lot::Mutex;

fn config(max_connections: usize) -> QueueConfig {
    QueueConfig {
        max_connections,
        ..QueueConfig::default()
    }
}

#[tokio::test]
async fn test_concurrency_limit_is_never_exceeded() {
    let (queue, loader) = gated_queue(config(2));
    queue
        .load_manifest(items(&["a", "b", "c", "d", "e"]), true)
        .unwrap();

    loader.wait_started(2).await;
    settle_briefly().await;
    assert_eq!(loader.started(), vec!["a", "b"]);
    assert_eq!(queue.snapshot().await.unwrap().in_flight, 2);

    for src in ["a", "b", "c", "d", "e"] {
        loader.release(src);
    }
    queue.wait_settled().await.unwrap();

    assert_eq!(loader.max_active(), 2);
    let snap = queue.snapshot().await.unwrap();
    assert_eq!(snap.count(EntryState::Loaded), 5);
    assert_eq!(snap.in_flight, 0);
}

#[tokio::test]
async fn test_single_connection_starts_in_insertion_order() {
    let (queue, loader) = gated_queue(config(1));
    let log = record(&queue);
    queue.load_manifest(items(&["a", "b", "c"]), true).unwrap();

    loader.wait_started(1).await;
    settle_briefly().await;
    assert_eq!(loader.started(), vec!["a"]);

    loader.release("a");
    loader.wait_started(2).await;
    loader.release("b");
    loader.wait_started(3).await;
    loader.release("c");
    queue.wait_settled().await.unwrap();

    assert_eq!(loader.started(), vec!["a", "b", "c"]);
    assert_eq!(loader.max_active(), 1);
    assert_eq!(
        lines(&log),
        vec![
            "loadstart", "start:a", "load:a", "start:b", "load:b", "start:c", "load:c", "complete"
        ]
    );
}

#[tokio::test]
async fn test_strict_order_holds_later_results() {
    let (queue, loader) = gated_queue(config(2));
    let log = record(&queue);
    queue
        .load_manifest(
            [
                LoadItem::new("a").with_maintain_order(true),
                LoadItem::new("b").with_maintain_order(true),
            ],
            true,
        )
        .unwrap();
    loader.wait_started(2).await;

    loader.release("b");
    wait_for_state(&queue, "b", EntryState::Loaded).await;
    assert_eq!(position(&log, "load:b"), None, "b reported before a");

    loader.release("a");
    queue.wait_settled().await.unwrap();

    let a = position(&log, "load:a").unwrap();
    let b = position(&log, "load:b").unwrap();
    assert!(a < b);
    assert_eq!(loader.finished(), vec!["b", "a"]);
    assert_eq!(lines(&log).last().map(String::as_str), Some("complete"));
}

#[tokio::test]
async fn test_scripts_keep_order_by_default() {
    let (queue, loader) = gated_queue(config(2));
    let log = record(&queue);
    queue
        .load_manifest(items(&["one.js", "two.js"]), true)
        .unwrap();
    loader.wait_started(2).await;

    loader.release("two.js");
    wait_for_state(&queue, "two.js", EntryState::Loaded).await;
    assert_eq!(position(&log, "load:two.js"), None);

    loader.release("one.js");
    queue.wait_settled().await.unwrap();
    assert!(position(&log, "load:one.js") < position(&log, "load:two.js"));
}

#[tokio::test]
async fn test_unordered_items_report_as_they_finish() {
    let (queue, loader) = gated_queue(config(2));
    let log = record(&queue);
    queue.load_manifest(items(&["a.txt", "b.txt"]), true).unwrap();
    loader.wait_started(2).await;

    loader.release("b.txt");
    wait_for_state(&queue, "b.txt", EntryState::Loaded).await;
    assert!(position(&log, "load:b.txt").is_some());

    loader.release("a.txt");
    queue.wait_settled().await.unwrap();
    assert!(position(&log, "load:b.txt") < position(&log, "load:a.txt"));
}

#[tokio::test]
async fn test_ordered_error_is_held_too() {
    let (queue, loader) = gated_queue(config(2));
    let log = record(&queue);
    loader.fail("b.js");
    queue.load_manifest(items(&["a.js", "b.js"]), true).unwrap();
    loader.wait_started(2).await;

    loader.release("b.js");
    wait_for_state(&queue, "b.js", EntryState::Error).await;
    assert_eq!(position(&log, "error:b.js"), None);

    loader.release("a.js");
    queue.wait_settled().await.unwrap();
    assert!(position(&log, "load:a.js") < position(&log, "error:b.js"));
}

#[tokio::test]
async fn test_stop_on_error_halts_and_resumes() {
    let (queue, loader) = gated_queue(QueueConfig {
        max_connections: 2,
        stop_on_error: true,
        ..QueueConfig::default()
    });
    let log = record(&queue);
    loader.fail("a");
    queue.load_manifest(items(&["a", "b", "c"]), true).unwrap();
    loader.wait_started(2).await;

    loader.release("a");
    wait_for_state(&queue, "a", EntryState::Error).await;
    loader.release("b");
    queue.wait_settled().await.unwrap();

    let snap = queue.snapshot().await.unwrap();
    assert!(snap.halted);
    assert_eq!(snap.state_of("b"), Some(EntryState::Loaded));
    assert_eq!(snap.state_of("c"), Some(EntryState::Pending));
    assert_eq!(loader.started(), vec!["a", "b"]);
    assert_eq!(position(&log, "complete"), None);
    assert!(position(&log, "error:a").is_some());

    queue.load().unwrap();
    loader.wait_started(3).await;
    loader.release("c");
    queue.wait_settled().await.unwrap();

    let snap = queue.snapshot().await.unwrap();
    assert!(!snap.halted);
    assert_eq!(snap.state_of("c"), Some(EntryState::Loaded));
    assert!(position(&log, "complete").is_some());
}

#[tokio::test]
async fn test_errors_do_not_halt_by_default() {
    let (queue, loader) = gated_queue(config(1));
    let log = record(&queue);
    loader.fail("a");
    loader.release("a");
    loader.release("b");
    queue.load_manifest(items(&["a", "b"]), true).unwrap();
    queue.wait_settled().await.unwrap();

    assert_eq!(
        lines(&log),
        vec!["loadstart", "start:a", "error:a", "start:b", "load:b", "complete"]
    );
}

#[tokio::test]
async fn test_remove_all_is_silent() {
    let (queue, loader) = gated_queue(config(1));
    let log = record(&queue);
    queue.load_manifest(items(&["a", "b", "c"]), true).unwrap();
    loader.wait_started(1).await;

    queue.remove_all().unwrap();
    let snap = queue.snapshot().await.unwrap();
    let before = lines(&log).len();

    for src in ["a", "b", "c"] {
        loader.release(src);
    }
    settle_briefly().await;

    assert_eq!(snap.total, 0);
    assert_eq!(snap.in_flight, 0);
    assert_eq!(lines(&log).len(), before);
    assert_eq!(position(&log, "complete"), None);
    assert_eq!(loader.started(), vec!["a"]);
}

#[tokio::test]
async fn test_cancel_is_idempotent_and_silent() {
    let (queue, loader) = gated_queue(config(1));
    let log = record(&queue);
    queue.load_manifest(items(&["a", "b"]), true).unwrap();
    loader.wait_started(1).await;

    queue.cancel("a").unwrap();
    queue.cancel("a").unwrap();
    loader.wait_started(2).await;
    loader.release("a");
    loader.release("b");
    queue.wait_settled().await.unwrap();

    let snap = queue.snapshot().await.unwrap();
    assert_eq!(snap.state_of("a"), Some(EntryState::Canceled));
    assert_eq!(snap.state_of("b"), Some(EntryState::Loaded));
    assert_eq!(snap.progress, 1.0);
    assert_eq!(position(&log, "error:a"), None);
    assert_eq!(position(&log, "load:a"), None);
    assert_eq!(
        lines(&log).iter().filter(|l| *l == "complete").count(),
        1
    );
    assert!(queue.get_result("a").await.unwrap().is_none());
}

#[tokio::test]
async fn test_cancel_pending_entry_never_starts_it() {
    let (queue, loader) = gated_queue(config(1));
    queue.load_manifest(items(&["a", "b", "c"]), true).unwrap();
    loader.wait_started(1).await;

    queue.cancel("b").unwrap();
    loader.release("a");
    loader.wait_started(2).await;
    loader.release("c");
    queue.wait_settled().await.unwrap();

    assert_eq!(loader.started(), vec!["a", "c"]);
}

#[tokio::test]
async fn test_remove_in_flight_discards_late_result() {
    let (queue, loader) = gated_queue(config(1));
    let log = record(&queue);
    queue.load_manifest(items(&["a", "b"]), true).unwrap();
    loader.wait_started(1).await;

    queue.remove("a").unwrap();
    loader.wait_started(2).await;
    loader.release("a");
    loader.release("b");
    queue.wait_settled().await.unwrap();
    settle_briefly().await;

    let snap = queue.snapshot().await.unwrap();
    assert_eq!(snap.total, 1);
    assert!(queue.get_item("a").await.unwrap().is_none());
    assert_eq!(position(&log, "load:a"), None);
    assert!(position(&log, "complete").is_some());
}

#[tokio::test]
async fn test_result_is_none_until_loaded() {
    let (queue, loader) = gated_queue(config(1));
    queue.load_file(LoadItem::new("a"), true).unwrap();
    loader.wait_started(1).await;

    assert!(queue.get_result("a").await.unwrap().is_none());
    assert!(queue.get_item("a").await.unwrap().is_some());

    loader.release("a");
    queue.wait_settled().await.unwrap();
    let content = queue.get_result("a").await.unwrap().unwrap();
    assert_eq!(content.value().as_text(), Some("a"));
}

#[tokio::test]
async fn test_timeout_reports_error() {
    let (queue, _loader) = gated_queue(config(1));
    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&errors);
    queue.on(EventKind::Error, move |event| {
        if let QueueEvent::Error { error, .. } = event {
            sink.lock().push(matches!(**error, LoadError::Timeout(20)));
        }
    });

    queue
        .load_file(LoadItem::new("slow").with_timeout_ms(20), true)
        .unwrap();
    queue.wait_settled().await.unwrap();

    assert_eq!(*errors.lock(), vec![true]);
    let snap = queue.snapshot().await.unwrap();
    assert_eq!(snap.state_of("slow"), Some(EntryState::Error));
}

#[tokio::test]
async fn test_pause_stops_new_starts() {
    let (queue, loader) = gated_queue(config(1));
    queue.load_manifest(items(&["a", "b"]), true).unwrap();
    loader.wait_started(1).await;

    queue.set_paused(true).unwrap();
    loader.release("a");
    queue.wait_settled().await.unwrap();
    let snap = queue.snapshot().await.unwrap();
    assert_eq!(snap.state_of("a"), Some(EntryState::Loaded));
    assert_eq!(snap.state_of("b"), Some(EntryState::Pending));

    queue.set_paused(false).unwrap();
    loader.wait_started(2).await;
    loader.release("b");
    queue.wait_settled().await.unwrap();
    assert_eq!(
        queue.snapshot().await.unwrap().state_of("b"),
        Some(EntryState::Loaded)
    );
}

#[tokio::test]
async fn test_raising_limit_starts_more() {
    let (queue, loader) = gated_queue(config(1));
    queue.load_manifest(items(&["a", "b", "c"]), true).unwrap();
    loader.wait_started(1).await;

    queue.set_max_connections(3).unwrap();
    loader.wait_started(3).await;
    assert_eq!(loader.max_active(), 3);

    for src in ["a", "b", "c"] {
        loader.release(src);
    }
    queue.wait_settled().await.unwrap();
}

#[tokio::test]
async fn test_lowering_limit_only_stops_new_starts() {
    let (queue, loader) = gated_queue(config(3));
    queue.load_manifest(items(&["a", "b", "c", "d"]), true).unwrap();
    loader.wait_started(3).await;

    queue.set_max_connections(1).unwrap();
    let snap = queue.snapshot().await.unwrap();
    assert_eq!(snap.max_connections, 1);
    assert_eq!(snap.in_flight, 3);

    loader.release("a");
    wait_for_state(&queue, "a", EntryState::Loaded).await;
    loader.release("b");
    wait_for_state(&queue, "b", EntryState::Loaded).await;
    settle_briefly().await;
    assert_eq!(loader.started(), vec!["a", "b", "c"]);
    assert_eq!(queue.snapshot().await.unwrap().state_of("d"), Some(EntryState::Pending));

    loader.release("c");
    wait_for_state(&queue, "c", EntryState::Loaded).await;
    loader.wait_started(4).await;
    loader.release("d");
    queue.wait_settled().await.unwrap();

    let snap = queue.snapshot().await.unwrap();
    assert_eq!(snap.count(EntryState::Loaded), 4);
    assert_eq!(loader.max_active(), 3);
}

#[tokio::test]
async fn test_close_cancels_in_flight() {
    let (queue, loader) = gated_queue(config(2));
    queue.load_manifest(items(&["a", "b", "c"]), true).unwrap();
    loader.wait_started(2).await;

    queue.close().unwrap();
    queue.wait_settled().await.unwrap();

    let snap = queue.snapshot().await.unwrap();
    assert!(snap.paused);
    assert_eq!(snap.in_flight, 0);
    assert_eq!(snap.count(EntryState::Canceled), 2);
    assert_eq!(snap.state_of("c"), Some(EntryState::Pending));
}

#[tokio::test]
async fn test_once_listener_fires_once_across_cycles() {
    let (queue, loader) = gated_queue(config(1));
    let hits = Arc::new(Mutex::new(0));
    let sink = Arc::clone(&hits);
    queue.once(EventKind::Complete, move |_| *sink.lock() += 1);

    loader.release("a");
    queue.load_file(LoadItem::new("a"), true).unwrap();
    queue.wait_settled().await.unwrap();
    loader.release("b");
    queue.load_file(LoadItem::new("b"), true).unwrap();
    queue.wait_settled().await.unwrap();
    settle_briefly().await;

    assert_eq!(*hits.lock(), 1);
}

#[tokio::test]
async fn test_listener_can_drive_queue() {
    let (queue, loader) = gated_queue(config(1));
    let handle = queue.clone();
    queue.once(EventKind::FileLoad, move |_| {
        handle.load_file(LoadItem::new("follow-up"), true).unwrap();
    });

    loader.release("a");
    loader.release("follow-up");
    queue.load_file(LoadItem::new("a"), true).unwrap();
    loader.wait_started(2).await;
    queue.wait_settled().await.unwrap();

    let snap = queue.snapshot().await.unwrap();
    assert_eq!(snap.count(EntryState::Loaded), 2);
}
