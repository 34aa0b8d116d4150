//! Subscription runtime tests against the in-memory engine

mod common;

use std::time::{Duration, Instant};

use common::{Observed, RecordingHandler, append, assert_quiet, new_store, next_event, next_messages};
use rill_storage::StreamId;
use rill_store::SubscriptionDroppedReason;

/// Wait for the next non-caught-up event
async fn next_terminal(
    rx: &mut tokio::sync::mpsc::UnboundedReceiver<Observed>,
) -> Observed {
    loop {
        match next_event(rx).await {
            Observed::CaughtUp(_) => {}
            other => return other,
        }
    }
}

#[tokio::test]
async fn all_subscription_catches_up_then_follows_live() {
    let harness = new_store();
    append(&harness.storage, "s", 3).await;

    let (handler, mut rx) = RecordingHandler::new();
    let subscription = harness
        .store
        .subscribe_to_all(Some(-1), handler, true, Some("catch-up".into()))
        .unwrap();

    // Catch-up phase: caught_up(false), the history, caught_up(true)
    assert_eq!(next_event(&mut rx).await, Observed::CaughtUp(false));
    let history = next_messages(&mut rx, 3).await;
    let positions: Vec<i64> = history
        .iter()
        .map(|m| match m {
            Observed::Message { position, .. } => *position,
            other => panic!("unexpected event {other:?}"),
        })
        .collect();
    assert_eq!(positions, vec![0, 1, 2]);
    assert_eq!(next_event(&mut rx).await, Observed::CaughtUp(true));

    // Live phase: new appends arrive in order, exactly once
    append(&harness.storage, "s", 5).await;
    let live = next_messages(&mut rx, 5).await;
    let positions: Vec<i64> = live
        .iter()
        .map(|m| match m {
            Observed::Message { position, .. } => *position,
            other => panic!("unexpected event {other:?}"),
        })
        .collect();
    assert_eq!(positions, vec![3, 4, 5, 6, 7]);
    assert_quiet(&mut rx, Duration::from_millis(150)).await;

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(subscription.last_position(), Some(7));
}

#[tokio::test]
async fn subscribing_from_the_head_skips_history() {
    let harness = new_store();
    append(&harness.storage, "s", 3).await;

    let (handler, mut rx) = RecordingHandler::new();
    let _subscription = harness
        .store
        .subscribe_to_all(None, handler, true, None)
        .unwrap();

    assert_eq!(next_event(&mut rx).await, Observed::CaughtUp(false));
    assert_eq!(next_event(&mut rx).await, Observed::CaughtUp(true));

    append(&harness.storage, "s", 2).await;
    let live = next_messages(&mut rx, 2).await;
    assert_eq!(
        live,
        vec![
            Observed::Message {
                stream: "s".into(),
                version: 3,
                position: 3
            },
            Observed::Message {
                stream: "s".into(),
                version: 4,
                position: 4
            },
        ]
    );
}

#[tokio::test]
async fn stream_subscription_follows_a_single_stream() {
    let harness = new_store();
    append(&harness.storage, "a", 2).await;
    append(&harness.storage, "b", 3).await;
    append(&harness.storage, "a", 2).await;

    let (handler, mut rx) = RecordingHandler::new();
    let subscription = harness
        .store
        .subscribe_to_stream(StreamId::new("a"), Some(-1), handler, true, None)
        .unwrap();
    assert_eq!(subscription.stream_id().as_str(), "a");

    let history = next_messages(&mut rx, 4).await;
    for (index, observed) in history.iter().enumerate() {
        assert_eq!(
            *observed,
            Observed::Message {
                stream: "a".into(),
                version: index as u32,
                position: match index {
                    0 => 0,
                    1 => 1,
                    _ => index as i64 + 3,
                },
            }
        );
    }

    // Appends to other streams do not surface
    append(&harness.storage, "b", 1).await;
    assert_quiet(&mut rx, Duration::from_millis(150)).await;

    append(&harness.storage, "a", 1).await;
    let live = next_messages(&mut rx, 1).await;
    assert_eq!(
        live[0],
        Observed::Message {
            stream: "a".into(),
            version: 4,
            position: 8
        }
    );
}

#[tokio::test]
async fn delivery_is_ordered_across_many_pages() {
    let harness = new_store();
    append(&harness.storage, "s", 250).await;

    let (handler, mut rx) = RecordingHandler::new();
    let _subscription = harness
        .store
        .subscribe_to_all(Some(-1), handler, true, None)
        .unwrap();

    let delivered = next_messages(&mut rx, 250).await;
    let positions: Vec<i64> = delivered
        .iter()
        .map(|m| match m {
            Observed::Message { position, .. } => *position,
            other => panic!("unexpected event {other:?}"),
        })
        .collect();
    let expected: Vec<i64> = (0..250).collect();
    assert_eq!(positions, expected);
    assert_quiet(&mut rx, Duration::from_millis(150)).await;
}

#[tokio::test]
async fn handler_backpressure_serialises_delivery() {
    let harness = new_store();
    append(&harness.storage, "s", 5).await;

    let (mut handler, mut rx) = RecordingHandler::new();
    handler.delay = Duration::from_millis(10);
    let started = Instant::now();
    let _subscription = harness
        .store
        .subscribe_to_all(Some(-1), handler, true, None)
        .unwrap();

    next_messages(&mut rx, 5).await;
    // Five awaited 10ms callbacks cannot complete faster than serially
    assert!(started.elapsed() >= Duration::from_millis(50));
}

#[tokio::test]
async fn handler_error_drops_the_subscription_exactly_once() {
    let harness = new_store();
    append(&harness.storage, "s", 5).await;

    let (mut handler, mut rx) = RecordingHandler::new();
    handler.fail_at = Some(2);
    let _subscription = harness
        .store
        .subscribe_to_all(Some(-1), handler, true, None)
        .unwrap();

    let delivered = next_messages(&mut rx, 2).await;
    assert_eq!(delivered.len(), 2);
    assert_eq!(
        next_terminal(&mut rx).await,
        Observed::Dropped(SubscriptionDroppedReason::SubscriberError)
    );

    // Nothing is delivered after the drop; the handler is released and the
    // channel closes
    assert!(
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("channel closes after drop")
            .is_none()
    );
}

#[tokio::test]
async fn handler_stop_ends_the_subscription_gracefully() {
    let harness = new_store();
    append(&harness.storage, "s", 5).await;

    let (mut handler, mut rx) = RecordingHandler::new();
    handler.stop_at = Some(2);
    let _subscription = harness
        .store
        .subscribe_to_all(Some(-1), handler, true, None)
        .unwrap();

    let delivered = next_messages(&mut rx, 3).await;
    assert_eq!(delivered.len(), 3);
    assert_eq!(
        next_terminal(&mut rx).await,
        Observed::Dropped(SubscriptionDroppedReason::Disposed)
    );
}

#[tokio::test]
async fn disposing_the_store_mid_catchup_drops_exactly_once() {
    let harness = new_store();
    append(&harness.storage, "s", 200).await;

    let (mut handler, mut rx) = RecordingHandler::new();
    handler.delay = Duration::from_millis(5);
    let _subscription = harness
        .store
        .subscribe_to_all(Some(-1), handler, true, None)
        .unwrap();

    tokio::time::sleep(Duration::from_millis(30)).await;
    harness.store.dispose();

    let mut drops = 0;
    let mut messages_after_drop = 0;
    while let Ok(Some(observed)) =
        tokio::time::timeout(common::EVENT_TIMEOUT, rx.recv()).await
    {
        match observed {
            Observed::Dropped(reason) => {
                assert_eq!(reason, SubscriptionDroppedReason::Disposed);
                drops += 1;
            }
            Observed::Message { .. } if drops > 0 => messages_after_drop += 1,
            _ => {}
        }
    }
    assert_eq!(drops, 1);
    assert_eq!(messages_after_drop, 0);
}

#[tokio::test]
async fn disposing_the_store_drops_every_subscription() {
    let harness = new_store();
    append(&harness.storage, "s", 2).await;

    let (all_handler, mut all_rx) = RecordingHandler::new();
    let (stream_handler, mut stream_rx) = RecordingHandler::new();
    let _all = harness
        .store
        .subscribe_to_all(None, all_handler, true, None)
        .unwrap();
    let _stream = harness
        .store
        .subscribe_to_stream(StreamId::new("s"), None, stream_handler, true, None)
        .unwrap();

    // Let both reach the parked state
    assert_eq!(next_event(&mut all_rx).await, Observed::CaughtUp(false));
    assert_eq!(next_event(&mut all_rx).await, Observed::CaughtUp(true));
    assert_eq!(next_event(&mut stream_rx).await, Observed::CaughtUp(false));
    assert_eq!(next_event(&mut stream_rx).await, Observed::CaughtUp(true));

    harness.store.dispose();

    assert_eq!(
        next_terminal(&mut all_rx).await,
        Observed::Dropped(SubscriptionDroppedReason::Disposed)
    );
    assert_eq!(
        next_terminal(&mut stream_rx).await,
        Observed::Dropped(SubscriptionDroppedReason::Disposed)
    );
}

#[tokio::test]
async fn unsubscribe_is_idempotent() {
    let harness = new_store();

    let (handler, mut rx) = RecordingHandler::new();
    let subscription = harness
        .store
        .subscribe_to_all(None, handler, true, None)
        .unwrap();

    assert_eq!(next_event(&mut rx).await, Observed::CaughtUp(false));
    assert_eq!(next_event(&mut rx).await, Observed::CaughtUp(true));

    subscription.unsubscribe();
    subscription.unsubscribe();

    assert_eq!(
        next_terminal(&mut rx).await,
        Observed::Dropped(SubscriptionDroppedReason::Disposed)
    );
}

#[tokio::test]
async fn dropping_the_handle_unsubscribes() {
    let harness = new_store();

    let (handler, mut rx) = RecordingHandler::new();
    {
        let _subscription = harness
            .store
            .subscribe_to_all(None, handler, true, None)
            .unwrap();
        assert_eq!(next_event(&mut rx).await, Observed::CaughtUp(false));
        assert_eq!(next_event(&mut rx).await, Observed::CaughtUp(true));
    }

    assert_eq!(
        next_terminal(&mut rx).await,
        Observed::Dropped(SubscriptionDroppedReason::Disposed)
    );
}

#[tokio::test]
async fn subscription_to_a_missing_stream_waits_for_it() {
    let harness = new_store();

    let (handler, mut rx) = RecordingHandler::new();
    let _subscription = harness
        .store
        .subscribe_to_stream(StreamId::new("later"), None, handler, true, None)
        .unwrap();

    assert_eq!(next_event(&mut rx).await, Observed::CaughtUp(false));
    assert_eq!(next_event(&mut rx).await, Observed::CaughtUp(true));

    append(&harness.storage, "later", 2).await;
    let delivered = next_messages(&mut rx, 2).await;
    assert_eq!(
        delivered,
        vec![
            Observed::Message {
                stream: "later".into(),
                version: 0,
                position: 0
            },
            Observed::Message {
                stream: "later".into(),
                version: 1,
                position: 1
            },
        ]
    );
}

#[tokio::test]
async fn notifier_initializes_after_first_head_read() {
    let harness = new_store();
    tokio::time::timeout(Duration::from_secs(1), harness.store.notifier().initialized())
        .await
        .expect("notifier initializes");
}

#[tokio::test]
async fn expired_messages_never_reach_subscribers() {
    let harness = new_store();
    let stream = StreamId::new("retained");
    harness
        .storage
        .set_stream_metadata(&stream, Some(10), None, None)
        .await
        .unwrap();

    append(&harness.storage, "retained", 2).await;
    harness.clock.advance_secs(60);
    append(&harness.storage, "retained", 1).await;

    let (handler, mut rx) = RecordingHandler::new();
    let _subscription = harness
        .store
        .subscribe_to_all(Some(-1), handler, true, None)
        .unwrap();

    // Only the fresh message at version 2 is delivered
    let delivered = next_messages(&mut rx, 1).await;
    assert_eq!(
        delivered[0],
        Observed::Message {
            stream: "retained".into(),
            version: 2,
            position: 2
        }
    );
    assert_quiet(&mut rx, Duration::from_millis(150)).await;
}
