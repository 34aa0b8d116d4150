//! End-to-end read-path tests against the in-memory engine

mod common;

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use common::{append, new_store};
use rill_storage::StreamId;
use rill_storage_memory::NewMessage;
use rill_store::{MessagePayload, StoreError};

#[tokio::test]
async fn dense_all_read_returns_everything_at_once() {
    let harness = new_store();
    append(&harness.storage, "s", 3).await;
    let token = CancellationToken::new();

    let started = Instant::now();
    let page = harness
        .store
        .read_all_forwards(0, 10, true, &token)
        .await
        .unwrap();

    let positions: Vec<i64> = page.messages.iter().map(|m| m.position).collect();
    assert_eq!(positions, vec![0, 1, 2]);
    assert!(page.is_end);
    // No reconciliation pass ran
    assert!(started.elapsed() < Duration::from_millis(50));
}

#[tokio::test]
async fn permanent_gap_costs_one_reload_interval() {
    let harness = new_store();
    append(&harness.storage, "s", 1).await;
    harness.storage.skip_positions(1).await;
    append(&harness.storage, "s", 2).await;
    let token = CancellationToken::new();

    let started = Instant::now();
    let page = harness
        .store
        .read_all_forwards(0, 10, true, &token)
        .await
        .unwrap();

    let positions: Vec<i64> = page.messages.iter().map(|m| m.position).collect();
    assert_eq!(positions, vec![0, 2, 3]);
    assert!(page.is_end);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(50));
    assert!(elapsed < Duration::from_millis(150));
}

#[tokio::test]
async fn transient_gap_resolves_to_the_committed_message() {
    let harness = new_store();
    append(&harness.storage, "s", 1).await;
    harness.storage.skip_positions(1).await;
    append(&harness.storage, "s", 1).await;
    let token = CancellationToken::new();

    let storage = harness.storage.clone();
    let fill = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        storage
            .append_at_position(&StreamId::new("late"), 1, NewMessage::new("test", "{}"))
            .await
            .unwrap();
    });

    let page = harness
        .store
        .read_all_forwards(0, 10, true, &token)
        .await
        .unwrap();
    fill.await.unwrap();

    let positions: Vec<i64> = page.messages.iter().map(|m| m.position).collect();
    assert_eq!(positions, vec![0, 1, 2]);
}

#[tokio::test]
async fn expired_messages_are_filtered_and_purged() {
    let harness = new_store();
    let token = CancellationToken::new();
    let stream = StreamId::new("retained");

    harness
        .storage
        .set_stream_metadata(&stream, Some(10), None, None)
        .await
        .unwrap();

    append(&harness.storage, "retained", 1).await;
    harness.clock.advance_secs(5);
    append(&harness.storage, "retained", 1).await;
    harness.clock.advance_secs(10);
    append(&harness.storage, "retained", 1).await;
    harness.clock.advance_secs(5);

    let page = harness
        .store
        .read_stream_forwards(&stream, 0, 10, true, &token)
        .await
        .unwrap();

    // Only the t=15 message is younger than 10s at t=20
    assert_eq!(page.messages.len(), 1);
    assert_eq!(page.messages[0].stream_version, 2);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(harness.storage.purged_messages().await.len(), 2);
}

#[tokio::test]
async fn fully_expired_page_is_empty_but_not_end() {
    let harness = new_store();
    let token = CancellationToken::new();
    let stream = StreamId::new("retained");

    harness
        .storage
        .set_stream_metadata(&stream, Some(10), None, None)
        .await
        .unwrap();

    append(&harness.storage, "retained", 3).await;
    harness.clock.advance_secs(60);
    append(&harness.storage, "fresh", 2).await;

    // The first page covers only expired messages: it comes back empty with
    // is_end still false, and the cursor fields untouched
    let page = harness
        .store
        .read_all_forwards(0, 3, true, &token)
        .await
        .unwrap();
    assert!(page.messages.is_empty());
    assert!(!page.is_end);
    assert_eq!(page.next_position, 3);

    // Looping with read_next reaches the live messages
    let page = page.read_next(&token).await.unwrap();
    let streams: Vec<&str> = page
        .messages
        .iter()
        .map(|m| m.stream_id.as_str())
        .collect();
    assert_eq!(streams, vec!["fresh", "fresh"]);
    assert!(page.is_end);
}

#[tokio::test]
async fn all_read_round_trip_reverses() {
    let harness = new_store();
    append(&harness.storage, "a", 2).await;
    append(&harness.storage, "b", 2).await;
    let token = CancellationToken::new();

    let forwards = harness
        .store
        .read_all_forwards(0, 10, true, &token)
        .await
        .unwrap();
    let backwards = harness
        .store
        .read_all_backwards(-1, 10, true, &token)
        .await
        .unwrap();

    let forward_positions: Vec<i64> = forwards.messages.iter().map(|m| m.position).collect();
    let mut backward_positions: Vec<i64> = backwards.messages.iter().map(|m| m.position).collect();
    backward_positions.reverse();
    assert_eq!(forward_positions, backward_positions);
}

#[tokio::test]
async fn prefetch_false_defers_payloads() {
    let harness = new_store();
    append(&harness.storage, "s", 1).await;
    let token = CancellationToken::new();

    let page = harness
        .store
        .read_all_forwards(0, 10, false, &token)
        .await
        .unwrap();
    let message = &page.messages[0];
    assert!(matches!(message.payload, MessagePayload::Deferred { .. }));
    assert_eq!(
        message.json_data().await.unwrap(),
        Some("{\"i\":0}".to_string())
    );
}

#[tokio::test]
async fn head_position_tracks_appends() {
    let harness = new_store();
    let token = CancellationToken::new();

    assert_eq!(harness.store.read_head_position(&token).await.unwrap(), -1);
    append(&harness.storage, "s", 3).await;
    assert_eq!(harness.store.read_head_position(&token).await.unwrap(), 2);
}

#[tokio::test]
async fn stream_metadata_round_trips_through_the_store() {
    let harness = new_store();
    let token = CancellationToken::new();
    let stream = StreamId::new("s");

    harness
        .storage
        .set_stream_metadata(&stream, Some(30), Some(1000), Some("{\"owner\":\"ops\"}".into()))
        .await
        .unwrap();

    let metadata = harness
        .store
        .get_stream_metadata(&stream, &token)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(metadata.max_age, Some(30));
    assert_eq!(metadata.max_count, Some(1000));
    assert_eq!(metadata.metadata_json.as_deref(), Some("{\"owner\":\"ops\"}"));
}

#[tokio::test]
async fn dispose_is_observable_through_on_dispose() {
    let harness = new_store();
    let store = harness.store.clone();

    let waiter = tokio::spawn(async move { store.on_dispose().await });
    tokio::time::sleep(Duration::from_millis(10)).await;
    harness.store.dispose();

    tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .expect("on_dispose resolves after dispose")
        .unwrap();

    let token = CancellationToken::new();
    assert!(matches!(
        harness.store.read_all_forwards(0, 1, true, &token).await,
        Err(StoreError::Disposed)
    ));
}
