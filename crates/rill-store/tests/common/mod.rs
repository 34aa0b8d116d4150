//! Shared helpers for store integration tests
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;

use rill_storage::{ManualClock, StreamId};
use rill_storage_memory::{ExpectedVersion, MemoryStreamStorage, NewMessage};
use rill_store::{
    BoxDynError, HandlerOutcome, Message, StoreError, StreamStore, StreamStoreConfig,
    SubscriptionDroppedReason, SubscriptionHandler,
};

pub const EVENT_TIMEOUT: Duration = Duration::from_secs(2);

pub struct TestStore {
    pub storage: MemoryStreamStorage,
    pub store: StreamStore<MemoryStreamStorage>,
    pub clock: ManualClock,
}

/// Opt-in log output for debugging test runs: RUST_LOG=debug cargo test
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

pub fn new_store() -> TestStore {
    init_tracing();
    let clock = ManualClock::new(Utc::now());
    let storage = MemoryStreamStorage::with_clock(Arc::new(clock.clone()));
    let store = StreamStore::with_config(
        storage.clone(),
        StreamStoreConfig {
            gap_reload_interval: Duration::from_millis(50),
            poll_interval: Duration::from_millis(20),
            clock: Arc::new(clock.clone()),
            log_name: "test-store".to_string(),
            ..Default::default()
        },
    );
    TestStore {
        storage,
        store,
        clock,
    }
}

pub async fn append(storage: &MemoryStreamStorage, stream: &str, count: usize) {
    storage
        .append_to_stream(
            &StreamId::new(stream),
            ExpectedVersion::Any,
            (0..count)
                .map(|i| NewMessage::new("test", format!("{{\"i\":{i}}}")))
                .collect(),
        )
        .await
        .unwrap();
}

/// What a recording handler observed, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observed {
    Message {
        stream: String,
        version: u32,
        position: i64,
    },
    CaughtUp(bool),
    Dropped(SubscriptionDroppedReason),
}

/// Handler that records every callback and can be told to misbehave
pub struct RecordingHandler {
    events: mpsc::UnboundedSender<Observed>,
    delivered: AtomicUsize,
    /// Return an error from this delivery (0-based) onward
    pub fail_at: Option<usize>,
    /// Return `Stop` from this delivery (0-based) onward
    pub stop_at: Option<usize>,
    /// Sleep this long inside each `message_received`
    pub delay: Duration,
}

impl RecordingHandler {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Observed>) {
        let (events, rx) = mpsc::unbounded_channel();
        (
            Self {
                events,
                delivered: AtomicUsize::new(0),
                fail_at: None,
                stop_at: None,
                delay: Duration::ZERO,
            },
            rx,
        )
    }
}

#[async_trait::async_trait]
impl SubscriptionHandler for RecordingHandler {
    async fn message_received(&self, message: Message) -> Result<HandlerOutcome, BoxDynError> {
        let index = self.delivered.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail_at.is_some_and(|at| index >= at) {
            return Err("handler refused the message".into());
        }
        let _ = self.events.send(Observed::Message {
            stream: message.stream_id.as_str().to_string(),
            version: message.stream_version,
            position: message.position,
        });
        if self.stop_at.is_some_and(|at| index >= at) {
            return Ok(HandlerOutcome::Stop);
        }
        Ok(HandlerOutcome::Continue)
    }

    async fn caught_up(&self, caught_up: bool) {
        let _ = self.events.send(Observed::CaughtUp(caught_up));
    }

    async fn dropped(&self, reason: SubscriptionDroppedReason, _error: Option<StoreError>) {
        let _ = self.events.send(Observed::Dropped(reason));
    }
}

/// Next observed event, failing the test after a timeout
pub async fn next_event(rx: &mut mpsc::UnboundedReceiver<Observed>) -> Observed {
    tokio::time::timeout(EVENT_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for a subscription event")
        .expect("event channel closed")
}

/// Collect the next `count` delivered messages, skipping caught-up edges
pub async fn next_messages(rx: &mut mpsc::UnboundedReceiver<Observed>, count: usize) -> Vec<Observed> {
    let mut messages = Vec::with_capacity(count);
    while messages.len() < count {
        match next_event(rx).await {
            Observed::CaughtUp(_) => {}
            observed @ Observed::Message { .. } => messages.push(observed),
            observed @ Observed::Dropped(_) => {
                panic!("subscription dropped while waiting for messages: {observed:?}")
            }
        }
    }
    messages
}

/// Assert that no further message or drop arrives within the given window
pub async fn assert_quiet(rx: &mut mpsc::UnboundedReceiver<Observed>, window: Duration) {
    let deadline = tokio::time::sleep(window);
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            () = &mut deadline => return,
            observed = rx.recv() => match observed {
                Some(Observed::CaughtUp(_)) => {}
                None => return,
                Some(other) => panic!("expected quiet subscription, observed {other:?}"),
            }
        }
    }
}
