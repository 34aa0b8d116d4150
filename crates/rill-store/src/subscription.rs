//! Subscription runtime
//!
//! Per-stream and all-stream subscriptions bridge live head notifications
//! with catch-up reads. Each subscription runs one task that drains façade
//! pages until quiescent, then parks on the notifier. Backpressure comes
//! from awaiting the handler: the next message is not delivered until the
//! current callback returns. Because draining goes through the read façade,
//! delivered messages already respect gap reconciliation and expiry
//! filtering.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use rill_storage::{Message, StreamId, StreamStorage};

use crate::error::{BoxDynError, StoreError, SubscriptionDroppedReason};
use crate::store::{self, StoreInner, StreamStore};

/// Page size used while draining
const CATCH_UP_PAGE_SIZE: usize = 100;

/// What the runtime should do after a delivered message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// Deliver the next message
    Continue,
    /// Stop the subscription; it drops with reason `Disposed`
    Stop,
}

/// Receives subscription callbacks
///
/// `message_received` is awaited before the next message is delivered, which
/// is the runtime's only backpressure mechanism. An error return drops the
/// subscription with reason `SubscriberError`.
#[async_trait]
pub trait SubscriptionHandler: Send + Sync + 'static {
    /// A message was delivered
    async fn message_received(&self, message: Message) -> Result<HandlerOutcome, BoxDynError>;

    /// The subscription entered (`false`) or left (`true`) a draining read.
    /// Invoked on edge changes only.
    async fn caught_up(&self, caught_up: bool) {
        let _ = caught_up;
    }

    /// The subscription terminated. Invoked exactly once.
    async fn dropped(&self, reason: SubscriptionDroppedReason, error: Option<StoreError>) {
        let _ = (reason, error);
    }
}

/// Handle to a running all-stream subscription
///
/// Dropping the handle unsubscribes.
pub struct AllSubscription {
    name: String,
    token: CancellationToken,
    last_position: watch::Receiver<Option<i64>>,
}

impl AllSubscription {
    /// The subscription's name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Position of the most recently delivered message
    pub fn last_position(&self) -> Option<i64> {
        *self.last_position.borrow()
    }

    /// Stop the subscription. Non-blocking and idempotent; the handler's
    /// `dropped` callback fires once the task winds down.
    pub fn unsubscribe(&self) {
        self.token.cancel();
    }
}

impl Drop for AllSubscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Handle to a running single-stream subscription
///
/// Dropping the handle unsubscribes.
pub struct StreamSubscription {
    name: String,
    stream_id: StreamId,
    token: CancellationToken,
    last_version: watch::Receiver<Option<u32>>,
}

impl StreamSubscription {
    /// The subscription's name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The stream this subscription follows
    pub fn stream_id(&self) -> &StreamId {
        &self.stream_id
    }

    /// Version of the most recently delivered message
    pub fn last_version(&self) -> Option<u32> {
        *self.last_version.borrow()
    }

    /// Stop the subscription. Non-blocking and idempotent; the handler's
    /// `dropped` callback fires once the task winds down.
    pub fn unsubscribe(&self) {
        self.token.cancel();
    }
}

impl Drop for StreamSubscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

enum Exit {
    Disposed,
    Storage(StoreError),
    Subscriber(BoxDynError),
}

fn exit_from(error: StoreError) -> Exit {
    match error {
        StoreError::Disposed | StoreError::Cancelled => Exit::Disposed,
        other => Exit::Storage(other),
    }
}

pub(crate) fn spawn_all_subscription<S: StreamStorage, H: SubscriptionHandler>(
    inner: &Arc<StoreInner<S>>,
    continue_after_position: Option<i64>,
    handler: H,
    prefetch: bool,
    name: Option<String>,
) -> AllSubscription {
    let name = name.unwrap_or_else(|| format!("all-subscription-{}", Uuid::new_v4()));
    let token = inner.root_token.child_token();
    let (last_tx, last_rx) = watch::channel(None);
    let handler = Arc::new(handler);
    let weak = Arc::downgrade(inner);
    let log_name = inner.log_name.clone();

    info!(store = %log_name, subscription = %name, "starting all-stream subscription");
    tokio::spawn({
        let token = token.clone();
        let name = name.clone();
        async move {
            let exit = drive_all(
                &weak,
                continue_after_position,
                handler.as_ref(),
                prefetch,
                &token,
                &last_tx,
            )
            .await;
            finish(handler.as_ref(), exit, &name, &log_name).await;
        }
    });

    AllSubscription {
        name,
        token,
        last_position: last_rx,
    }
}

pub(crate) fn spawn_stream_subscription<S: StreamStorage, H: SubscriptionHandler>(
    inner: &Arc<StoreInner<S>>,
    stream_id: StreamId,
    continue_after_version: Option<i32>,
    handler: H,
    prefetch: bool,
    name: Option<String>,
) -> StreamSubscription {
    let name = name.unwrap_or_else(|| format!("subscription-{}", Uuid::new_v4()));
    let token = inner.root_token.child_token();
    let (last_tx, last_rx) = watch::channel(None);
    let handler = Arc::new(handler);
    let weak = Arc::downgrade(inner);
    let log_name = inner.log_name.clone();

    info!(store = %log_name, subscription = %name, stream = %stream_id, "starting stream subscription");
    tokio::spawn({
        let token = token.clone();
        let name = name.clone();
        let stream_id = stream_id.clone();
        async move {
            let exit = drive_stream(
                &weak,
                stream_id,
                continue_after_version,
                handler.as_ref(),
                prefetch,
                &token,
                &last_tx,
            )
            .await;
            finish(handler.as_ref(), exit, &name, &log_name).await;
        }
    });

    StreamSubscription {
        name,
        stream_id,
        token,
        last_version: last_rx,
    }
}

/// Report the terminal state. Runs exactly once per subscription.
async fn finish<H: SubscriptionHandler>(handler: &H, exit: Exit, name: &str, log_name: &str) {
    match exit {
        Exit::Disposed => {
            debug!(store = %log_name, subscription = %name, "subscription disposed");
            handler
                .dropped(SubscriptionDroppedReason::Disposed, None)
                .await;
        }
        Exit::Storage(err) => {
            error!(store = %log_name, subscription = %name, error = %err, "subscription dropped on storage error");
            handler
                .dropped(SubscriptionDroppedReason::StorageError, Some(err))
                .await;
        }
        Exit::Subscriber(err) => {
            warn!(store = %log_name, subscription = %name, error = %err, "subscription dropped by subscriber error");
            handler
                .dropped(
                    SubscriptionDroppedReason::SubscriberError,
                    Some(StoreError::Subscriber(err)),
                )
                .await;
        }
    }
}

async fn drive_all<S: StreamStorage, H: SubscriptionHandler>(
    weak: &Weak<StoreInner<S>>,
    continue_after_position: Option<i64>,
    handler: &H,
    prefetch: bool,
    token: &CancellationToken,
    last_delivered: &watch::Sender<Option<i64>>,
) -> Exit {
    // Subscribe to notifications before catch-up begins so appends during
    // the drain are not missed
    let (mut notifications, mut page) = {
        let Some(inner) = weak.upgrade() else {
            return Exit::Disposed;
        };
        let notifications = inner.notifier().subscribe();
        let start = match continue_after_position {
            Some(position) => position + 1,
            None => {
                let store = StreamStore::from_inner(inner.clone());
                match store.read_head_position(token).await {
                    Ok(head) => head + 1,
                    Err(error) => return exit_from(error),
                }
            }
        };
        let page = store::seed_all_page(&inner, start, CATCH_UP_PAGE_SIZE, prefetch);
        (notifications, page)
    };

    let mut signalled: Option<bool> = None;
    loop {
        if signalled != Some(false) {
            handler.caught_up(false).await;
            signalled = Some(false);
        }

        // Drain: chase continuations until a terminal page delivers nothing
        loop {
            page = match page.read_next(token).await {
                Ok(next) => next,
                Err(error) => return exit_from(error),
            };
            let mut delivered = 0usize;
            for message in std::mem::take(&mut page.messages) {
                if token.is_cancelled() {
                    return Exit::Disposed;
                }
                let position = message.position;
                match handler.message_received(message).await {
                    Ok(HandlerOutcome::Continue) => {
                        delivered += 1;
                        let _ = last_delivered.send(Some(position));
                    }
                    Ok(HandlerOutcome::Stop) => return Exit::Disposed,
                    Err(error) => return Exit::Subscriber(error),
                }
            }
            if page.is_end && delivered == 0 {
                break;
            }
        }

        if signalled != Some(true) {
            handler.caught_up(true).await;
            signalled = Some(true);
        }

        tokio::select! {
            biased;
            _ = token.cancelled() => return Exit::Disposed,
            received = notifications.recv() => match received {
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    debug!(missed, "subscription lagged behind head notifications, draining");
                }
                Err(broadcast::error::RecvError::Closed) => return Exit::Disposed,
            }
        }
    }
}

async fn drive_stream<S: StreamStorage, H: SubscriptionHandler>(
    weak: &Weak<StoreInner<S>>,
    stream_id: StreamId,
    continue_after_version: Option<i32>,
    handler: &H,
    prefetch: bool,
    token: &CancellationToken,
    last_delivered: &watch::Sender<Option<u32>>,
) -> Exit {
    let (mut notifications, mut page) = {
        let Some(inner) = weak.upgrade() else {
            return Exit::Disposed;
        };
        let notifications = inner.notifier().subscribe();
        let start = match continue_after_version {
            Some(version) => version + 1,
            None => {
                // The stream's current end; a missing stream reports -1 so
                // the subscription starts at version 0 once it appears
                let store = StreamStore::from_inner(inner.clone());
                match store
                    .read_stream_backwards(&stream_id, -1, 1, false, token)
                    .await
                {
                    Ok(tail) => tail.last_version + 1,
                    Err(error) => return exit_from(error),
                }
            }
        };
        let page =
            store::seed_stream_page(&inner, stream_id.clone(), start, CATCH_UP_PAGE_SIZE, prefetch);
        (notifications, page)
    };

    let mut signalled: Option<bool> = None;
    loop {
        if signalled != Some(false) {
            handler.caught_up(false).await;
            signalled = Some(false);
        }

        loop {
            page = match page.read_next(token).await {
                Ok(next) => next,
                Err(error) => return exit_from(error),
            };
            let mut delivered = 0usize;
            for message in std::mem::take(&mut page.messages) {
                if token.is_cancelled() {
                    return Exit::Disposed;
                }
                let version = message.stream_version;
                match handler.message_received(message).await {
                    Ok(HandlerOutcome::Continue) => {
                        delivered += 1;
                        let _ = last_delivered.send(Some(version));
                    }
                    Ok(HandlerOutcome::Stop) => return Exit::Disposed,
                    Err(error) => return Exit::Subscriber(error),
                }
            }
            if page.is_end && delivered == 0 {
                break;
            }
        }

        if signalled != Some(true) {
            handler.caught_up(true).await;
            signalled = Some(true);
        }

        tokio::select! {
            biased;
            _ = token.cancelled() => return Exit::Disposed,
            received = notifications.recv() => match received {
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    debug!(missed, "subscription lagged behind head notifications, draining");
                }
                Err(broadcast::error::RecvError::Closed) => return Exit::Disposed,
            }
        }
    }
}
