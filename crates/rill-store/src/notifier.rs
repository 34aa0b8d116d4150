//! Head-position notifier
//!
//! Converts the engine's pull-only head probe into a push-style "streams
//! updated" signal. A single background task polls the head position and
//! broadcasts an event whenever it advances. The poll loop retries
//! indefinitely through engine failures: a store that is temporarily
//! unreachable must not permanently silence subscribers.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use rill_storage::StreamStorage;

/// Bounded multicast capacity. Observers never block the publisher; a slow
/// observer sees `RecvError::Lagged` and must catch up by reading.
const CHANNEL_CAPACITY: usize = 128;

/// Notification that new messages have been committed
///
/// The per-stream counts are a hint only and may be empty; subscribers must
/// catch up by reading rather than trusting this map.
#[derive(Debug, Clone, Default)]
pub struct StreamsUpdated {
    /// Optional per-stream appended-message counts
    pub stream_hints: HashMap<String, u32>,
}

/// Polls the engine head position and multicasts updates
pub struct HeadNotifier {
    sender: broadcast::Sender<StreamsUpdated>,
    initialized: watch::Receiver<bool>,
}

impl HeadNotifier {
    /// Start the polling task. It runs until the token is cancelled.
    pub fn start<S: StreamStorage>(
        engine: S,
        poll_interval: Duration,
        token: CancellationToken,
        log_name: String,
    ) -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (init_tx, initialized) = watch::channel(false);

        tokio::spawn(poll_loop(
            engine,
            poll_interval,
            sender.clone(),
            init_tx,
            token,
            log_name,
        ));

        Self {
            sender,
            initialized,
        }
    }

    /// Subscribe to head-advanced notifications. Late subscribers do not see
    /// past events.
    pub fn subscribe(&self) -> broadcast::Receiver<StreamsUpdated> {
        self.sender.subscribe()
    }

    /// Wait until the first head read has completed.
    ///
    /// "Initialized" means exactly that: one successful poll has established
    /// the baseline head position. Returns immediately once true; returns
    /// without initializing if the notifier is cancelled first.
    pub async fn initialized(&self) {
        let mut rx = self.initialized.clone();
        while !*rx.borrow() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

async fn poll_loop<S: StreamStorage>(
    engine: S,
    poll_interval: Duration,
    sender: broadcast::Sender<StreamsUpdated>,
    init_tx: watch::Sender<bool>,
    token: CancellationToken,
    log_name: String,
) {
    let mut previous_head: i64 = -1;
    let mut primed = false;

    loop {
        // Reliably read the head: retry through engine failures until
        // cancelled
        let head = loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    debug!(store = %log_name, "head notifier stopped");
                    return;
                }
                result = engine.read_head_position() => match result {
                    Ok(head) => break head,
                    Err(err) => {
                        error!(store = %log_name, error = %err, "failed to read head position, retrying");
                        tokio::select! {
                            _ = token.cancelled() => {
                                debug!(store = %log_name, "head notifier stopped");
                                return;
                            }
                            () = tokio::time::sleep(poll_interval) => {}
                        }
                    }
                }
            }
        };

        if !primed {
            // Establish the baseline without emitting
            primed = true;
            previous_head = head;
            let _ = init_tx.send(true);
        } else if head > previous_head {
            debug!(
                store = %log_name,
                previous = previous_head,
                head,
                "head advanced, notifying subscribers"
            );
            previous_head = head;
            let _ = sender.send(StreamsUpdated::default());
        }

        tokio::select! {
            _ = token.cancelled() => {
                debug!(store = %log_name, "head notifier stopped");
                return;
            }
            () = tokio::time::sleep(poll_interval) => {}
        }
    }
}
