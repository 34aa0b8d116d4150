//! Per-stream max-age cache
//!
//! Metadata lookups dominate the cost of expiry filtering, so resolved
//! max-age values (including the "no metadata set" case) are cached with a
//! TTL and bounded size. Concurrent lookups for the same absent key coalesce
//! into a single engine load.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use lru::LruCache;
use tokio::sync::{Mutex, watch};

use rill_storage::{Clock, StorageResult, StreamId, StreamStorage};

enum Slot {
    Resolved {
        max_age: Option<u32>,
        cached_at: DateTime<Utc>,
    },
    /// A load is in flight; waiters watch for its completion and re-check
    Loading(watch::Receiver<bool>),
}

enum Action {
    Return(Option<u32>),
    Wait(watch::Receiver<bool>),
    Load(watch::Sender<bool>),
}

/// Cache of `stream_id -> max_age` with TTL expiry and LRU eviction
pub(crate) struct MaxAgeCache {
    slots: Mutex<LruCache<StreamId, Slot>>,
    expiry: chrono::Duration,
    clock: Arc<dyn Clock>,
}

impl MaxAgeCache {
    pub(crate) fn new(max_size: usize, expiry: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            slots: Mutex::new(LruCache::new(
                NonZeroUsize::new(max_size.max(1)).unwrap(),
            )),
            expiry: chrono::Duration::from_std(expiry).unwrap_or(chrono::Duration::MAX),
            clock,
        }
    }

    /// Get the max age for a stream, loading it through the engine on a miss.
    ///
    /// A cached `None` means "no metadata set" and is served without
    /// refetching until the TTL lapses.
    pub(crate) async fn max_age<S: StreamStorage>(
        &self,
        engine: &S,
        stream_id: &StreamId,
    ) -> StorageResult<Option<u32>> {
        loop {
            let action = {
                let mut slots = self.slots.lock().await;
                match slots.get(stream_id) {
                    Some(Slot::Resolved { max_age, cached_at })
                        if self.clock.utc_now() - *cached_at < self.expiry =>
                    {
                        Action::Return(*max_age)
                    }
                    // A dead sender means the loading task was cancelled
                    // mid-load; take the load over
                    Some(Slot::Loading(rx)) if rx.has_changed().is_ok() => {
                        Action::Wait(rx.clone())
                    }
                    _ => {
                        let (tx, rx) = watch::channel(false);
                        slots.put(stream_id.clone(), Slot::Loading(rx));
                        Action::Load(tx)
                    }
                }
            };

            match action {
                Action::Return(max_age) => return Ok(max_age),
                Action::Wait(mut rx) => {
                    // Wakes when the loader finishes or gives up; either way
                    // re-check the slot
                    let _ = rx.changed().await;
                }
                Action::Load(tx) => {
                    let result = engine.stream_metadata(stream_id).await;
                    let mut slots = self.slots.lock().await;
                    let outcome = match result {
                        Ok(metadata) => {
                            let max_age = metadata.and_then(|m| m.max_age);
                            slots.put(
                                stream_id.clone(),
                                Slot::Resolved {
                                    max_age,
                                    cached_at: self.clock.utc_now(),
                                },
                            );
                            Ok(max_age)
                        }
                        Err(error) => {
                            // Clear the slot so waiters retry the load
                            slots.pop(stream_id);
                            Err(error)
                        }
                    };
                    drop(slots);
                    let _ = tx.send(true);
                    return outcome;
                }
            }
        }
    }
}
