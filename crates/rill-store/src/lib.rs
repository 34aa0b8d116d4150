//! Readonly stream store base layer
//!
//! A read path and subscription runtime over a pluggable storage engine.
//! The engine assigns global positions and per-stream versions; this layer
//! adds the things readers need on top of raw pages:
//!
//! - gap-tolerant forward all-stream reads that distinguish in-flight from
//!   rolled-back writer transactions;
//! - a bounded, TTL-expiring cache of per-stream max-age metadata, used to
//!   filter expired messages out of results and request their purge;
//! - a polling head-position notifier that turns the engine's pull-only head
//!   probe into a push-style "streams updated" signal;
//! - per-stream and all-stream subscriptions that catch up through the read
//!   façade and then follow the live tail, with strict per-subscription
//!   ordering and handler-driven backpressure.
//!
//! Writes, durability and replication belong to the engine behind the
//! [`StreamStorage`] contract.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod error;
mod filter;
mod gap;
mod metadata_cache;
mod notifier;
mod store;
mod subscription;
mod util;

pub use config::StreamStoreConfig;
pub use error::{BoxDynError, StoreError, StoreResult, SubscriptionDroppedReason};
pub use notifier::{HeadNotifier, StreamsUpdated};
pub use store::{ReadAllPage, ReadStreamPage, StreamStore};
pub use subscription::{AllSubscription, HandlerOutcome, StreamSubscription, SubscriptionHandler};

// Data-model types from the storage contract, re-exported for convenience
pub use rill_storage::{
    Clock, DELETED_STREAM_ID, ManualClock, Message, MessagePayload, ReadDirection, StreamId,
    StreamMetadataResult, StreamReadStatus, StreamStorage, SystemClock,
};
