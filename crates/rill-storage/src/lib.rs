//! Storage engine contract for the rill stream store
//!
//! This crate provides the narrow interface the readonly store layer depends
//! on, without imposing implementation details on storage backends. An engine
//! assigns monotonically increasing 64-bit global positions on commit and
//! dense 32-bit per-stream versions; how it does so is its own business.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod clock;
pub mod engine;
pub mod types;

// Re-export the essential types
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{StorageError, StorageResult, StreamStorage};
pub use types::{
    AllReadResult, DELETED_STREAM_ID, Message, MessagePayload, PayloadLoader, ReadDirection,
    StreamId, StreamMetadataResult, StreamReadResult, StreamReadStatus,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
