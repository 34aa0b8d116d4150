//! Core stream store types

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::engine::StorageResult;

/// Well-known stream that accumulates tombstones for deleted streams and
/// messages. The only `$`-prefixed stream whose metadata clients may read.
pub const DELETED_STREAM_ID: &str = "$deleted";

/// Stream id type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamId(String);

impl StreamId {
    /// Create a new stream id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is a system stream (`$`-prefixed).
    ///
    /// System streams are exempt from metadata and retention processing.
    /// The leading-`$` convention must be preserved bit-exactly for
    /// compatibility with existing data.
    pub fn is_system(&self) -> bool {
        self.0.starts_with('$')
    }

    /// Whether this is the well-known deleted-stream id
    pub fn is_deleted_stream(&self) -> bool {
        self.0 == DELETED_STREAM_ID
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for StreamId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for StreamId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Read direction for stream and all-stream reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadDirection {
    /// Ascending positions / versions
    Forward,
    /// Descending positions / versions
    Backward,
}

/// Loader for message payloads that were not prefetched
///
/// Engines hand these out when a read is issued with `prefetch = false` so
/// the JSON body can be materialised on demand.
#[async_trait::async_trait]
pub trait PayloadLoader: Send + Sync + 'static {
    /// Fetch the JSON payload. Returns `None` if the message has since been
    /// purged or deleted.
    async fn load(&self) -> StorageResult<Option<String>>;
}

/// Message payload, either materialised at read time or fetched on demand
#[derive(Clone)]
pub enum MessagePayload {
    /// Payload was prefetched with the page
    Inline(Option<String>),
    /// Payload is fetched from the engine on first access
    Deferred {
        /// Engine-supplied loader
        loader: Arc<dyn PayloadLoader>,
        /// Memoised result of the first load
        cell: Arc<OnceCell<Option<String>>>,
    },
}

impl MessagePayload {
    /// Create a deferred payload backed by the given loader
    pub fn deferred(loader: Arc<dyn PayloadLoader>) -> Self {
        Self::Deferred {
            loader,
            cell: Arc::new(OnceCell::new()),
        }
    }
}

impl fmt::Debug for MessagePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inline(data) => f
                .debug_tuple("Inline")
                .field(&data.as_ref().map(String::len))
                .finish(),
            Self::Deferred { .. } => f.write_str("Deferred"),
        }
    }
}

/// A single immutable message in the store
#[derive(Debug, Clone)]
pub struct Message {
    /// Stream this message belongs to
    pub stream_id: StreamId,
    /// Dense per-stream ordinal, starting at 0
    pub stream_version: u32,
    /// Global commit position; monotonically increasing, not dense
    pub position: i64,
    /// Client-assigned message id
    pub message_id: Uuid,
    /// Message type discriminator
    pub message_type: String,
    /// Commit timestamp
    pub created_utc: DateTime<Utc>,
    /// JSON metadata, always materialised
    pub json_metadata: Option<String>,
    /// JSON body, possibly deferred
    pub payload: MessagePayload,
}

impl Message {
    /// Get the JSON body, fetching it from the engine on first access if the
    /// message was read without prefetch.
    pub async fn json_data(&self) -> StorageResult<Option<String>> {
        match &self.payload {
            MessagePayload::Inline(data) => Ok(data.clone()),
            MessagePayload::Deferred { loader, cell } => Ok(cell
                .get_or_try_init(|| async { loader.load().await })
                .await?
                .clone()),
        }
    }
}

/// Per-stream retention metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamMetadataResult {
    /// Stream the metadata applies to
    pub stream_id: StreamId,
    /// Version of the metadata stream this was read at
    pub metadata_stream_version: i32,
    /// Maximum message age in seconds, if set
    pub max_age: Option<u32>,
    /// Maximum message count, if set (not enforced by the read layer)
    pub max_count: Option<u32>,
    /// Raw metadata JSON
    pub metadata_json: Option<String>,
}

/// Whether a stream read found the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamReadStatus {
    /// The stream exists
    Found,
    /// The stream does not exist (never created, or deleted)
    NotFound,
}

/// Raw result of an all-stream read
///
/// Cursor conventions: `next_position` is the position to continue from, or
/// `-1` when the read reached the end in its direction.
#[derive(Debug, Clone)]
pub struct AllReadResult {
    /// Position the read started from
    pub from_position: i64,
    /// Continuation cursor, `-1` at the end
    pub next_position: i64,
    /// Whether the read reached the end of the all-stream
    pub is_end: bool,
    /// Messages in read order
    pub messages: Vec<Message>,
}

/// Raw result of a single-stream read
#[derive(Debug, Clone)]
pub struct StreamReadResult {
    /// Whether the stream exists
    pub status: StreamReadStatus,
    /// Version the read started from
    pub from_version: i32,
    /// Continuation cursor, `-1` at the end
    pub next_version: i32,
    /// Current last version of the stream, `-1` if not found
    pub last_version: i32,
    /// Global position of the stream's last message, `-1` if not found
    pub last_position: i64,
    /// Whether the read reached the end of the stream
    pub is_end: bool,
    /// Messages in read order
    pub messages: Vec<Message>,
}

impl StreamReadResult {
    /// A not-found result echoing the requested cursor
    pub fn not_found(from_version: i32) -> Self {
        Self {
            status: StreamReadStatus::NotFound,
            from_version,
            next_version: -1,
            last_version: -1,
            last_position: -1,
            is_end: true,
            messages: Vec::new(),
        }
    }
}
