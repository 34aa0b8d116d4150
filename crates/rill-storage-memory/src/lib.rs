//! In-memory stream storage engine
//!
//! Reference backend for the readonly store layer: a `BTreeMap` global log
//! plus per-stream version indexes behind an `RwLock`. Besides the readonly
//! contract it exposes the write surface needed to exercise the read path
//! (appends with optimistic concurrency, metadata, deletes) and helpers that
//! simulate writer transactions that rolled back or are still in flight,
//! which is how position gaps arise in real engines.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use rill_storage::{
    AllReadResult, Clock, DELETED_STREAM_ID, Message, MessagePayload, PayloadLoader, StorageError,
    StorageResult, StreamId, StreamMetadataResult, StreamReadResult, StreamReadStatus,
    StreamStorage, SystemClock,
};

/// Expected stream version for an optimistic-concurrency append
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// No concurrency check
    Any,
    /// The stream must not exist yet
    NoStream,
    /// The stream's last version must equal the given value
    Exact(u32),
}

/// A message to append
#[derive(Debug, Clone)]
pub struct NewMessage {
    /// Client-assigned message id
    pub message_id: Uuid,
    /// Message type discriminator
    pub message_type: String,
    /// JSON body
    pub json_data: Option<String>,
    /// JSON metadata
    pub json_metadata: Option<String>,
}

impl NewMessage {
    /// Convenience constructor with a fresh message id
    pub fn new(message_type: impl Into<String>, json_data: impl Into<String>) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            message_type: message_type.into(),
            json_data: Some(json_data.into()),
            json_metadata: None,
        }
    }
}

/// Result of an append
#[derive(Debug, Clone, Copy)]
pub struct AppendResult {
    /// The stream's last version after the append
    pub current_version: u32,
    /// Global position of the last appended message
    pub current_position: i64,
}

#[derive(Debug, Clone)]
struct StoredEntry {
    stream_id: StreamId,
    stream_version: u32,
    message_id: Uuid,
    message_type: String,
    created_utc: DateTime<Utc>,
    json_metadata: Option<String>,
    json_data: Option<String>,
}

#[derive(Debug, Default)]
struct StreamRecord {
    /// version -> global position
    versions: BTreeMap<u32, i64>,
    next_version: u32,
}

impl StreamRecord {
    fn last_version(&self) -> i32 {
        self.versions.keys().next_back().map_or(-1, |v| *v as i32)
    }

    fn last_position(&self) -> i64 {
        self.versions.values().next_back().copied().unwrap_or(-1)
    }
}

#[derive(Debug, Clone)]
struct MetadataRecord {
    metadata_stream_version: i32,
    max_age: Option<u32>,
    max_count: Option<u32>,
    metadata_json: Option<String>,
}

#[derive(Debug, Default)]
struct State {
    /// Global log: position -> entry
    all: BTreeMap<i64, StoredEntry>,
    streams: HashMap<StreamId, StreamRecord>,
    metadata: HashMap<StreamId, MetadataRecord>,
    /// Next position to hand out; positions below this that are absent from
    /// `all` are either rolled back or still uncommitted
    next_position: i64,
    /// Message ids purged via `purge_expired_message`, for test assertions
    purged: Vec<Uuid>,
}

impl State {
    fn head_position(&self) -> i64 {
        self.all.keys().next_back().copied().unwrap_or(-1)
    }

    fn insert_entry(&mut self, stream_id: &StreamId, position: i64, message: NewMessage, now: DateTime<Utc>) -> u32 {
        let record = self.streams.entry(stream_id.clone()).or_default();
        let version = record.next_version;
        record.next_version += 1;
        record.versions.insert(version, position);

        self.all.insert(
            position,
            StoredEntry {
                stream_id: stream_id.clone(),
                stream_version: version,
                message_id: message.message_id,
                message_type: message.message_type,
                created_utc: now,
                json_metadata: message.json_metadata,
                json_data: message.json_data,
            },
        );
        version
    }
}

/// Loader for payloads read without prefetch; re-reads the global log on
/// first access
struct MemoryPayloadLoader {
    state: Arc<RwLock<State>>,
    position: i64,
}

#[async_trait]
impl PayloadLoader for MemoryPayloadLoader {
    async fn load(&self) -> StorageResult<Option<String>> {
        let state = self.state.read().await;
        Ok(state
            .all
            .get(&self.position)
            .and_then(|entry| entry.json_data.clone()))
    }
}

/// In-memory stream storage implementation using BTreeMap for ordering
#[derive(Clone)]
pub struct MemoryStreamStorage {
    state: Arc<RwLock<State>>,
    clock: Arc<dyn Clock>,
}

impl MemoryStreamStorage {
    /// Create a new in-memory engine using the system clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a new in-memory engine stamping `created_utc` from the given
    /// clock
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(RwLock::new(State::default())),
            clock,
        }
    }

    /// Append messages to a stream under an expected-version check
    pub async fn append_to_stream(
        &self,
        stream_id: &StreamId,
        expected: ExpectedVersion,
        messages: Vec<NewMessage>,
    ) -> StorageResult<AppendResult> {
        if stream_id.is_system() {
            return Err(StorageError::InvalidValue(format!(
                "cannot append directly to system stream {stream_id}"
            )));
        }

        let now = self.clock.utc_now();
        let mut state = self.state.write().await;

        match (state.streams.get(stream_id), expected) {
            (_, ExpectedVersion::Any) => {}
            (None, ExpectedVersion::NoStream) => {}
            (None, ExpectedVersion::Exact(v)) => {
                return Err(StorageError::WrongExpectedVersion(format!(
                    "stream {stream_id} does not exist, expected version {v}"
                )));
            }
            (Some(_), ExpectedVersion::NoStream) => {
                return Err(StorageError::WrongExpectedVersion(format!(
                    "stream {stream_id} already exists"
                )));
            }
            (Some(record), ExpectedVersion::Exact(v)) => {
                if record.last_version() != v as i32 {
                    return Err(StorageError::WrongExpectedVersion(format!(
                        "stream {stream_id} is at version {}, expected {v}",
                        record.last_version()
                    )));
                }
            }
        }

        let mut result = AppendResult {
            current_version: 0,
            current_position: -1,
        };
        for message in messages {
            let position = state.next_position;
            state.next_position += 1;
            result.current_version = state.insert_entry(stream_id, position, message, now);
            result.current_position = position;
        }

        Ok(result)
    }

    /// Consume `count` global positions without committing anything,
    /// producing a permanent hole in the position sequence (a rolled-back
    /// writer transaction)
    pub async fn skip_positions(&self, count: i64) {
        let mut state = self.state.write().await;
        state.next_position += count;
    }

    /// Commit a message at a previously skipped position, filling a hole (a
    /// writer transaction that reserved its position early and committed
    /// late)
    pub async fn append_at_position(
        &self,
        stream_id: &StreamId,
        position: i64,
        message: NewMessage,
    ) -> StorageResult<()> {
        let now = self.clock.utc_now();
        let mut state = self.state.write().await;

        if position >= state.next_position {
            return Err(StorageError::InvalidValue(format!(
                "position {position} was never reserved"
            )));
        }
        if state.all.contains_key(&position) {
            return Err(StorageError::InvalidValue(format!(
                "position {position} is already committed"
            )));
        }

        state.insert_entry(stream_id, position, message, now);
        Ok(())
    }

    /// Set retention metadata for a stream
    pub async fn set_stream_metadata(
        &self,
        stream_id: &StreamId,
        max_age: Option<u32>,
        max_count: Option<u32>,
        metadata_json: Option<String>,
    ) -> StorageResult<()> {
        let mut state = self.state.write().await;
        let next_version = state
            .metadata
            .get(stream_id)
            .map_or(0, |record| record.metadata_stream_version + 1);
        state.metadata.insert(
            stream_id.clone(),
            MetadataRecord {
                metadata_stream_version: next_version,
                max_age,
                max_count,
                metadata_json,
            },
        );
        Ok(())
    }

    /// Delete a stream and all its messages, appending a tombstone to
    /// `$deleted`
    pub async fn delete_stream(&self, stream_id: &StreamId) -> StorageResult<()> {
        let now = self.clock.utc_now();
        let mut state = self.state.write().await;

        let Some(record) = state.streams.remove(stream_id) else {
            return Ok(());
        };
        for position in record.versions.values() {
            state.all.remove(position);
        }
        state.metadata.remove(stream_id);

        let position = state.next_position;
        state.next_position += 1;
        let tombstone = NewMessage {
            message_id: Uuid::new_v4(),
            message_type: "$stream-deleted".to_string(),
            json_data: Some(
                serde_json::json!({ "stream_id": stream_id.as_str() }).to_string(),
            ),
            json_metadata: None,
        };
        state.insert_entry(&StreamId::new(DELETED_STREAM_ID), position, tombstone, now);
        Ok(())
    }

    /// Delete a single message from a stream, appending a tombstone to
    /// `$deleted`
    pub async fn delete_message(
        &self,
        stream_id: &StreamId,
        message_id: Uuid,
    ) -> StorageResult<()> {
        let now = self.clock.utc_now();
        let mut state = self.state.write().await;

        let Some(record) = state.streams.get(stream_id) else {
            return Ok(());
        };
        let Some((version, position)) = record.versions.iter().find_map(|(version, position)| {
            (state.all.get(position)?.message_id == message_id).then_some((*version, *position))
        }) else {
            return Ok(());
        };

        state.all.remove(&position);
        if let Some(record) = state.streams.get_mut(stream_id) {
            record.versions.remove(&version);
        }

        let tombstone_position = state.next_position;
        state.next_position += 1;
        let tombstone = NewMessage {
            message_id: Uuid::new_v4(),
            message_type: "$message-deleted".to_string(),
            json_data: Some(
                serde_json::json!({
                    "stream_id": stream_id.as_str(),
                    "message_id": message_id,
                })
                .to_string(),
            ),
            json_metadata: None,
        };
        state.insert_entry(
            &StreamId::new(DELETED_STREAM_ID),
            tombstone_position,
            tombstone,
            now,
        );
        Ok(())
    }

    /// Message ids removed via `purge_expired_message`, in purge order
    pub async fn purged_messages(&self) -> Vec<Uuid> {
        self.state.read().await.purged.clone()
    }

    fn to_message(&self, entry: &StoredEntry, position: i64, prefetch: bool) -> Message {
        let payload = if prefetch {
            MessagePayload::Inline(entry.json_data.clone())
        } else {
            MessagePayload::deferred(Arc::new(MemoryPayloadLoader {
                state: self.state.clone(),
                position,
            }))
        };
        Message {
            stream_id: entry.stream_id.clone(),
            stream_version: entry.stream_version,
            position,
            message_id: entry.message_id,
            message_type: entry.message_type.clone(),
            created_utc: entry.created_utc,
            json_metadata: entry.json_metadata.clone(),
            payload,
        }
    }
}

impl Default for MemoryStreamStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StreamStorage for MemoryStreamStorage {
    async fn read_all_forwards(
        &self,
        from_position_inclusive: i64,
        max_count: usize,
        prefetch: bool,
    ) -> StorageResult<AllReadResult> {
        let state = self.state.read().await;

        let mut taken: Vec<(i64, &StoredEntry)> = Vec::with_capacity(max_count);
        let mut more = false;
        for (position, entry) in state.all.range(from_position_inclusive..) {
            if taken.len() == max_count {
                more = true;
                break;
            }
            taken.push((*position, entry));
        }

        let is_end = !more;
        let next_position = if is_end {
            -1
        } else {
            taken.last().map_or(from_position_inclusive, |(p, _)| p + 1)
        };
        let messages = taken
            .into_iter()
            .map(|(position, entry)| self.to_message(entry, position, prefetch))
            .collect();

        Ok(AllReadResult {
            from_position: from_position_inclusive,
            next_position,
            is_end,
            messages,
        })
    }

    async fn read_all_backwards(
        &self,
        from_position_inclusive: i64,
        max_count: usize,
        prefetch: bool,
    ) -> StorageResult<AllReadResult> {
        let state = self.state.read().await;

        let start = if from_position_inclusive == -1 {
            state.head_position()
        } else {
            from_position_inclusive
        };

        let mut taken: Vec<(i64, &StoredEntry)> = Vec::with_capacity(max_count);
        let mut more = false;
        for (position, entry) in state.all.range(..=start).rev() {
            if taken.len() == max_count {
                more = true;
                break;
            }
            taken.push((*position, entry));
        }

        let is_end = !more;
        let next_position = if is_end {
            -1
        } else {
            taken.last().map_or(start, |(p, _)| p - 1)
        };
        let messages = taken
            .into_iter()
            .map(|(position, entry)| self.to_message(entry, position, prefetch))
            .collect();

        Ok(AllReadResult {
            from_position: start,
            next_position,
            is_end,
            messages,
        })
    }

    async fn read_stream_forwards(
        &self,
        stream_id: &StreamId,
        from_version_inclusive: i32,
        max_count: usize,
        prefetch: bool,
    ) -> StorageResult<StreamReadResult> {
        let state = self.state.read().await;

        let Some(record) = state.streams.get(stream_id) else {
            return Ok(StreamReadResult::not_found(from_version_inclusive));
        };

        let from = from_version_inclusive.max(0) as u32;
        let mut taken: Vec<(u32, i64)> = Vec::with_capacity(max_count);
        let mut more = false;
        for (version, position) in record.versions.range(from..) {
            if taken.len() == max_count {
                more = true;
                break;
            }
            taken.push((*version, *position));
        }

        let is_end = !more;
        let next_version = if is_end {
            -1
        } else {
            taken.last().map_or(from_version_inclusive, |(v, _)| *v as i32 + 1)
        };
        let messages = taken
            .into_iter()
            .filter_map(|(_, position)| {
                state
                    .all
                    .get(&position)
                    .map(|entry| self.to_message(entry, position, prefetch))
            })
            .collect();

        Ok(StreamReadResult {
            status: StreamReadStatus::Found,
            from_version: from_version_inclusive,
            next_version,
            last_version: record.last_version(),
            last_position: record.last_position(),
            is_end,
            messages,
        })
    }

    async fn read_stream_backwards(
        &self,
        stream_id: &StreamId,
        from_version_inclusive: i32,
        max_count: usize,
        prefetch: bool,
    ) -> StorageResult<StreamReadResult> {
        let state = self.state.read().await;

        let Some(record) = state.streams.get(stream_id) else {
            return Ok(StreamReadResult::not_found(from_version_inclusive));
        };

        let start = if from_version_inclusive == -1 {
            record.last_version()
        } else {
            from_version_inclusive
        };
        if start < 0 {
            return Ok(StreamReadResult {
                status: StreamReadStatus::Found,
                from_version: start,
                next_version: -1,
                last_version: record.last_version(),
                last_position: record.last_position(),
                is_end: true,
                messages: Vec::new(),
            });
        }

        let mut taken: Vec<(u32, i64)> = Vec::with_capacity(max_count);
        let mut more = false;
        for (version, position) in record.versions.range(..=start as u32).rev() {
            if taken.len() == max_count {
                more = true;
                break;
            }
            taken.push((*version, *position));
        }

        let is_end = !more;
        let next_version = if is_end {
            -1
        } else {
            taken.last().map_or(start, |(v, _)| *v as i32 - 1)
        };
        let messages = taken
            .into_iter()
            .filter_map(|(_, position)| {
                state
                    .all
                    .get(&position)
                    .map(|entry| self.to_message(entry, position, prefetch))
            })
            .collect();

        Ok(StreamReadResult {
            status: StreamReadStatus::Found,
            from_version: start,
            next_version,
            last_version: record.last_version(),
            last_position: record.last_position(),
            is_end,
            messages,
        })
    }

    async fn read_head_position(&self) -> StorageResult<i64> {
        Ok(self.state.read().await.head_position())
    }

    async fn stream_metadata(
        &self,
        stream_id: &StreamId,
    ) -> StorageResult<Option<StreamMetadataResult>> {
        let state = self.state.read().await;
        Ok(state.metadata.get(stream_id).map(|record| StreamMetadataResult {
            stream_id: stream_id.clone(),
            metadata_stream_version: record.metadata_stream_version,
            max_age: record.max_age,
            max_count: record.max_count,
            metadata_json: record.metadata_json.clone(),
        }))
    }

    async fn purge_expired_message(&self, message: &Message) -> StorageResult<()> {
        let mut state = self.state.write().await;

        // Idempotent: the message may already be gone
        let present = state
            .all
            .get(&message.position)
            .is_some_and(|entry| entry.message_id == message.message_id);
        if present {
            state.all.remove(&message.position);
            if let Some(record) = state.streams.get_mut(&message.stream_id) {
                record.versions.remove(&message.stream_version);
            }
            state.purged.push(message.message_id);
        }
        Ok(())
    }
}

impl std::fmt::Debug for MemoryStreamStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStreamStorage")
            .field("state", &"<locked>")
            .finish()
    }
}
