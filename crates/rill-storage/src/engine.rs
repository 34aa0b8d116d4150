//! The storage engine adapter contract
//!
//! The readonly store layer consumes exactly this interface. All methods must
//! be safe for concurrent invocation. Position and version sentinels:
//! positions start at 0 and `from_position = -1` on a backward all-read means
//! "from the current end"; versions are dense per stream starting at 0 and
//! `from_version = -1` on a backward stream read means "from the current
//! last version".

use async_trait::async_trait;

use crate::types::{AllReadResult, Message, StreamId, StreamMetadataResult, StreamReadResult};

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in storage operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Storage backend error
    #[error("storage backend error: {0}")]
    Backend(String),

    /// Invalid value format
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Optimistic concurrency check failed on append
    #[error("wrong expected version: {0}")]
    WrongExpectedVersion(String),
}

/// The narrow storage contract the readonly store layer depends on
///
/// Raw read results carry cursor fields but no continuation; the store layer
/// binds continuations when it wraps them into public pages.
#[async_trait]
pub trait StreamStorage: Clone + Send + Sync + 'static {
    /// Read the all-stream forwards from `from_position_inclusive`
    async fn read_all_forwards(
        &self,
        from_position_inclusive: i64,
        max_count: usize,
        prefetch: bool,
    ) -> StorageResult<AllReadResult>;

    /// Read the all-stream backwards from `from_position_inclusive`
    /// (`-1` means from the current end)
    async fn read_all_backwards(
        &self,
        from_position_inclusive: i64,
        max_count: usize,
        prefetch: bool,
    ) -> StorageResult<AllReadResult>;

    /// Read a stream forwards from `from_version_inclusive`
    async fn read_stream_forwards(
        &self,
        stream_id: &StreamId,
        from_version_inclusive: i32,
        max_count: usize,
        prefetch: bool,
    ) -> StorageResult<StreamReadResult>;

    /// Read a stream backwards from `from_version_inclusive`
    /// (`-1` means from the current last version)
    async fn read_stream_backwards(
        &self,
        stream_id: &StreamId,
        from_version_inclusive: i32,
        max_count: usize,
        prefetch: bool,
    ) -> StorageResult<StreamReadResult>;

    /// Get the current maximum committed position, `-1` when the store is
    /// empty
    async fn read_head_position(&self) -> StorageResult<i64>;

    /// Get retention metadata for a stream, if any has been set
    async fn stream_metadata(
        &self,
        stream_id: &StreamId,
    ) -> StorageResult<Option<StreamMetadataResult>>;

    /// Physically remove a message that the read layer determined to be past
    /// its stream's max age
    async fn purge_expired_message(&self, message: &Message) -> StorageResult<()>;
}

/// Implement StreamStorage for Arc<T> where T: StreamStorage
#[async_trait]
impl<T: StreamStorage> StreamStorage for std::sync::Arc<T> {
    async fn read_all_forwards(
        &self,
        from_position_inclusive: i64,
        max_count: usize,
        prefetch: bool,
    ) -> StorageResult<AllReadResult> {
        (**self)
            .read_all_forwards(from_position_inclusive, max_count, prefetch)
            .await
    }

    async fn read_all_backwards(
        &self,
        from_position_inclusive: i64,
        max_count: usize,
        prefetch: bool,
    ) -> StorageResult<AllReadResult> {
        (**self)
            .read_all_backwards(from_position_inclusive, max_count, prefetch)
            .await
    }

    async fn read_stream_forwards(
        &self,
        stream_id: &StreamId,
        from_version_inclusive: i32,
        max_count: usize,
        prefetch: bool,
    ) -> StorageResult<StreamReadResult> {
        (**self)
            .read_stream_forwards(stream_id, from_version_inclusive, max_count, prefetch)
            .await
    }

    async fn read_stream_backwards(
        &self,
        stream_id: &StreamId,
        from_version_inclusive: i32,
        max_count: usize,
        prefetch: bool,
    ) -> StorageResult<StreamReadResult> {
        (**self)
            .read_stream_backwards(stream_id, from_version_inclusive, max_count, prefetch)
            .await
    }

    async fn read_head_position(&self) -> StorageResult<i64> {
        (**self).read_head_position().await
    }

    async fn stream_metadata(
        &self,
        stream_id: &StreamId,
    ) -> StorageResult<Option<StreamMetadataResult>> {
        (**self).stream_metadata(stream_id).await
    }

    async fn purge_expired_message(&self, message: &Message) -> StorageResult<()> {
        (**self).purge_expired_message(message).await
    }
}
