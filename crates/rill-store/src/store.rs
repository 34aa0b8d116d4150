//! Readonly stream store façade
//!
//! `StreamStore` validates arguments, guards against disposal and
//! cancellation, and orchestrates the gap reconciler and expiry filter
//! around raw engine reads. Returned pages carry a `read_next` continuation
//! bound to the same options; the continuation holds a weak handle to the
//! store so it observes disposal instead of keeping the store alive.

use std::fmt;
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::info;

use rill_storage::{
    Clock, Message, ReadDirection, StreamId, StreamMetadataResult, StreamReadStatus, StreamStorage,
};

use crate::config::StreamStoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::metadata_cache::MaxAgeCache;
use crate::notifier::HeadNotifier;
use crate::subscription::{self, AllSubscription, StreamSubscription, SubscriptionHandler};
use crate::{filter, gap, util};

type ReadNextAll =
    Arc<dyn Fn(CancellationToken) -> BoxFuture<'static, StoreResult<ReadAllPage>> + Send + Sync>;
type ReadNextStream =
    Arc<dyn Fn(CancellationToken) -> BoxFuture<'static, StoreResult<ReadStreamPage>> + Send + Sync>;

/// Continuation cursor bound into a page
#[derive(Debug, Clone, Copy)]
enum NextCursor<C> {
    /// Continue reading from this cursor
    Position(C),
    /// Nothing can follow in this direction; `read_next` returns an empty
    /// terminal page
    Exhausted,
}

/// A page of the all-stream
///
/// `next_position` is `-1` once the read reached the end in its direction;
/// [`read_next`](Self::read_next) still works there: on a forward read it
/// polls past the last returned message for newly committed messages.
pub struct ReadAllPage {
    /// Position this page was read from
    pub from_position: i64,
    /// Engine continuation cursor, `-1` at the end
    pub next_position: i64,
    /// Whether the read reached the end of the all-stream
    pub is_end: bool,
    /// Read direction
    pub direction: ReadDirection,
    /// Messages after gap reconciliation and expiry filtering. May be empty
    /// with `is_end = false`; loop with `read_next` until `is_end`.
    pub messages: Vec<Message>,
    read_next: ReadNextAll,
}

impl ReadAllPage {
    /// Read the page that logically follows this one, under the same
    /// direction and options
    pub async fn read_next(&self, token: &CancellationToken) -> StoreResult<ReadAllPage> {
        (self.read_next)(token.clone()).await
    }
}

impl fmt::Debug for ReadAllPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadAllPage")
            .field("from_position", &self.from_position)
            .field("next_position", &self.next_position)
            .field("is_end", &self.is_end)
            .field("direction", &self.direction)
            .field("messages", &self.messages.len())
            .finish_non_exhaustive()
    }
}

/// A page of a single stream
pub struct ReadStreamPage {
    /// Stream the page was read from
    pub stream_id: StreamId,
    /// Whether the stream exists
    pub status: StreamReadStatus,
    /// Version this page was read from
    pub from_version: i32,
    /// Engine continuation cursor, `-1` at the end
    pub next_version: i32,
    /// The stream's current last version, `-1` if not found
    pub last_version: i32,
    /// Global position of the stream's last message, `-1` if not found
    pub last_position: i64,
    /// Whether the read reached the end of the stream
    pub is_end: bool,
    /// Read direction
    pub direction: ReadDirection,
    /// Messages after expiry filtering
    pub messages: Vec<Message>,
    read_next: ReadNextStream,
}

impl ReadStreamPage {
    /// Read the page that logically follows this one, under the same
    /// direction and options
    pub async fn read_next(&self, token: &CancellationToken) -> StoreResult<ReadStreamPage> {
        (self.read_next)(token.clone()).await
    }
}

impl fmt::Debug for ReadStreamPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadStreamPage")
            .field("stream_id", &self.stream_id)
            .field("status", &self.status)
            .field("from_version", &self.from_version)
            .field("next_version", &self.next_version)
            .field("last_version", &self.last_version)
            .field("is_end", &self.is_end)
            .field("direction", &self.direction)
            .field("messages", &self.messages.len())
            .finish_non_exhaustive()
    }
}

pub(crate) struct AllPageData {
    from_position: i64,
    next_position: i64,
    is_end: bool,
    messages: Vec<Message>,
    continuation: NextCursor<i64>,
}

pub(crate) struct StreamPageData {
    status: StreamReadStatus,
    from_version: i32,
    next_version: i32,
    last_version: i32,
    last_position: i64,
    is_end: bool,
    messages: Vec<Message>,
    continuation: NextCursor<i32>,
}

/// Shared store internals; subscriptions and continuations hold this weakly
pub(crate) struct StoreInner<S: StreamStorage> {
    pub(crate) engine: S,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) cache: MaxAgeCache,
    pub(crate) gap_reload_interval: Duration,
    pub(crate) poll_interval: Duration,
    pub(crate) log_name: String,
    pub(crate) root_token: CancellationToken,
    disposed: watch::Sender<bool>,
    notifier: OnceLock<HeadNotifier>,
}

impl<S: StreamStorage> StoreInner<S> {
    pub(crate) fn ensure_not_disposed(&self) -> StoreResult<()> {
        if *self.disposed.borrow() {
            return Err(StoreError::Disposed);
        }
        Ok(())
    }

    pub(crate) fn guard(&self, token: &CancellationToken) -> StoreResult<()> {
        self.ensure_not_disposed()?;
        if token.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        Ok(())
    }

    /// The head notifier, started on first use so stores that never
    /// subscribe never poll
    pub(crate) fn notifier(&self) -> &HeadNotifier {
        self.notifier.get_or_init(|| {
            HeadNotifier::start(
                self.engine.clone(),
                self.poll_interval,
                self.root_token.child_token(),
                self.log_name.clone(),
            )
        })
    }

    async fn all_forwards_data(
        &self,
        from_position_inclusive: i64,
        max_count: usize,
        prefetch: bool,
        token: &CancellationToken,
    ) -> StoreResult<AllPageData> {
        let raw = gap::read_all_forwards_reconciled(
            &self.engine,
            from_position_inclusive,
            max_count,
            prefetch,
            self.gap_reload_interval,
            token,
            &self.log_name,
        )
        .await?;

        // Continuations advance past the raw page, not the filtered one, so
        // expired messages are not re-read
        let continuation = NextCursor::Position(if raw.is_end {
            raw.messages
                .last()
                .map_or(from_position_inclusive, |m| m.position + 1)
        } else {
            raw.next_position
        });

        let messages = filter::filter_expired(
            &self.engine,
            &self.cache,
            self.clock.as_ref(),
            &self.log_name,
            raw.messages,
        )
        .await?;

        Ok(AllPageData {
            from_position: raw.from_position,
            next_position: raw.next_position,
            is_end: raw.is_end,
            messages,
            continuation,
        })
    }

    async fn all_backwards_data(
        &self,
        from_position_inclusive: i64,
        max_count: usize,
        prefetch: bool,
        token: &CancellationToken,
    ) -> StoreResult<AllPageData> {
        let raw = util::engine_call(
            self.engine
                .read_all_backwards(from_position_inclusive, max_count, prefetch),
            token,
        )
        .await?;

        let continuation = if raw.is_end {
            NextCursor::Exhausted
        } else {
            NextCursor::Position(raw.next_position)
        };

        let messages = filter::filter_expired(
            &self.engine,
            &self.cache,
            self.clock.as_ref(),
            &self.log_name,
            raw.messages,
        )
        .await?;

        Ok(AllPageData {
            from_position: raw.from_position,
            next_position: raw.next_position,
            is_end: raw.is_end,
            messages,
            continuation,
        })
    }

    async fn stream_forwards_data(
        &self,
        stream_id: &StreamId,
        from_version_inclusive: i32,
        max_count: usize,
        prefetch: bool,
        token: &CancellationToken,
    ) -> StoreResult<StreamPageData> {
        let raw = util::engine_call(
            self.engine
                .read_stream_forwards(stream_id, from_version_inclusive, max_count, prefetch),
            token,
        )
        .await?;

        let continuation = match raw.status {
            // The stream may appear later; poll the same cursor
            StreamReadStatus::NotFound => NextCursor::Position(from_version_inclusive),
            StreamReadStatus::Found => NextCursor::Position(if raw.is_end {
                raw.messages
                    .last()
                    .map_or(from_version_inclusive, |m| m.stream_version as i32 + 1)
            } else {
                raw.next_version
            }),
        };

        let messages = filter::filter_expired(
            &self.engine,
            &self.cache,
            self.clock.as_ref(),
            &self.log_name,
            raw.messages,
        )
        .await?;

        Ok(StreamPageData {
            status: raw.status,
            from_version: raw.from_version,
            next_version: raw.next_version,
            last_version: raw.last_version,
            last_position: raw.last_position,
            is_end: raw.is_end,
            messages,
            continuation,
        })
    }

    async fn stream_backwards_data(
        &self,
        stream_id: &StreamId,
        from_version_inclusive: i32,
        max_count: usize,
        prefetch: bool,
        token: &CancellationToken,
    ) -> StoreResult<StreamPageData> {
        let raw = util::engine_call(
            self.engine
                .read_stream_backwards(stream_id, from_version_inclusive, max_count, prefetch),
            token,
        )
        .await?;

        let continuation = match raw.status {
            StreamReadStatus::NotFound => NextCursor::Position(from_version_inclusive),
            StreamReadStatus::Found if raw.is_end => NextCursor::Exhausted,
            StreamReadStatus::Found => NextCursor::Position(raw.next_version),
        };

        let messages = filter::filter_expired(
            &self.engine,
            &self.cache,
            self.clock.as_ref(),
            &self.log_name,
            raw.messages,
        )
        .await?;

        Ok(StreamPageData {
            status: raw.status,
            from_version: raw.from_version,
            next_version: raw.next_version,
            last_version: raw.last_version,
            last_position: raw.last_position,
            is_end: raw.is_end,
            messages,
            continuation,
        })
    }
}

impl<S: StreamStorage> Drop for StoreInner<S> {
    fn drop(&mut self) {
        // Stops the notifier and any subscriptions still running
        self.root_token.cancel();
    }
}

/// The readonly stream store
///
/// Cheap to clone; all clones share the same engine, caches and lifecycle.
pub struct StreamStore<S: StreamStorage> {
    pub(crate) inner: Arc<StoreInner<S>>,
}

impl<S: StreamStorage> Clone for StreamStore<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S: StreamStorage> fmt::Debug for StreamStore<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamStore")
            .field("log_name", &self.inner.log_name)
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}

impl<S: StreamStorage> StreamStore<S> {
    /// Create a store over the given engine with default configuration
    pub fn new(engine: S) -> Self {
        Self::with_config(engine, StreamStoreConfig::default())
    }

    /// Create a store over the given engine
    pub fn with_config(engine: S, config: StreamStoreConfig) -> Self {
        let inner = Arc::new(StoreInner {
            cache: MaxAgeCache::new(
                config.metadata_cache_max_size,
                config.metadata_cache_expiry,
                config.clock.clone(),
            ),
            engine,
            clock: config.clock,
            gap_reload_interval: config.gap_reload_interval,
            poll_interval: config.poll_interval,
            log_name: config.log_name,
            root_token: CancellationToken::new(),
            disposed: watch::Sender::new(false),
            notifier: OnceLock::new(),
        });
        Self { inner }
    }

    pub(crate) fn from_inner(inner: Arc<StoreInner<S>>) -> Self {
        Self { inner }
    }

    /// Read the all-stream forwards from `from_position_inclusive`.
    ///
    /// Transient position gaps are reconciled and expired messages filtered
    /// before the page is returned.
    pub async fn read_all_forwards(
        &self,
        from_position_inclusive: i64,
        max_count: usize,
        prefetch: bool,
        token: &CancellationToken,
    ) -> StoreResult<ReadAllPage> {
        if from_position_inclusive < 0 {
            return Err(StoreError::InvalidArgument(format!(
                "from_position_inclusive must be >= 0, got {from_position_inclusive}"
            )));
        }
        validate_max_count(max_count)?;
        self.inner.guard(token)?;

        let data = self
            .inner
            .all_forwards_data(from_position_inclusive, max_count, prefetch, token)
            .await?;
        Ok(wrap_all_page(
            &self.inner,
            data,
            ReadDirection::Forward,
            max_count,
            prefetch,
        ))
    }

    /// Read the all-stream backwards from `from_position_inclusive`
    /// (`-1` means from the current end)
    pub async fn read_all_backwards(
        &self,
        from_position_inclusive: i64,
        max_count: usize,
        prefetch: bool,
        token: &CancellationToken,
    ) -> StoreResult<ReadAllPage> {
        if from_position_inclusive < -1 {
            return Err(StoreError::InvalidArgument(format!(
                "from_position_inclusive must be >= -1, got {from_position_inclusive}"
            )));
        }
        validate_max_count(max_count)?;
        self.inner.guard(token)?;

        let data = self
            .inner
            .all_backwards_data(from_position_inclusive, max_count, prefetch, token)
            .await?;
        Ok(wrap_all_page(
            &self.inner,
            data,
            ReadDirection::Backward,
            max_count,
            prefetch,
        ))
    }

    /// Read a stream forwards from `from_version_inclusive`
    pub async fn read_stream_forwards(
        &self,
        stream_id: &StreamId,
        from_version_inclusive: i32,
        max_count: usize,
        prefetch: bool,
        token: &CancellationToken,
    ) -> StoreResult<ReadStreamPage> {
        validate_stream_id(stream_id)?;
        if from_version_inclusive < 0 {
            return Err(StoreError::InvalidArgument(format!(
                "from_version_inclusive must be >= 0, got {from_version_inclusive}"
            )));
        }
        validate_max_count(max_count)?;
        self.inner.guard(token)?;

        let data = self
            .inner
            .stream_forwards_data(stream_id, from_version_inclusive, max_count, prefetch, token)
            .await?;
        Ok(wrap_stream_page(
            &self.inner,
            stream_id.clone(),
            data,
            ReadDirection::Forward,
            max_count,
            prefetch,
        ))
    }

    /// Read a stream backwards from `from_version_inclusive`
    /// (`-1` means from the current last version)
    pub async fn read_stream_backwards(
        &self,
        stream_id: &StreamId,
        from_version_inclusive: i32,
        max_count: usize,
        prefetch: bool,
        token: &CancellationToken,
    ) -> StoreResult<ReadStreamPage> {
        validate_stream_id(stream_id)?;
        if from_version_inclusive < -1 {
            return Err(StoreError::InvalidArgument(format!(
                "from_version_inclusive must be >= -1, got {from_version_inclusive}"
            )));
        }
        validate_max_count(max_count)?;
        self.inner.guard(token)?;

        let data = self
            .inner
            .stream_backwards_data(stream_id, from_version_inclusive, max_count, prefetch, token)
            .await?;
        Ok(wrap_stream_page(
            &self.inner,
            stream_id.clone(),
            data,
            ReadDirection::Backward,
            max_count,
            prefetch,
        ))
    }

    /// Get retention metadata for a stream.
    ///
    /// System streams are rejected, except the well-known `$deleted` stream.
    pub async fn get_stream_metadata(
        &self,
        stream_id: &StreamId,
        token: &CancellationToken,
    ) -> StoreResult<Option<StreamMetadataResult>> {
        validate_stream_id(stream_id)?;
        if stream_id.is_system() && !stream_id.is_deleted_stream() {
            return Err(StoreError::InvalidArgument(format!(
                "cannot read metadata of system stream {stream_id}"
            )));
        }
        self.inner.guard(token)?;
        util::engine_call(self.inner.engine.stream_metadata(stream_id), token).await
    }

    /// The current maximum committed position, `-1` when the store is empty
    pub async fn read_head_position(&self, token: &CancellationToken) -> StoreResult<i64> {
        self.inner.guard(token)?;
        util::engine_call(self.inner.engine.read_head_position(), token).await
    }

    /// Subscribe to a stream, starting after `continue_after_version`
    /// (exclusive; `None` means from the stream's current end, `Some(-1)`
    /// from its first message)
    pub fn subscribe_to_stream<H: SubscriptionHandler>(
        &self,
        stream_id: StreamId,
        continue_after_version: Option<i32>,
        handler: H,
        prefetch: bool,
        name: Option<String>,
    ) -> StoreResult<StreamSubscription> {
        validate_stream_id(&stream_id)?;
        if let Some(version) = continue_after_version
            && version < -1
        {
            return Err(StoreError::InvalidArgument(format!(
                "continue_after_version must be >= -1, got {version}"
            )));
        }
        self.inner.ensure_not_disposed()?;
        Ok(subscription::spawn_stream_subscription(
            &self.inner,
            stream_id,
            continue_after_version,
            handler,
            prefetch,
            name,
        ))
    }

    /// Subscribe to the all-stream, starting after `continue_after_position`
    /// (exclusive; `None` means from the current head, `Some(-1)` from the
    /// first message)
    pub fn subscribe_to_all<H: SubscriptionHandler>(
        &self,
        continue_after_position: Option<i64>,
        handler: H,
        prefetch: bool,
        name: Option<String>,
    ) -> StoreResult<AllSubscription> {
        if let Some(position) = continue_after_position
            && position < -1
        {
            return Err(StoreError::InvalidArgument(format!(
                "continue_after_position must be >= -1, got {position}"
            )));
        }
        self.inner.ensure_not_disposed()?;
        Ok(subscription::spawn_all_subscription(
            &self.inner,
            continue_after_position,
            handler,
            prefetch,
            name,
        ))
    }

    /// The head notifier backing live subscriptions; started on first use
    pub fn notifier(&self) -> &HeadNotifier {
        self.inner.notifier()
    }

    /// Dispose the store: cancel the notifier and all subscriptions and fail
    /// subsequent operations with `Disposed`. Idempotent.
    pub fn dispose(&self) {
        if self.inner.disposed.send_replace(true) {
            return;
        }
        info!(store = %self.inner.log_name, "disposing stream store");
        self.inner.root_token.cancel();
    }

    /// Whether the store has been disposed
    pub fn is_disposed(&self) -> bool {
        *self.inner.disposed.borrow()
    }

    /// Wait until the store is disposed
    pub async fn on_dispose(&self) {
        let mut rx = self.inner.disposed.subscribe();
        while !*rx.borrow() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

fn validate_max_count(max_count: usize) -> StoreResult<()> {
    if max_count == 0 {
        return Err(StoreError::InvalidArgument(
            "max_count must be >= 1".to_string(),
        ));
    }
    Ok(())
}

fn validate_stream_id(stream_id: &StreamId) -> StoreResult<()> {
    if stream_id.as_str().is_empty() {
        return Err(StoreError::InvalidArgument(
            "stream id must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn wrap_all_page<S: StreamStorage>(
    inner: &Arc<StoreInner<S>>,
    data: AllPageData,
    direction: ReadDirection,
    max_count: usize,
    prefetch: bool,
) -> ReadAllPage {
    ReadAllPage {
        from_position: data.from_position,
        next_position: data.next_position,
        is_end: data.is_end,
        direction,
        messages: data.messages,
        read_next: all_read_next(
            Arc::downgrade(inner),
            data.continuation,
            direction,
            max_count,
            prefetch,
        ),
    }
}

fn all_read_next<S: StreamStorage>(
    weak: Weak<StoreInner<S>>,
    cursor: NextCursor<i64>,
    direction: ReadDirection,
    max_count: usize,
    prefetch: bool,
) -> ReadNextAll {
    Arc::new(move |token: CancellationToken| {
        let weak = weak.clone();
        Box::pin(async move {
            match cursor {
                NextCursor::Exhausted => Ok(ReadAllPage {
                    from_position: -1,
                    next_position: -1,
                    is_end: true,
                    direction,
                    messages: Vec::new(),
                    read_next: all_read_next(
                        weak,
                        NextCursor::Exhausted,
                        direction,
                        max_count,
                        prefetch,
                    ),
                }),
                NextCursor::Position(from) => {
                    let Some(inner) = weak.upgrade() else {
                        return Err(StoreError::Disposed);
                    };
                    inner.guard(&token)?;
                    let data = match direction {
                        ReadDirection::Forward => {
                            inner
                                .all_forwards_data(from, max_count, prefetch, &token)
                                .await?
                        }
                        ReadDirection::Backward => {
                            inner
                                .all_backwards_data(from, max_count, prefetch, &token)
                                .await?
                        }
                    };
                    Ok(wrap_all_page(&inner, data, direction, max_count, prefetch))
                }
            }
        })
    })
}

fn wrap_stream_page<S: StreamStorage>(
    inner: &Arc<StoreInner<S>>,
    stream_id: StreamId,
    data: StreamPageData,
    direction: ReadDirection,
    max_count: usize,
    prefetch: bool,
) -> ReadStreamPage {
    let read_next = stream_read_next(
        Arc::downgrade(inner),
        stream_id.clone(),
        data.continuation,
        direction,
        max_count,
        prefetch,
    );
    ReadStreamPage {
        stream_id,
        status: data.status,
        from_version: data.from_version,
        next_version: data.next_version,
        last_version: data.last_version,
        last_position: data.last_position,
        is_end: data.is_end,
        direction,
        messages: data.messages,
        read_next,
    }
}

fn stream_read_next<S: StreamStorage>(
    weak: Weak<StoreInner<S>>,
    stream_id: StreamId,
    cursor: NextCursor<i32>,
    direction: ReadDirection,
    max_count: usize,
    prefetch: bool,
) -> ReadNextStream {
    Arc::new(move |token: CancellationToken| {
        let weak = weak.clone();
        let stream_id = stream_id.clone();
        Box::pin(async move {
            match cursor {
                NextCursor::Exhausted => Ok(ReadStreamPage {
                    stream_id: stream_id.clone(),
                    status: StreamReadStatus::Found,
                    from_version: -1,
                    next_version: -1,
                    last_version: -1,
                    last_position: -1,
                    is_end: true,
                    direction,
                    messages: Vec::new(),
                    read_next: stream_read_next(
                        weak,
                        stream_id,
                        NextCursor::Exhausted,
                        direction,
                        max_count,
                        prefetch,
                    ),
                }),
                NextCursor::Position(from) => {
                    let Some(inner) = weak.upgrade() else {
                        return Err(StoreError::Disposed);
                    };
                    inner.guard(&token)?;
                    let data = match direction {
                        ReadDirection::Forward => {
                            inner
                                .stream_forwards_data(&stream_id, from, max_count, prefetch, &token)
                                .await?
                        }
                        ReadDirection::Backward => {
                            inner
                                .stream_backwards_data(
                                    &stream_id, from, max_count, prefetch, &token,
                                )
                                .await?
                        }
                    };
                    Ok(wrap_stream_page(
                        &inner, stream_id, data, direction, max_count, prefetch,
                    ))
                }
            }
        })
    })
}

/// An empty, not-yet-read page whose continuation starts at `from`; lets the
/// subscription runtime drive catch-up purely through `read_next`
pub(crate) fn seed_all_page<S: StreamStorage>(
    inner: &Arc<StoreInner<S>>,
    from: i64,
    max_count: usize,
    prefetch: bool,
) -> ReadAllPage {
    ReadAllPage {
        from_position: from,
        next_position: from,
        is_end: false,
        direction: ReadDirection::Forward,
        messages: Vec::new(),
        read_next: all_read_next(
            Arc::downgrade(inner),
            NextCursor::Position(from),
            ReadDirection::Forward,
            max_count,
            prefetch,
        ),
    }
}

/// Stream-read counterpart of [`seed_all_page`]
pub(crate) fn seed_stream_page<S: StreamStorage>(
    inner: &Arc<StoreInner<S>>,
    stream_id: StreamId,
    from: i32,
    max_count: usize,
    prefetch: bool,
) -> ReadStreamPage {
    let read_next = stream_read_next(
        Arc::downgrade(inner),
        stream_id.clone(),
        NextCursor::Position(from),
        ReadDirection::Forward,
        max_count,
        prefetch,
    );
    ReadStreamPage {
        stream_id,
        status: StreamReadStatus::Found,
        from_version: from,
        next_version: from,
        last_version: -1,
        last_position: -1,
        is_end: false,
        direction: ReadDirection::Forward,
        messages: Vec::new(),
        read_next,
    }
}
