//! Error types for the readonly store layer

use rill_storage::StorageError;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Boxed error returned by subscriber callbacks
pub type BoxDynError = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced by the readonly store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Invalid argument (bad id, out-of-range cursor, non-positive count)
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation on a disposed store or subscription
    #[error("stream store has been disposed")]
    Disposed,

    /// Cooperative cancellation
    #[error("operation was cancelled")]
    Cancelled,

    /// Delegated failure from the storage engine
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A subscriber callback failed
    #[error("subscriber callback failed: {0}")]
    Subscriber(#[source] BoxDynError),
}

/// Why a subscription terminated
///
/// Passed to [`SubscriptionHandler::dropped`](crate::SubscriptionHandler::dropped),
/// which fires exactly once per subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionDroppedReason {
    /// The subscription was unsubscribed, the handler requested a stop, or
    /// the owning store was disposed
    Disposed,
    /// A storage failure that retrying reads could not resolve
    StorageError,
    /// The subscriber callback returned an error
    SubscriberError,
}
