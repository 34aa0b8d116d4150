//! Small async helpers shared by the read path and the subscription runtime

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use rill_storage::StorageResult;

use crate::error::{StoreError, StoreResult};

/// Run an engine call, aborting with `Cancelled` if the token fires first
pub(crate) async fn engine_call<T>(
    call: impl Future<Output = StorageResult<T>>,
    token: &CancellationToken,
) -> StoreResult<T> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(StoreError::Cancelled),
        result = call => Ok(result?),
    }
}

/// Sleep, aborting with `Cancelled` if the token fires first
pub(crate) async fn sleep_cancellable(
    duration: Duration,
    token: &CancellationToken,
) -> StoreResult<()> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(StoreError::Cancelled),
        () = tokio::time::sleep(duration) => Ok(()),
    }
}
