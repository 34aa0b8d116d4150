//! Position gap reconciliation for forward all-stream reads
//!
//! Global positions are assigned at commit and are not dense: a writer
//! transaction that reserved a position may still be in flight when a later
//! position commits, or may have rolled back entirely. A forward all-read
//! that lands on such a hole cannot tell the two cases apart from a single
//! observation, so the page is re-read after a delay. A position that is
//! still missing across two observations separated by the reload interval is
//! ruled permanently absent.
//!
//! Reverse all-reads and stream reads never reconcile: stream versions are
//! dense, and backward all-reads tolerate gaps by definition.

use std::collections::HashSet;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use rill_storage::{AllReadResult, Message, StreamStorage};

use crate::error::StoreResult;
use crate::util;

/// Read a forward all-page, reconciling transient position gaps.
///
/// Each reload re-reads from the original `from_position_inclusive`, never
/// from a later cursor. The loop terminates once no *fresh* missing
/// positions remain: positions observed missing twice are demoted to
/// permanent and no longer trigger reloads, bounding the iteration count by
/// the size of the initial gap set plus one.
pub(crate) async fn read_all_forwards_reconciled<S: StreamStorage>(
    engine: &S,
    from_position_inclusive: i64,
    max_count: usize,
    prefetch: bool,
    reload_interval: Duration,
    token: &CancellationToken,
    log_name: &str,
) -> StoreResult<AllReadResult> {
    let mut page = util::engine_call(
        engine.read_all_forwards(from_position_inclusive, max_count, prefetch),
        token,
    )
    .await?;

    // Gaps at the tail of a non-terminal page, or in tiny pages, would be
    // spurious to reconcile
    if !page.is_end || page.messages.len() <= 1 {
        return Ok(page);
    }

    let mut previous_missing: HashSet<i64> = HashSet::new();

    if page.messages[0].position != from_position_inclusive {
        debug!(
            store = %log_name,
            from = from_position_inclusive,
            first = page.messages[0].position,
            "gap at page head, reloading"
        );
        previous_missing.insert(from_position_inclusive);
        util::sleep_cancellable(reload_interval, token).await?;
        page = util::engine_call(
            engine.read_all_forwards(from_position_inclusive, max_count, prefetch),
            token,
        )
        .await?;
    }

    loop {
        let current_missing = missing_positions(&page.messages);
        let fresh: HashSet<i64> = current_missing
            .difference(&previous_missing)
            .copied()
            .collect();
        if fresh.is_empty() {
            // Remaining gaps have been observed twice: persistent rollbacks
            return Ok(page);
        }

        debug!(
            store = %log_name,
            from = from_position_inclusive,
            fresh = fresh.len(),
            "position gaps observed, reloading"
        );
        previous_missing = current_missing;
        util::sleep_cancellable(reload_interval, token).await?;
        page = util::engine_call(
            engine.read_all_forwards(from_position_inclusive, max_count, prefetch),
            token,
        )
        .await?;
    }
}

/// Positions absent between consecutive messages of a page
fn missing_positions(messages: &[Message]) -> HashSet<i64> {
    let mut missing = HashSet::new();
    for pair in messages.windows(2) {
        for position in pair[0].position + 1..pair[1].position {
            missing.insert(position);
        }
    }
    missing
}
