//! Message expiry filtering
//!
//! Read results pass through here before they are returned to callers.
//! Messages older than their stream's max age are dropped from the page and
//! handed back to the engine for physical purge. Cursor fields are never
//! touched, so a filtered page can be short or empty while `is_end` is still
//! false; callers loop with `read_next` until `is_end`.

use tracing::{debug, warn};

use rill_storage::{Clock, Message, StreamStorage};

use crate::error::StoreResult;
use crate::metadata_cache::MaxAgeCache;

/// Drop expired messages and request their purge.
///
/// System streams (`$`-prefixed) are never filtered. Purge requests are
/// fire-and-forget: failures are logged, not surfaced.
pub(crate) async fn filter_expired<S: StreamStorage>(
    engine: &S,
    cache: &MaxAgeCache,
    clock: &dyn Clock,
    log_name: &str,
    messages: Vec<Message>,
) -> StoreResult<Vec<Message>> {
    let mut kept = Vec::with_capacity(messages.len());
    for message in messages {
        if message.stream_id.is_system() {
            kept.push(message);
            continue;
        }

        let Some(max_age) = cache.max_age(engine, &message.stream_id).await? else {
            kept.push(message);
            continue;
        };

        let expires_at = message.created_utc + chrono::Duration::seconds(i64::from(max_age));
        if expires_at > clock.utc_now() {
            kept.push(message);
            continue;
        }

        debug!(
            store = %log_name,
            stream = %message.stream_id,
            version = message.stream_version,
            "dropping expired message and requesting purge"
        );
        let engine = engine.clone();
        let log_name = log_name.to_string();
        tokio::spawn(async move {
            if let Err(error) = engine.purge_expired_message(&message).await {
                warn!(
                    store = %log_name,
                    stream = %message.stream_id,
                    version = message.stream_version,
                    %error,
                    "failed to purge expired message"
                );
            }
        });
    }
    Ok(kept)
}
