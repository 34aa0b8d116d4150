//! Store configuration

use std::sync::Arc;
use std::time::Duration;

use rill_storage::{Clock, SystemClock};

/// Stream store configuration
#[derive(Debug, Clone)]
pub struct StreamStoreConfig {
    /// How long a cached per-stream max-age value stays valid
    pub metadata_cache_expiry: Duration,
    /// Maximum number of streams the metadata cache holds before evicting
    /// the least-recently-used entry
    pub metadata_cache_max_size: usize,
    /// Delay before re-reading a forward all-page that contains position
    /// gaps, to let in-flight writer transactions resolve
    pub gap_reload_interval: Duration,
    /// How often the head notifier polls the engine for new messages
    pub poll_interval: Duration,
    /// Name included in log lines, to tell stores apart
    pub log_name: String,
    /// UTC time source used for metadata caching and expiry decisions
    pub clock: Arc<dyn Clock>,
}

impl Default for StreamStoreConfig {
    fn default() -> Self {
        Self {
            metadata_cache_expiry: Duration::from_secs(60),
            metadata_cache_max_size: 10_000,
            gap_reload_interval: Duration::from_secs(3),
            poll_interval: Duration::from_secs(1),
            log_name: "stream-store".to_string(),
            clock: Arc::new(SystemClock),
        }
    }
}
