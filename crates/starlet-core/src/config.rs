use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants;
use crate::messaging::RetryPolicy;

#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub data_dir: PathBuf,
    pub feed: FeedConfig,
    pub cache: CacheConfig,
    pub retry: RetryPolicy,
}

/// Settings for the listing feed.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Size of the featured grid; the merged feed is truncated to this.
    pub max_results: usize,
    /// Per-tier query limit. Each tier fetches at most this many documents.
    pub per_tier_limit: usize,
}

/// Maximum ages for the two cache key classes.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub conversations_max_age: Duration,
    pub messages_max_age: Duration,
}

impl CoreConfig {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            feed: FeedConfig::default(),
            cache: CacheConfig::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .map(|d| d.join("starlet"))
            .unwrap_or_else(|| PathBuf::from("starlet_data"));
        Self::new(data_dir)
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            max_results: constants::FEED_MAX_RESULTS,
            per_tier_limit: constants::FEED_MAX_RESULTS,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            conversations_max_age: Duration::from_secs(constants::CONVERSATIONS_CACHE_MAX_AGE_SECS),
            messages_max_age: Duration::from_secs(constants::MESSAGES_CACHE_MAX_AGE_SECS),
        }
    }
}
