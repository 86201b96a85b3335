//! Two-layer cache for conversation lists and message sequences.
//!
//! Entries live in an in-memory map and, best-effort, in the durable local
//! store so a fresh session can serve recently-fetched data without a round
//! trip. Every entry is wrapped in a versioned envelope.
//!
//! # Invalidation
//! An entry is discarded when:
//! - `CACHE_SCHEMA_VERSION` differs (code change altered the stored types)
//! - the envelope is missing or undeserializable
//! - it is older than the `max_age` passed to [`MessageCache::get`]
//!
//! Expired entries are purged from both layers on access and never returned.
//! The cache is an optimization only: a miss must always be answerable by
//! re-querying the document store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::local::LocalStore;

/// Increment whenever the serialized shape of a cached payload changes.
/// Old envelopes are then silently discarded instead of misread.
pub const CACHE_SCHEMA_VERSION: u32 = 1;

/// Versioned envelope wrapping a cached payload in the durable layer.
#[derive(Serialize, Deserialize)]
struct CacheEnvelope<T> {
    schema_version: u32,
    /// Unix milliseconds when this entry was written.
    saved_at_ms: u64,
    payload: T,
}

/// Time source, injectable so tests can advance a simulated clock.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

struct MemoryEntry<T> {
    saved_at_ms: u64,
    payload: T,
}

pub struct MessageCache<T> {
    entries: Mutex<HashMap<String, MemoryEntry<T>>>,
    durable: Arc<dyn LocalStore>,
    clock: Arc<dyn Clock>,
}

impl<T> MessageCache<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    pub fn new(durable: Arc<dyn LocalStore>) -> Self {
        Self::with_clock(durable, Arc::new(SystemClock))
    }

    pub fn with_clock(durable: Arc<dyn LocalStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            durable,
            clock,
        }
    }

    /// Store `payload` under `key` in memory and, best-effort, durably.
    /// A durable-layer failure is logged and otherwise ignored.
    pub fn put(&self, key: &str, payload: T) {
        let saved_at_ms = self.clock.now_ms();

        let envelope = CacheEnvelope {
            schema_version: CACHE_SCHEMA_VERSION,
            saved_at_ms,
            payload: payload.clone(),
        };
        match bincode::serialize(&envelope) {
            Ok(bytes) => {
                if let Err(e) = self.durable.set(key, &bytes) {
                    tracing::warn!("cache: durable write failed for {key}: {e}");
                }
            }
            Err(e) => {
                tracing::warn!("cache: envelope encode failed for {key}: {e}");
            }
        }

        self.entries.lock().insert(
            key.to_string(),
            MemoryEntry {
                saved_at_ms,
                payload,
            },
        );
    }

    /// Fetch `key` if present and no older than `max_age`.
    ///
    /// Checks the in-memory layer first, then the durable store. An entry
    /// past `max_age` (or with a mismatched schema version) is purged from
    /// both layers and `None` is returned.
    pub fn get(&self, key: &str, max_age: Duration) -> Option<T> {
        let now = self.clock.now_ms();
        let max_age_ms = max_age.as_millis() as u64;

        {
            let mut entries = self.entries.lock();
            if let Some(entry) = entries.get(key) {
                if now.saturating_sub(entry.saved_at_ms) <= max_age_ms {
                    return Some(entry.payload.clone());
                }
                tracing::debug!("cache: {key} expired in memory — purging");
                entries.remove(key);
                self.remove_durable(key);
                return None;
            }
        }

        let bytes = match self.durable.get(key) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("cache: durable read failed for {key}: {e}");
                return None;
            }
        };

        let envelope: CacheEnvelope<T> = match bincode::deserialize(&bytes) {
            Ok(env) => env,
            Err(_) => {
                // Corrupt or written by an incompatible build
                self.remove_durable(key);
                return None;
            }
        };

        if envelope.schema_version != CACHE_SCHEMA_VERSION {
            tracing::debug!(
                "cache: {key} schema mismatch (stored={} current={}) — discarding",
                envelope.schema_version,
                CACHE_SCHEMA_VERSION
            );
            self.remove_durable(key);
            return None;
        }

        if now.saturating_sub(envelope.saved_at_ms) > max_age_ms {
            tracing::debug!("cache: {key} expired in durable layer — purging");
            self.remove_durable(key);
            return None;
        }

        // Promote to the in-memory layer for subsequent reads
        self.entries.lock().insert(
            key.to_string(),
            MemoryEntry {
                saved_at_ms: envelope.saved_at_ms,
                payload: envelope.payload.clone(),
            },
        );
        Some(envelope.payload)
    }

    /// Drop `key` from both layers. Used after a known-fresh write, forcing
    /// the next read to hit the document store or the live subscription.
    pub fn invalidate(&self, key: &str) {
        self.entries.lock().remove(key);
        self.remove_durable(key);
    }

    /// Drop everything from both layers.
    pub fn clear(&self) {
        self.entries.lock().clear();
        if let Err(e) = self.durable.clear() {
            tracing::warn!("cache: durable clear failed: {e}");
        }
    }

    fn remove_durable(&self, key: &str) {
        if let Err(e) = self.durable.remove(key) {
            tracing::warn!("cache: durable remove failed for {key}: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::local::MemoryLocalStore;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Manually-advanced clock shared between test and cache.
    struct ManualClock(AtomicU64);

    impl ManualClock {
        fn advance(&self, ms: u64) {
            self.0.fetch_add(ms, Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now_ms(&self) -> u64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    fn cache_with_clock() -> (MessageCache<Vec<String>>, Arc<ManualClock>, Arc<MemoryLocalStore>) {
        let clock = Arc::new(ManualClock(AtomicU64::new(1_000_000)));
        let durable = Arc::new(MemoryLocalStore::new());
        let cache = MessageCache::with_clock(
            durable.clone() as Arc<dyn LocalStore>,
            clock.clone() as Arc<dyn Clock>,
        );
        (cache, clock, durable)
    }

    #[test]
    fn test_put_then_get_within_max_age() {
        let (cache, _clock, _durable) = cache_with_clock();
        cache.put("k", vec!["a".to_string(), "b".to_string()]);

        let got = cache.get("k", Duration::from_millis(5000));
        assert_eq!(got, Some(vec!["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn test_expired_entry_is_purged_from_both_layers() {
        let (cache, clock, durable) = cache_with_clock();
        cache.put("k", vec!["a".to_string()]);

        clock.advance(5001);
        assert_eq!(cache.get("k", Duration::from_millis(5000)), None);

        // The purge must also have removed the durable copy, so a later get
        // cannot re-find it there.
        assert_eq!(durable.get("k").unwrap(), None);
        assert_eq!(cache.get("k", Duration::from_millis(5000)), None);
    }

    #[test]
    fn test_durable_layer_survives_memory_loss() {
        let (cache, clock, durable) = cache_with_clock();
        cache.put("k", vec!["a".to_string()]);

        // A new cache instance over the same durable store simulates a
        // fresh session: the in-memory layer is empty.
        let revived = MessageCache::<Vec<String>>::with_clock(
            durable.clone() as Arc<dyn LocalStore>,
            clock.clone() as Arc<dyn Clock>,
        );
        assert_eq!(
            revived.get("k", Duration::from_millis(5000)),
            Some(vec!["a".to_string()])
        );
    }

    #[test]
    fn test_schema_version_mismatch_discards() {
        let (cache, clock, durable) = cache_with_clock();

        let stale = CacheEnvelope {
            schema_version: CACHE_SCHEMA_VERSION + 1,
            saved_at_ms: clock.now_ms(),
            payload: vec!["a".to_string()],
        };
        durable.set("k", &bincode::serialize(&stale).unwrap()).unwrap();

        assert_eq!(cache.get("k", Duration::from_millis(5000)), None);
        assert_eq!(durable.get("k").unwrap(), None);
    }

    #[test]
    fn test_corrupt_envelope_discards() {
        let (cache, _clock, durable) = cache_with_clock();
        durable.set("k", b"not an envelope").unwrap();

        assert_eq!(cache.get("k", Duration::from_millis(5000)), None);
        assert_eq!(durable.get("k").unwrap(), None);
    }

    #[test]
    fn test_invalidate_removes_both_layers() {
        let (cache, _clock, durable) = cache_with_clock();
        cache.put("k", vec!["a".to_string()]);

        cache.invalidate("k");
        assert_eq!(cache.get("k", Duration::from_millis(5000)), None);
        assert_eq!(durable.get("k").unwrap(), None);
    }

    #[test]
    fn test_clear_removes_everything() {
        let (cache, _clock, durable) = cache_with_clock();
        cache.put("a", vec!["1".to_string()]);
        cache.put("b", vec!["2".to_string()]);

        cache.clear();
        assert_eq!(cache.get("a", Duration::from_millis(5000)), None);
        assert_eq!(cache.get("b", Duration::from_millis(5000)), None);
        assert_eq!(durable.get("a").unwrap(), None);
        assert_eq!(durable.get("b").unwrap(), None);
    }

    #[test]
    fn test_durable_failure_degrades_to_miss() {
        // A store whose reads always fail: the cache must treat that as a
        // miss, never an error.
        struct FailingStore;
        impl LocalStore for FailingStore {
            fn get(&self, _: &str) -> Result<Option<Vec<u8>>, crate::store::local::LocalStoreError> {
                Err(rusqlite::Error::InvalidQuery.into())
            }
            fn set(&self, _: &str, _: &[u8]) -> Result<(), crate::store::local::LocalStoreError> {
                Err(rusqlite::Error::InvalidQuery.into())
            }
            fn remove(&self, _: &str) -> Result<(), crate::store::local::LocalStoreError> {
                Err(rusqlite::Error::InvalidQuery.into())
            }
            fn clear(&self) -> Result<(), crate::store::local::LocalStoreError> {
                Err(rusqlite::Error::InvalidQuery.into())
            }
        }

        let cache: MessageCache<Vec<String>> = MessageCache::new(Arc::new(FailingStore));
        // put still lands in memory
        cache.put("k", vec!["a".to_string()]);
        assert_eq!(
            cache.get("k", Duration::from_millis(5000)),
            Some(vec!["a".to_string()])
        );
        assert_eq!(cache.get("missing", Duration::from_millis(5000)), None);
    }
}
