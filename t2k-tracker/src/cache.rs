//! Expiring cache
//!
//! Thin wrapper over `moka`'s async cache with a fixed time-to-live. A zero
//! TTL disables caching entirely: every `get` misses and `insert` is a no-op.

use moka::future::Cache;
use std::hash::Hash;
use std::time::Duration;

/// Upper bound on cached entries
const MAX_ENTRIES: u64 = 10_000;

pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: Option<Cache<K, V>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(ttl: Duration) -> Self {
        let entries = (!ttl.is_zero()).then(|| {
            Cache::builder()
                .max_capacity(MAX_ENTRIES)
                .time_to_live(ttl)
                .build()
        });
        Self { ttl, entries }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh value for `key`; expired entries are never returned
    pub async fn get(&self, key: &K) -> Option<V> {
        self.entries.as_ref()?.get(key).await
    }

    /// Store `value`, restarting its time-to-live
    pub async fn insert(&self, key: K, value: V) {
        if let Some(entries) = &self.entries {
            entries.insert(key, value).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_value_expires_after_ttl() {
        let cache = TtlCache::new(Duration::from_millis(200));
        cache.insert("now", 1).await;
        assert_eq!(cache.get(&"now").await, Some(1));

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(cache.get(&"now").await, None);
    }

    #[tokio::test]
    async fn test_reinsert_replaces_value() {
        let cache = TtlCache::new(Duration::from_secs(30));
        cache.insert("k", "old").await;
        cache.insert("k", "new").await;
        assert_eq!(cache.get(&"k").await, Some("new"));
    }

    #[tokio::test]
    async fn test_zero_ttl_never_caches() {
        let cache = TtlCache::new(Duration::ZERO);
        cache.insert("k", 1).await;
        assert_eq!(cache.get(&"k").await, None);
        assert_eq!(cache.ttl(), Duration::ZERO);
    }
}
