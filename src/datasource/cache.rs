//! Option List Cache
//!
//! Keeps resolved option lists per cache key. Expiry is checked lazily on
//! read; dependency changes evict eagerly by source id.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use super::types::SelectOption;

#[derive(Debug, Clone)]
pub struct CacheItem {
    pub key: String,
    /// Source that wrote the entry, used for targeted eviction.
    pub source_id: String,
    pub data: Vec<SelectOption>,
    pub timestamp: Instant,
}

impl CacheItem {
    /// Stale strictly after `ttl` has elapsed since the write.
    pub fn is_expired(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.timestamp) > ttl
    }
}

/// Cheap to clone; clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct CacheStore {
    entries: Arc<Mutex<HashMap<String, CacheItem>>>,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, CacheItem>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: &str, ttl: Duration) -> Option<Vec<SelectOption>> {
        self.get_at(key, ttl, Instant::now())
    }

    /// Read `key` as of `now`, dropping the entry if it has expired.
    pub fn get_at(&self, key: &str, ttl: Duration, now: Instant) -> Option<Vec<SelectOption>> {
        let mut entries = self.entries();
        let expired = entries.get(key)?.is_expired(ttl, now);
        if expired {
            tracing::debug!("Cache entry {} expired", key);
            entries.remove(key);
            return None;
        }
        entries.get(key).map(|item| item.data.clone())
    }

    pub fn set(&self, key: &str, source_id: &str, data: Vec<SelectOption>) {
        self.entries().insert(
            key.to_string(),
            CacheItem {
                key: key.to_string(),
                source_id: source_id.to_string(),
                data,
                timestamp: Instant::now(),
            },
        );
    }

    pub fn remove(&self, key: &str) -> bool {
        self.entries().remove(key).is_some()
    }

    /// Drop every entry written by `source_id`, whatever parameters it was
    /// resolved with. Returns the number of entries removed.
    pub fn evict_source(&self, source_id: &str) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, item| item.source_id != source_id);
        before - entries.len()
    }

    pub fn clear(&self) {
        self.entries().clear();
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> Vec<SelectOption> {
        vec![SelectOption::new("a", "A")]
    }

    #[test]
    fn test_cache_get_set() {
        let cache = CacheStore::new();
        cache.set("k", "src", options());
        assert_eq!(cache.get("k", Duration::from_secs(60)), Some(options()));
    }

    #[test]
    fn test_cache_miss_different_key() {
        let cache = CacheStore::new();
        cache.set("k1", "src", options());
        assert!(cache.get("k2", Duration::from_secs(60)).is_none());
    }

    #[test]
    fn test_expired_entry_is_evicted_on_read() {
        let cache = CacheStore::new();
        cache.set("k", "src", options());
        let ttl = Duration::from_secs(300);
        let later = Instant::now() + Duration::from_secs(301);

        assert!(cache.get_at("k", ttl, later).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_entry_at_exact_ttl_is_fresh() {
        let item = CacheItem {
            key: "k".into(),
            source_id: "s".into(),
            data: vec![],
            timestamp: Instant::now(),
        };
        let ttl = Duration::from_secs(10);
        assert!(!item.is_expired(ttl, item.timestamp + ttl));
        assert!(item.is_expired(ttl, item.timestamp + ttl + Duration::from_millis(1)));
    }

    #[test]
    fn test_evict_source_removes_all_variants() {
        let cache = CacheStore::new();
        cache.set("amis:region=eu-west-1", "amis", options());
        cache.set("amis:region=us-east-1", "amis", options());
        cache.set("zones:", "zones", options());

        assert_eq!(cache.evict_source("amis"), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_clear() {
        let cache = CacheStore::new();
        cache.set("k", "src", options());
        cache.clear();
        assert!(cache.get("k", Duration::from_secs(60)).is_none());
    }
}
