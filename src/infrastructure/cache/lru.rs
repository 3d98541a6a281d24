//! Thread-safe LRU cache with per-entry TTL
//!
//! Capacity is a hard bound: inserting past it evicts the least-recently
//! used entry. Expired entries miss and are removed the moment a lookup
//! touches them; a periodic sweep reclaims the rest.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    expires_at: Instant,
    seq: u64,
}

struct Inner<V> {
    items: HashMap<String, Entry<V>>,
    // Recency order: lowest sequence number = least recently used.
    order: BTreeMap<u64, String>,
    next_seq: u64,
    hits: u64,
    misses: u64,
}

/// Cache statistics
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub size: usize,
    pub capacity: usize,
}

pub struct LruTtlCache<V> {
    inner: Mutex<Inner<V>>,
    capacity: usize,
}

impl<V: Clone> LruTtlCache<V> {
    /// Create a cache with the given capacity (0 falls back to 1000).
    pub fn new(capacity: usize) -> Self {
        let capacity = if capacity == 0 { 1000 } else { capacity };
        Self {
            inner: Mutex::new(Inner {
                items: HashMap::new(),
                order: BTreeMap::new(),
                next_seq: 0,
                hits: 0,
                misses: 0,
            }),
            capacity,
        }
    }

    /// Retrieve a value. An expired entry counts as a miss and is removed.
    /// A valid hit moves the entry to most-recently-used.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut inner = self.inner.lock().unwrap();
        let now = Instant::now();

        let found = match inner.items.get(key) {
            None => None,
            Some(entry) if now >= entry.expires_at => Some((None, entry.seq)),
            Some(entry) => Some((Some(entry.value.clone()), entry.seq)),
        };

        match found {
            None => {
                inner.misses += 1;
                None
            }
            Some((None, seq)) => {
                // Expired: removed on sight
                inner.items.remove(key);
                inner.order.remove(&seq);
                inner.misses += 1;
                None
            }
            Some((Some(value), old_seq)) => {
                let new_seq = inner.next_seq;
                inner.next_seq += 1;
                inner.order.remove(&old_seq);
                inner.order.insert(new_seq, key.to_string());
                if let Some(entry) = inner.items.get_mut(key) {
                    entry.seq = new_seq;
                }
                inner.hits += 1;
                Some(value)
            }
        }
    }

    /// Insert or update a value with an absolute expiry of `now + ttl`.
    /// Updating an existing key refreshes its recency.
    pub fn set(&self, key: &str, value: V, ttl: Duration) {
        let mut inner = self.inner.lock().unwrap();
        let expires_at = Instant::now() + ttl;

        let seq = inner.next_seq;
        inner.next_seq += 1;

        if let Some(old) = inner.items.insert(
            key.to_string(),
            Entry {
                value,
                expires_at,
                seq,
            },
        ) {
            inner.order.remove(&old.seq);
        }
        inner.order.insert(seq, key.to_string());

        // Hard capacity bound: drop the least recently used entry.
        if inner.items.len() > self.capacity {
            let lru_seq = inner.order.keys().next().copied();
            if let Some(lru_seq) = lru_seq {
                if let Some(lru_key) = inner.order.remove(&lru_seq) {
                    inner.items.remove(&lru_key);
                }
            }
        }
    }

    pub fn delete(&self, key: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(entry) = inner.items.remove(key) {
            inner.order.remove(&entry.seq);
        }
    }

    /// Drop all entries and reset the counters.
    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.items.clear();
        inner.order.clear();
        inner.hits = 0;
        inner.misses = 0;
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock().unwrap();
        let total = inner.hits + inner.misses;
        let hit_rate = if total > 0 {
            inner.hits as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            hit_rate,
            size: inner.items.len(),
            capacity: self.capacity,
        }
    }

    /// Remove every expired entry; returns how many were dropped.
    /// Intended to run on a ticker from the cache manager.
    pub fn cleanup(&self) -> usize {
        let mut inner = self.inner.lock().unwrap();
        let now = Instant::now();

        let expired: Vec<(String, u64)> = inner
            .items
            .iter()
            .filter(|(_, e)| now >= e.expires_at)
            .map(|(k, e)| (k.clone(), e.seq))
            .collect();

        for (key, seq) in &expired {
            inner.items.remove(key);
            inner.order.remove(seq);
        }

        expired.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    #[test]
    fn test_get_set() {
        let cache = LruTtlCache::new(10);
        cache.set("a", 1, TTL);
        assert_eq!(cache.get("a"), Some(1));
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_expiry_removes_on_sight() {
        let cache = LruTtlCache::new(10);
        cache.set("a", 1, Duration::from_millis(10));
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.get("a"), None);
        // The expired entry was removed, not just hidden
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_lru_eviction() {
        let cache = LruTtlCache::new(3);
        cache.set("a", 1, TTL);
        cache.set("b", 2, TTL);
        cache.set("c", 3, TTL);

        // Touch "a" so "b" becomes least recently used
        assert_eq!(cache.get("a"), Some(1));
        cache.set("d", 4, TTL);

        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("a"), Some(1));
        assert_eq!(cache.get("c"), Some(3));
        assert_eq!(cache.get("d"), Some(4));
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_update_existing_key_keeps_size() {
        let cache = LruTtlCache::new(2);
        cache.set("a", 1, TTL);
        cache.set("a", 2, TTL);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a"), Some(2));
    }

    #[test]
    fn test_update_refreshes_recency() {
        let cache = LruTtlCache::new(2);
        cache.set("a", 1, TTL);
        cache.set("b", 2, TTL);
        // Re-setting "a" makes "b" the LRU entry
        cache.set("a", 10, TTL);
        cache.set("c", 3, TTL);
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("a"), Some(10));
    }

    #[test]
    fn test_delete_and_clear() {
        let cache = LruTtlCache::new(10);
        cache.set("a", 1, TTL);
        cache.set("b", 2, TTL);
        cache.delete("a");
        assert_eq!(cache.get("a"), None);
        cache.clear();
        assert!(cache.is_empty());
        let stats = cache.stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
    }

    #[test]
    fn test_stats_counters() {
        let cache = LruTtlCache::new(10);
        cache.set("a", 1, TTL);
        cache.get("a");
        cache.get("a");
        cache.get("missing");

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate - 66.666).abs() < 0.01);
        assert_eq!(stats.size, 1);
        assert_eq!(stats.capacity, 10);
    }

    #[test]
    fn test_cleanup_sweeps_expired() {
        let cache = LruTtlCache::new(10);
        cache.set("old1", 1, Duration::from_millis(5));
        cache.set("old2", 2, Duration::from_millis(5));
        cache.set("fresh", 3, TTL);
        std::thread::sleep(Duration::from_millis(20));

        assert_eq!(cache.cleanup(), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("fresh"), Some(3));
    }

    #[test]
    fn test_zero_capacity_falls_back() {
        let cache: LruTtlCache<i32> = LruTtlCache::new(0);
        assert_eq!(cache.stats().capacity, 1000);
    }
}
