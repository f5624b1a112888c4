//! Capacity-bounded LRU cache.

use std::collections::HashMap;
use std::hash::Hash;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{error, trace};

use super::recency_list::{NodeId, RecencyList};

/// Raised when the map and the recency list disagree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cache invariant violated: {0}")]
pub struct InvariantViolation(pub String);

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// `get` calls that found their key.
    pub hits: u64,
    /// `get` calls that missed.
    pub misses: u64,
    /// `set` calls that inserted a new key.
    pub insertions: u64,
    /// `set` calls that overwrote an existing key.
    pub updates: u64,
    /// Entries dropped to stay within capacity.
    pub evictions: u64,
    /// Current number of entries.
    pub len: usize,
    /// Configured capacity.
    pub capacity: usize,
}

impl CacheStats {
    /// Hit rate as a percentage of all lookups.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Cache: {}/{} entries, {:.1}% hit rate ({} hits, {} misses, {} evictions)",
            self.len,
            self.capacity,
            self.hit_rate(),
            self.hits,
            self.misses,
            self.evictions
        )
    }
}

struct Entry<V> {
    value: V,
    node: NodeId,
}

struct Inner<K, V> {
    map: HashMap<K, Entry<V>>,
    list: RecencyList<K>,
    stats: CacheStats,
}

impl<K, V> Inner<K, V> {
    fn check_sizes(&self) {
        if self.map.len() != self.list.len() {
            error!(
                map_len = self.map.len(),
                list_len = self.list.len(),
                "Cache map and recency list out of sync"
            );
            debug_assert_eq!(self.map.len(), self.list.len(), "cache map/list size mismatch");
        }
    }
}

/// Thread-safe LRU cache holding at most `capacity` entries.
///
/// Every operation, lookups included, runs under one mutex because a hit
/// relinks the recency list. A capacity of 0 disables caching: `set` succeeds
/// and the entry is evicted immediately.
pub struct BoundedLruCache<K, V> {
    capacity: usize,
    inner: Mutex<Inner<K, V>>,
}

impl<K, V> BoundedLruCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Creates a cache holding at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(Inner {
                map: HashMap::with_capacity(capacity),
                list: RecencyList::with_capacity(capacity),
                stats: CacheStats {
                    capacity,
                    ..CacheStats::default()
                },
            }),
        }
    }

    /// Returns the value for `key`, marking it most recently used.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        if let Some(entry) = inner.map.get(key) {
            inner.list.move_to_front(entry.node);
            inner.stats.hits += 1;
            trace!("Cache hit");
            Some(entry.value.clone())
        } else {
            inner.stats.misses += 1;
            trace!("Cache miss");
            None
        }
    }

    /// Returns the value for `key` without touching recency or counters.
    pub fn peek(&self, key: &K) -> Option<V> {
        self.inner.lock().map.get(key).map(|e| e.value.clone())
    }

    /// Inserts or overwrites `key`, marking it most recently used.
    ///
    /// Returns `true` if the key was already present. Inserting past capacity
    /// evicts exactly one entry, the least recently used.
    pub fn set(&self, key: K, value: V) -> bool {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        if let Some(entry) = inner.map.get_mut(&key) {
            entry.value = value;
            inner.list.move_to_front(entry.node);
            inner.stats.updates += 1;
            return true;
        }

        let node = inner.list.push_front(key.clone());
        inner.map.insert(key, Entry { value, node });
        inner.stats.insertions += 1;

        if inner.list.len() > self.capacity
            && let Some(evicted) = inner.list.pop_back()
        {
            inner.map.remove(&evicted);
            inner.stats.evictions += 1;
            trace!("Evicted least recently used entry");
        }

        inner.stats.len = inner.map.len();
        inner.check_sizes();
        false
    }

    /// Removes `key` and returns its value.
    pub fn remove(&self, key: &K) -> Option<V> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let entry = inner.map.remove(key)?;
        inner.list.remove(entry.node);
        inner.stats.len = inner.map.len();
        inner.check_sizes();
        Some(entry.value)
    }

    /// Drops every entry. Counters other than `len` are kept.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.map.clear();
        inner.list.clear();
        inner.stats.len = 0;
    }

    /// Current number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().map.len()
    }

    /// Returns true if the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Keys from most to least recently used.
    #[must_use]
    pub fn keys(&self) -> Vec<K> {
        self.inner.lock().list.iter().map(|(_, k)| k.clone()).collect()
    }

    /// Returns a snapshot of the counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats
    }

    /// Constant-time consistency check: map and list sizes agree and the
    /// capacity bound holds.
    ///
    /// # Errors
    /// Returns [`InvariantViolation`] if either condition fails.
    pub fn check(&self) -> Result<(), InvariantViolation> {
        let inner = self.inner.lock();
        if inner.map.len() != inner.list.len() || inner.map.len() > self.capacity {
            return Err(InvariantViolation(format!(
                "map={} list={} capacity={}",
                inner.map.len(),
                inner.list.len(),
                self.capacity
            )));
        }
        Ok(())
    }

    /// Walks the whole structure and checks that every list node has exactly
    /// one map entry pointing back at it and vice versa.
    ///
    /// # Errors
    /// Returns [`InvariantViolation`] describing the first inconsistency.
    pub fn verify(&self) -> Result<(), InvariantViolation> {
        let inner = self.inner.lock();

        if inner.map.len() != inner.list.len() {
            return Err(InvariantViolation(format!(
                "map holds {} entries but list holds {}",
                inner.map.len(),
                inner.list.len()
            )));
        }
        if inner.map.len() > self.capacity {
            return Err(InvariantViolation(format!(
                "{} entries exceed capacity {}",
                inner.map.len(),
                self.capacity
            )));
        }

        let mut walked = 0usize;
        for (node, key) in inner.list.iter() {
            match inner.map.get(key) {
                Some(entry) if entry.node == node => walked += 1,
                Some(_) => {
                    return Err(InvariantViolation(
                        "map entry points at a different list node".to_string(),
                    ));
                }
                None => {
                    return Err(InvariantViolation(
                        "list node has no map entry".to_string(),
                    ));
                }
            }
        }
        if walked != inner.map.len() {
            return Err(InvariantViolation(format!(
                "walked {walked} list nodes but map holds {}",
                inner.map.len()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_get_and_set() {
        let cache = BoundedLruCache::new(2);

        assert!(!cache.set("a", 1));
        assert!(!cache.set("b", 2));

        assert_eq!(cache.get(&"a"), Some(1));
        assert_eq!(cache.get(&"b"), Some(2));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_eviction_drops_oldest() {
        let cache = BoundedLruCache::new(2);

        cache.set("A", 1);
        cache.set("B", 2);
        cache.set("C", 3);

        assert_eq!(cache.get(&"A"), None);
        assert_eq!(cache.get(&"B"), Some(2));
        assert_eq!(cache.get(&"C"), Some(3));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_get_promotes() {
        let cache = BoundedLruCache::new(2);

        cache.set(1, "a");
        cache.set(2, "b");
        let before = cache.len();
        cache.get(&1);
        assert_eq!(cache.len(), before);
        assert_eq!(cache.keys(), vec![1, 2]);

        cache.set(3, "c");

        assert_eq!(cache.get(&1), Some("a"));
        assert_eq!(cache.get(&2), None);
        assert_eq!(cache.get(&3), Some("c"));
    }

    #[test]
    fn test_set_existing_overwrites_and_promotes() {
        let cache = BoundedLruCache::new(2);

        cache.set(1, "a");
        cache.set(2, "b");
        assert!(cache.set(1, "z"));
        cache.set(3, "c");

        assert_eq!(cache.peek(&1), Some("z"));
        assert_eq!(cache.peek(&2), None);
        assert_eq!(cache.len(), 2);
        let stats = cache.stats();
        assert_eq!(stats.updates, 1);
        assert_eq!(stats.insertions, 3);
    }

    #[test]
    fn test_peek_does_not_promote() {
        let cache = BoundedLruCache::new(2);

        cache.set(1, "a");
        cache.set(2, "b");
        let _ = cache.peek(&1);
        cache.set(3, "c");

        assert_eq!(cache.peek(&1), None);
        assert_eq!(cache.stats().hits, 0);
    }

    #[test]
    fn test_retains_most_recent_keys() {
        let capacity = 5;
        let cache = BoundedLruCache::new(capacity);

        for i in 0..50 {
            cache.set(i, i * 10);
        }

        assert_eq!(cache.len(), capacity);
        assert_eq!(cache.keys(), vec![49, 48, 47, 46, 45]);
        cache.verify().unwrap();
    }

    #[test]
    fn test_interleaved_access_order() {
        let cache = BoundedLruCache::new(3);

        cache.set("a", 0);
        cache.set("b", 0);
        cache.set("c", 0);
        cache.get(&"a");
        cache.set("b", 1);
        cache.set("d", 0);

        assert_eq!(cache.keys(), vec!["d", "b", "a"]);
    }

    #[test]
    fn test_clear_misses_afterwards() {
        let cache = BoundedLruCache::new(3);

        cache.set("a", 1);
        cache.set("b", 2);
        cache.clear();

        assert!(cache.is_empty());
        assert_eq!(cache.get(&"a"), None);
        assert_eq!(cache.get(&"b"), None);
        cache.verify().unwrap();

        cache.set("a", 3);
        assert_eq!(cache.get(&"a"), Some(3));
    }

    #[test]
    fn test_remove() {
        let cache = BoundedLruCache::new(3);

        cache.set(1, "a");
        cache.set(2, "b");

        assert_eq!(cache.remove(&1), Some("a"));
        assert_eq!(cache.remove(&1), None);
        assert_eq!(cache.len(), 1);
        cache.verify().unwrap();
    }

    #[test]
    fn test_zero_capacity_disables_caching() {
        let cache = BoundedLruCache::new(0);

        assert!(!cache.set("a", 1));
        assert_eq!(cache.get(&"a"), None);
        assert!(cache.is_empty());
        assert_eq!(cache.stats().evictions, 1);
        cache.verify().unwrap();
    }

    #[test]
    fn test_stats_counting() {
        let cache = BoundedLruCache::new(4);

        cache.set("a", 1);
        let _ = cache.get(&"a");
        let _ = cache.get(&"missing");

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.insertions, 1);
        assert_eq!(stats.len, 1);
        assert_eq!(stats.capacity, 4);
        assert!((stats.hit_rate() - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_concurrent_access_keeps_structure_consistent() {
        let cache = Arc::new(BoundedLruCache::new(16));

        std::thread::scope(|scope| {
            for t in 0..8u64 {
                let cache = Arc::clone(&cache);
                scope.spawn(move || {
                    for i in 0..5_000u64 {
                        let key = (i * 7 + t) % 40;
                        if i % 3 == 0 {
                            let _ = cache.get(&key);
                        } else {
                            cache.set(key, i);
                        }
                        if i % 97 == 0 {
                            let _ = cache.remove(&((key + 1) % 40));
                        }
                        if i % 500 == 0 {
                            cache.verify().unwrap();
                        }
                    }
                });
            }
        });

        cache.verify().unwrap();
        assert!(cache.len() <= 16);
    }
}
