use crate::profile::ProfileSummary;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;

/// Thread-safe LRU cache for neighbor-fetch results
///
/// Re-accepting an identifier whose neighbors were already fetched in this
/// process is served locally instead of hitting the proxy again. Uses LRU
/// eviction to keep memory bounded.
pub struct NeighborCache {
    cache: Mutex<LruCache<String, Vec<ProfileSummary>>>,
}

impl NeighborCache {
    /// Create a new neighbor cache with the specified capacity
    ///
    /// # Panics
    ///
    /// Panics if capacity is 0 (LRU cache requires non-zero capacity)
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1))
            .expect("Cache capacity must be at least 1");

        Self {
            cache: Mutex::new(LruCache::new(cap)),
        }
    }

    /// Get the cached neighbor list for an identifier
    pub fn get(&self, identifier: &str) -> Option<Vec<ProfileSummary>> {
        self.cache.lock().unwrap().get(identifier).cloned()
    }

    /// Store a neighbor list in the cache
    pub fn put(&self, identifier: String, neighbors: Vec<ProfileSummary>) {
        self.cache.lock().unwrap().put(identifier, neighbors);
    }

    /// Get the current number of cached entries
    pub fn len(&self) -> usize {
        self.cache.lock().unwrap().len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.cache.lock().unwrap().is_empty()
    }

    /// Clear all entries from the cache
    pub fn clear(&self) {
        self.cache.lock().unwrap().clear()
    }
}
