use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

/// Thread-safe LRU cache of resolved adjacency lists
///
/// Sits in front of the cache directory so hot titles (hubs reached from many
/// parents across searches) skip the file read. Lists are shared via `Arc`.
pub struct LinkMemoryCache {
    cache: Mutex<LruCache<String, Arc<Vec<String>>>>,
}

impl LinkMemoryCache {
    /// Create a new memory cache holding at most `capacity` titles
    ///
    /// A capacity of 0 is raised to 1.
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);

        Self {
            cache: Mutex::new(LruCache::new(cap)),
        }
    }

    /// Get the cached links for a title, promoting it in LRU order
    pub fn get(&self, title: &str) -> Option<Arc<Vec<String>>> {
        self.cache.lock().unwrap().get(title).cloned()
    }

    /// Store the links for a title
    pub fn put(&self, title: String, links: Arc<Vec<String>>) {
        self.cache.lock().unwrap().put(title, links);
    }

    /// Get the current number of cached titles
    pub fn len(&self) -> usize {
        self.cache.lock().unwrap().len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.cache.lock().unwrap().is_empty()
    }
}
