//! Link resolution: cache first, remote service on a miss, write-through.
//!
//! Remote failures never escape `resolve`: the title is degraded to a dead end
//! (no links) and the search carries on. Cache failures do escape, since a
//! broken cache directory would otherwise silently refetch everything.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::cache::AdjacencyCache;
use crate::error::Result;
use crate::remote::LinkSource;
use crate::title::normalize_title;

/// Counters describing where resolved adjacency lists came from
#[derive(Debug, Default)]
pub struct ResolverStats {
    cache_hits: AtomicUsize,
    remote_fetches: AtomicUsize,
    missing: AtomicUsize,
    degraded: AtomicUsize,
}

/// Point-in-time copy of [`ResolverStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolverSnapshot {
    pub cache_hits: usize,
    pub remote_fetches: usize,
    /// Titles the remote service reported as nonexistent.
    pub missing: usize,
    /// Titles treated as dead ends after a remote failure.
    pub degraded: usize,
}

impl ResolverStats {
    pub fn snapshot(&self) -> ResolverSnapshot {
        ResolverSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            remote_fetches: self.remote_fetches.load(Ordering::Relaxed),
            missing: self.missing.load(Ordering::Relaxed),
            degraded: self.degraded.load(Ordering::Relaxed),
        }
    }
}

/// Resolves a title to its outbound links.
///
/// Nonexistent articles resolve to an empty list and are not cached, so an
/// article created later is picked up on the next run. Every record in the
/// cache therefore belongs to an article that existed when it was fetched.
pub struct LinkResolver {
    cache: AdjacencyCache,
    source: Arc<dyn LinkSource>,
    /// Per-title locks held across the remote fetch of that title.
    in_flight: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    stats: ResolverStats,
}

impl LinkResolver {
    pub fn new(cache: AdjacencyCache, source: Arc<dyn LinkSource>) -> Self {
        Self {
            cache,
            source,
            in_flight: Mutex::new(HashMap::new()),
            stats: ResolverStats::default(),
        }
    }

    pub fn cache(&self) -> &AdjacencyCache {
        &self.cache
    }

    pub fn stats(&self) -> ResolverSnapshot {
        self.stats.snapshot()
    }

    /// Outbound links of `title`.
    ///
    /// Concurrent calls for the same title reach the remote service at most
    /// once: later callers wait for the first and are served from the cache.
    pub async fn resolve(&self, title: &str) -> Result<Arc<Vec<String>>> {
        let title = normalize_title(title);

        if let Some(links) = self.cache.get(&title).await? {
            log::debug!("Cache hit for '{}'", title);
            self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(links);
        }

        let in_flight = self.title_lock(&title);
        let _guard = in_flight.lock.lock().await;
        self.resolve_locked(&title).await
    }

    async fn resolve_locked(&self, title: &str) -> Result<Arc<Vec<String>>> {
        // Another caller may have filled the cache while we waited
        if let Some(links) = self.cache.get(title).await? {
            self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(links);
        }

        let links = match self.fetch_remote(title).await {
            Ok(Some(links)) => links,
            Ok(None) => {
                log::info!("Article '{}' does not exist", title);
                self.stats.missing.fetch_add(1, Ordering::Relaxed);
                return Ok(Arc::new(Vec::new()));
            }
            Err(e) => {
                log::warn!("Treating '{}' as a dead end: {}", title, e);
                self.stats.degraded.fetch_add(1, Ordering::Relaxed);
                return Ok(Arc::new(Vec::new()));
            }
        };

        self.stats.remote_fetches.fetch_add(1, Ordering::Relaxed);
        if self.cache.put(title, &links).await? {
            log::debug!("Fetched and cached '{}' ({} links)", title, links.len());
            return Ok(Arc::new(links));
        }

        // A title sharing this record file got there first; its record wins
        log::debug!("Record for '{}' already stored, serving the stored list", title);
        match self.cache.get(title).await? {
            Some(stored) => Ok(stored),
            None => Ok(Arc::new(links)),
        }
    }

    /// `Ok(None)` when the article does not exist.
    async fn fetch_remote(&self, title: &str) -> Result<Option<Vec<String>>> {
        if !self.source.exists(title).await? {
            return Ok(None);
        }
        let links = self
            .source
            .links(title)
            .await?
            .iter()
            .map(|l| normalize_title(l))
            .filter(|l| !l.is_empty())
            .collect();
        Ok(Some(links))
    }

    fn title_lock<'a>(&'a self, title: &'a str) -> InFlight<'a> {
        let mut table = self.in_flight.lock().unwrap();
        let lock = Arc::clone(table.entry(title.to_string()).or_default());
        InFlight {
            resolver: self,
            title,
            lock,
        }
    }
}

/// Handle on a title's entry in the in-flight table. Dropping it removes the
/// entry once no other caller holds it, including when the resolve future is
/// dropped mid-fetch (e.g. by a timeout).
struct InFlight<'a> {
    resolver: &'a LinkResolver,
    title: &'a str,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Ok(mut table) = self.resolver.in_flight.lock() {
            // Table + our handle: nobody else is waiting
            if Arc::strong_count(&self.lock) == 2 {
                table.remove(self.title);
            }
        }
    }
}
