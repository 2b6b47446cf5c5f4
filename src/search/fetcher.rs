use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};

use crate::config::Config;
use crate::error::Result;
use crate::resolver::LinkResolver;

const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(60);

/// Resolves a batch of titles concurrently on a bounded number of workers.
///
/// Workers only hand results back; the caller owns whatever it merges them into.
pub struct BatchFetcher {
    resolver: Arc<LinkResolver>,
    workers: usize,
    resolve_timeout: Duration,
}

impl BatchFetcher {
    /// `workers` is clamped to at least 1.
    pub fn new(resolver: Arc<LinkResolver>, workers: usize) -> Self {
        Self {
            resolver,
            workers: workers.max(1),
            resolve_timeout: DEFAULT_RESOLVE_TIMEOUT,
        }
    }

    pub fn from_config(resolver: Arc<LinkResolver>, config: &Config) -> Self {
        Self::new(resolver, config.search.workers).with_resolve_timeout(config.resolve_timeout())
    }

    /// Upper bound on one title's resolution; a title that exceeds it is a dead end.
    pub fn with_resolve_timeout(mut self, timeout: Duration) -> Self {
        self.resolve_timeout = timeout;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn resolver(&self) -> &LinkResolver {
        &self.resolver
    }

    /// Resolve every title, returning one entry per distinct input title.
    ///
    /// Remote failures and timeouts show up as empty lists. A cache failure
    /// fails the whole batch, after the other in-flight titles have finished.
    pub async fn fetch_all<I>(&self, titles: I) -> Result<HashMap<String, Arc<Vec<String>>>>
    where
        I: IntoIterator<Item = String>,
    {
        let mut seen = HashSet::new();
        let unique: Vec<String> = titles
            .into_iter()
            .filter(|t| seen.insert(t.clone()))
            .collect();

        let resolved: Vec<(String, Result<Arc<Vec<String>>>)> = stream::iter(unique)
            .map(|title| async move {
                let links =
                    match tokio::time::timeout(self.resolve_timeout, self.resolver.resolve(&title)).await {
                        Ok(links) => links,
                        Err(_) => {
                            log::warn!(
                                "Resolving '{}' exceeded {:?}, treating as dead end",
                                title,
                                self.resolve_timeout
                            );
                            Ok(Arc::new(Vec::new()))
                        }
                    };
                (title, links)
            })
            .buffer_unordered(self.workers)
            .collect()
            .await;

        let mut adjacency = HashMap::with_capacity(resolved.len());
        for (title, links) in resolved {
            adjacency.insert(title, links?);
        }
        Ok(adjacency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::AdjacencyCache;
    use crate::error::WikirouteError;
    use crate::remote::MockLinkSource;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use tempfile::TempDir;

    fn fetcher_with(source: MockLinkSource, workers: usize) -> (BatchFetcher, Arc<MockLinkSource>, TempDir) {
        let temp = TempDir::new().unwrap();
        let cache = AdjacencyCache::open(temp.path(), 0).unwrap();
        let source = Arc::new(source);
        let resolver = Arc::new(LinkResolver::new(cache, source.clone()));
        (BatchFetcher::new(resolver, workers), source, temp)
    }

    fn titles(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn sample_graph() -> MockLinkSource {
        MockLinkSource::new()
            .with_page("A", &["B", "C"])
            .with_page("B", &["C"])
            .with_page("C", &[])
            .with_page("D", &["A", "B", "C", "E"])
    }

    #[tokio::test]
    async fn test_one_entry_per_distinct_title() {
        let (fetcher, source, _temp) = fetcher_with(sample_graph(), 4);
        let result = fetcher
            .fetch_all(titles(&["A", "B", "A", "Missing"]))
            .await
            .unwrap();

        assert_eq!(result.len(), 3);
        assert_eq!(result["A"].as_slice(), ["B", "C"]);
        assert_eq!(result["B"].as_slice(), ["C"]);
        assert!(result["Missing"].is_empty());
        assert_eq!(source.exists_calls("A"), 1);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let (fetcher, source, _temp) = fetcher_with(sample_graph(), 4);
        assert!(fetcher.fetch_all(Vec::new()).await.unwrap().is_empty());
        assert_eq!(source.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_workers_bound_concurrency() {
        let mut source = MockLinkSource::new()
            .with_latency(|_| Duration::from_millis(15));
        let names: Vec<String> = (0..12).map(|i| format!("Page {}", i)).collect();
        for name in &names {
            source = source.with_page(name.clone(), &["Hub"]);
        }
        let (fetcher, source, _temp) = fetcher_with(source, 3);

        let result = fetcher.fetch_all(names.clone()).await.unwrap();
        assert_eq!(result.len(), 12);
        assert!(source.peak_concurrency() <= 3);
        assert!(source.peak_concurrency() >= 2);
    }

    #[tokio::test]
    async fn test_failures_do_not_fail_the_batch() {
        let (fetcher, _source, _temp) = fetcher_with(sample_graph().with_failure("B"), 4);
        let result = fetcher.fetch_all(titles(&["A", "B", "D"])).await.unwrap();

        assert_eq!(result.len(), 3);
        assert!(result["B"].is_empty());
        assert_eq!(result["D"].as_slice(), ["A", "B", "C", "E"]);
    }

    #[tokio::test]
    async fn test_slow_title_times_out_to_dead_end() {
        let source = sample_graph().with_latency(|title| {
            if title == "B" {
                Duration::from_millis(500)
            } else {
                Duration::ZERO
            }
        });
        let (fetcher, _source, _temp) = fetcher_with(source, 4);
        let fetcher = fetcher.with_resolve_timeout(Duration::from_millis(50));

        let result = fetcher.fetch_all(titles(&["A", "B"])).await.unwrap();
        assert!(result["B"].is_empty());
        assert_eq!(result["A"].as_slice(), ["B", "C"]);
    }

    #[tokio::test]
    async fn test_cache_failure_fails_the_batch() {
        let (fetcher, _source, temp) = fetcher_with(sample_graph(), 4);
        std::fs::write(temp.path().join("B.json"), "{").unwrap();

        let err = fetcher.fetch_all(titles(&["A", "B"])).await.unwrap_err();
        assert!(matches!(err, WikirouteError::Cache(_)));
    }

    #[tokio::test]
    async fn test_concurrent_matches_sequential() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut source = MockLinkSource::new();
        let mut delays = HashMap::new();
        let names: Vec<String> = (0..40).map(|i| format!("N{}", i)).collect();
        for (i, name) in names.iter().enumerate() {
            let out: Vec<String> = (0..rng.gen_range(0..6))
                .map(|_| format!("N{}", rng.gen_range(0..40)))
                .collect();
            let out_refs: Vec<&str> = out.iter().map(String::as_str).collect();
            // Every fifth title is absent from the service
            if i % 5 != 0 {
                source = source.with_page(name.clone(), &out_refs);
            }
            delays.insert(name.clone(), Duration::from_millis(rng.gen_range(0..20)));
        }
        let source = source.with_latency(move |title| delays.get(title).copied().unwrap_or_default());
        let source = Arc::new(source);

        let concurrent = {
            let temp = TempDir::new().unwrap();
            let cache = AdjacencyCache::open(temp.path(), 0).unwrap();
            let resolver = Arc::new(LinkResolver::new(cache, source.clone()));
            BatchFetcher::new(resolver, 8).fetch_all(names.clone()).await.unwrap()
        };

        let temp = TempDir::new().unwrap();
        let cache = AdjacencyCache::open(temp.path(), 0).unwrap();
        let resolver = LinkResolver::new(cache, source.clone());
        let mut sequential = HashMap::new();
        for name in &names {
            sequential.insert(name.clone(), resolver.resolve(name).await.unwrap());
        }

        assert_eq!(concurrent, sequential);
    }
}
