//! In-memory link source with call accounting, for tests and offline runs.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Result, WikirouteError};
use crate::remote::LinkSource;

type LatencyFn = Arc<dyn Fn(&str) -> Duration + Send + Sync>;

/// Mock link source backed by a fixed article graph.
///
/// Titles not registered with [`with_page`](Self::with_page) do not exist.
/// Every call is counted per title so tests can assert exactly how often the
/// remote side was reached.
#[derive(Default)]
pub struct MockLinkSource {
    pages: HashMap<String, Vec<String>>,
    failing: HashSet<String>,
    latency: Option<LatencyFn>,
    exists_calls: Mutex<HashMap<String, usize>>,
    links_calls: Mutex<HashMap<String, usize>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockLinkSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an existing article and its outbound links.
    pub fn with_page(mut self, title: impl Into<String>, links: &[&str]) -> Self {
        self.pages
            .insert(title.into(), links.iter().map(|l| l.to_string()).collect());
        self
    }

    /// Make every call for `title` fail as if the service were unreachable.
    pub fn with_failure(mut self, title: impl Into<String>) -> Self {
        self.failing.insert(title.into());
        self
    }

    /// Delay every call by the duration returned for its title.
    pub fn with_latency(mut self, latency: impl Fn(&str) -> Duration + Send + Sync + 'static) -> Self {
        self.latency = Some(Arc::new(latency));
        self
    }

    /// Number of `exists` calls made for `title`.
    pub fn exists_calls(&self, title: &str) -> usize {
        self.exists_calls.lock().unwrap().get(title).copied().unwrap_or(0)
    }

    /// Number of `links` calls made for `title`.
    pub fn links_calls(&self, title: &str) -> usize {
        self.links_calls.lock().unwrap().get(title).copied().unwrap_or(0)
    }

    /// Total calls of either kind across all titles.
    pub fn total_calls(&self) -> usize {
        let exists: usize = self.exists_calls.lock().unwrap().values().sum();
        let links: usize = self.links_calls.lock().unwrap().values().sum();
        exists + links
    }

    /// Highest number of calls that were in progress at the same moment.
    pub fn peak_concurrency(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(&self, counter: &Mutex<HashMap<String, usize>>, title: &str) -> Result<()> {
        *counter.lock().unwrap().entry(title.to_string()).or_insert(0) += 1;

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(latency) = &self.latency {
            tokio::time::sleep(latency(title)).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(title) {
            return Err(WikirouteError::Remote(format!("simulated outage for '{}'", title)));
        }
        Ok(())
    }
}

#[async_trait]
impl LinkSource for MockLinkSource {
    async fn exists(&self, title: &str) -> Result<bool> {
        self.enter(&self.exists_calls, title).await?;
        Ok(self.pages.contains_key(title))
    }

    async fn links(&self, title: &str) -> Result<Vec<String>> {
        self.enter(&self.links_calls, title).await?;
        Ok(self.pages.get(title).cloned().unwrap_or_default())
    }
}
