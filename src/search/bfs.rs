//! Breadth-first shortest-path search.
//!
//! The frontier is one FIFO queue for the whole search. Each round dequeues up
//! to `workers` entries from its head, checks them against the goal in queue
//! order, resolves the rest concurrently and appends their unvisited links in
//! that same order. Dequeue order therefore never decreases in depth, and the
//! first goal dequeued carries a path with the fewest links.

use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

use crate::config::SearchConfig;
use crate::error::Result;
use crate::search::{BatchFetcher, CancellationToken};
use crate::title::parse_title;

/// Optional caps on how far a search may grow
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchLimits {
    /// Longest path, in links, that will be enqueued.
    pub max_depth: Option<usize>,
    /// Most distinct titles the search will track.
    pub max_visited: Option<usize>,
}

impl SearchLimits {
    pub fn from_config(config: &SearchConfig) -> Self {
        Self {
            max_depth: config.max_depth,
            max_visited: config.max_visited,
        }
    }

    fn admits(&self, depth: usize, visited: usize) -> bool {
        self.max_depth.map_or(true, |max| depth <= max)
            && self.max_visited.map_or(true, |max| visited < max)
    }
}

/// How a search ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// Titles from start to goal, both inclusive.
    Found(Vec<String>),
    /// Every title reachable from the start was expanded without meeting the goal.
    NoPath,
    /// The cancellation token was observed between batches.
    Canceled,
    /// The frontier ran dry, but only because [`SearchLimits`] held titles back.
    LimitReached,
}

/// Counters for one search
#[derive(Debug, Clone, Default)]
pub struct SearchStats {
    pub batches: usize,
    /// Titles whose links were resolved.
    pub expanded: usize,
    pub visited: usize,
    /// Deepest path enqueued, in links.
    pub max_depth: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct SearchReport {
    pub outcome: SearchOutcome,
    pub stats: SearchStats,
}

impl SearchReport {
    pub fn path(&self) -> Option<&[String]> {
        match &self.outcome {
            SearchOutcome::Found(path) => Some(path),
            _ => None,
        }
    }
}

struct FrontierEntry {
    title: String,
    path: Vec<String>,
}

impl FrontierEntry {
    fn depth(&self) -> usize {
        self.path.len() - 1
    }
}

/// Shortest-path driver. All frontier and visited-set mutation happens here;
/// the fetcher only returns adjacency lists.
pub struct PathFinder {
    fetcher: BatchFetcher,
    limits: SearchLimits,
}

impl PathFinder {
    pub fn new(fetcher: BatchFetcher) -> Self {
        Self {
            fetcher,
            limits: SearchLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: SearchLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn fetcher(&self) -> &BatchFetcher {
        &self.fetcher
    }

    /// Find a shortest link path from `start` to `goal`.
    ///
    /// Titles are normalized first; an empty title is `InvalidInput`. Only a
    /// cache failure makes this return `Err`.
    pub async fn find_path(
        &self,
        start: &str,
        goal: &str,
        cancel: &CancellationToken,
    ) -> Result<SearchReport> {
        let started = Instant::now();
        let start = parse_title(start)?;
        let goal = parse_title(goal)?;
        log::info!("Searching for a path from '{}' to '{}'", start, goal);

        let mut stats = SearchStats::default();
        let mut frontier = VecDeque::from([FrontierEntry {
            title: start.clone(),
            path: vec![start.clone()],
        }]);
        let mut visited = HashSet::from([start]);
        let mut held_back = false;
        let mut logged_depth = 0;

        let outcome = loop {
            if cancel.is_cancelled() {
                log::info!("Search canceled after {} batches", stats.batches);
                break SearchOutcome::Canceled;
            }

            let take = self.fetcher.workers().min(frontier.len());
            if take == 0 {
                break if held_back {
                    SearchOutcome::LimitReached
                } else {
                    SearchOutcome::NoPath
                };
            }
            let batch: Vec<FrontierEntry> = frontier.drain(..take).collect();

            if let Some(hit) = batch.iter().find(|entry| entry.title == goal) {
                break SearchOutcome::Found(hit.path.clone());
            }

            let depth = batch[0].depth();
            if depth > logged_depth {
                log::info!(
                    "Depth {}: {} titles visited, {} queued",
                    depth,
                    visited.len(),
                    frontier.len() + batch.len()
                );
                logged_depth = depth;
            }

            let adjacency = self
                .fetcher
                .fetch_all(batch.iter().map(|entry| entry.title.clone()))
                .await?;
            stats.batches += 1;
            stats.expanded += batch.len();

            // Merge in dequeue order so the queue stays sorted by depth
            for entry in &batch {
                let Some(links) = adjacency.get(&entry.title) else {
                    continue;
                };
                let child_depth = entry.depth() + 1;

                for link in links.iter() {
                    if visited.contains(link) {
                        continue;
                    }
                    if !self.limits.admits(child_depth, visited.len()) {
                        held_back = true;
                        continue;
                    }

                    visited.insert(link.clone());
                    let mut path = Vec::with_capacity(entry.path.len() + 1);
                    path.extend_from_slice(&entry.path);
                    path.push(link.clone());
                    frontier.push_back(FrontierEntry {
                        title: link.clone(),
                        path,
                    });
                    stats.max_depth = stats.max_depth.max(child_depth);
                }
            }

            log::debug!(
                "Batch {}: expanded {} at depth {}, {} queued, {} visited",
                stats.batches,
                batch.len(),
                depth,
                frontier.len(),
                visited.len()
            );
        };

        stats.visited = visited.len();
        stats.elapsed = started.elapsed();

        match &outcome {
            SearchOutcome::Found(path) => log::info!(
                "Found a path of {} links in {:?} ({} titles expanded)",
                path.len() - 1,
                stats.elapsed,
                stats.expanded
            ),
            SearchOutcome::NoPath => log::info!(
                "No path: exhausted {} reachable titles in {:?}",
                stats.visited,
                stats.elapsed
            ),
            SearchOutcome::LimitReached => log::info!(
                "No path within limits {:?} ({} titles visited)",
                self.limits,
                stats.visited
            ),
            SearchOutcome::Canceled => {}
        }

        Ok(SearchReport { outcome, stats })
    }
}
