//! Shortest-path search over the article link graph.
//!
//! [`PathFinder`] drives a breadth-first search and hands each dequeued batch
//! to the [`BatchFetcher`], which resolves adjacency lists concurrently.

mod bfs;
mod cancel;
mod fetcher;

pub use bfs::{PathFinder, SearchLimits, SearchOutcome, SearchReport, SearchStats};
pub use cancel::CancellationToken;
pub use fetcher::BatchFetcher;
