//! Adjacency cache: a persistent, write-once map from article title to its
//! outbound links, with an optional bounded in-memory tier in front.

pub mod adjacency_cache;
pub mod memory;

pub use adjacency_cache::{AdjacencyCache, CacheStats};
pub use memory::LinkMemoryCache;
