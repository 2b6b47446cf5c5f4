//! Remote article service: existence checks and outbound links per title.

pub mod mock;
pub mod wikipedia;

pub use mock::MockLinkSource;
pub use wikipedia::WikipediaClient;

use async_trait::async_trait;

use crate::error::Result;

/// Source of adjacency data for the article graph.
///
/// Abstracts over transport (MediaWiki HTTP API, in-memory fake) so the
/// resolver doesn't depend on how articles are reached.
#[async_trait]
pub trait LinkSource: Send + Sync {
    /// Whether an article with this title exists.
    async fn exists(&self, title: &str) -> Result<bool>;

    /// Outbound link titles of an existing article, in the order the service reports them.
    async fn links(&self, title: &str) -> Result<Vec<String>>;
}
