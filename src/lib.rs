pub mod cache;
pub mod config;
pub mod error;
pub mod remote;
pub mod resolver;
pub mod search;
pub mod title;

pub use config::Config;
pub use error::{Result, WikirouteError};
pub use resolver::LinkResolver;
pub use search::{BatchFetcher, CancellationToken, PathFinder, SearchLimits, SearchOutcome};
