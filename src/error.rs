use thiserror::Error;

/// Main error type for WikiRoute
#[derive(Error, Debug)]
pub enum WikirouteError {
    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding/decoding errors (cache records, API responses)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Remote article service unavailable or misbehaving
    #[error("Remote service error: {0}")]
    Remote(String),

    /// Adjacency cache read/write failure
    #[error("Cache error: {0}")]
    Cache(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Convenient Result type using WikirouteError
pub type Result<T> = std::result::Result<T, WikirouteError>;
