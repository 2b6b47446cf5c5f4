use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub wikiroute: WikirouteConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

/// WikiRoute-specific configuration
#[derive(Debug, Clone, Deserialize)]
pub struct WikirouteConfig {
    /// Directory holding one JSON adjacency record per article.
    /// Created on first use; persists across runs.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for WikirouteConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            log_level: default_log_level(),
        }
    }
}

/// Remote article service (MediaWiki API) configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    #[serde(default = "default_language")]
    pub language: String,
    /// Overrides the endpoint derived from `language`.
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    /// MediaWiki namespace whose links are followed (0 = articles).
    /// Links into every namespace are followed when unset.
    #[serde(default)]
    pub link_namespace: Option<i32>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
            api_url: None,
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            link_namespace: None,
        }
    }
}

/// Search configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Concurrent link resolutions per batch (also the batch size).
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Longest path (in links) the search will enqueue. Unbounded when unset.
    #[serde(default)]
    pub max_depth: Option<usize>,
    /// Maximum number of distinct titles tracked. Unbounded when unset.
    #[serde(default)]
    pub max_visited: Option<usize>,
    #[serde(default = "default_resolve_timeout_secs")]
    pub resolve_timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            max_depth: None,
            max_visited: None,
            resolve_timeout_secs: default_resolve_timeout_secs(),
        }
    }
}

/// In-memory cache tier configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Entries kept in the LRU tier in front of the cache directory; 0 disables it.
    #[serde(default = "default_memory_capacity")]
    pub memory_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_capacity: default_memory_capacity(),
        }
    }
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("wikicache")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_user_agent() -> String {
    format!(
        "WikiRoute/{} (https://github.com/dedestem/wikiroutes)",
        env!("CARGO_PKG_VERSION")
    )
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> usize {
    3
}

fn default_workers() -> usize {
    8
}

fn default_resolve_timeout_secs() -> u64 {
    60
}

fn default_memory_capacity() -> usize {
    4096
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in WIKIROUTE_CONFIG environment variable (must exist)
    /// 2. ./config.toml in current directory
    /// 3. Built-in defaults
    pub fn load() -> Result<Self> {
        // .env is optional
        let _ = dotenv::dotenv();

        let config = match std::env::var("WIKIROUTE_CONFIG") {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => {
                let local = PathBuf::from("config.toml");
                if local.is_file() {
                    Self::from_file(&local)?
                } else {
                    log::debug!("No config.toml found, using defaults");
                    Config::default()
                }
            }
        };

        config.validate()?;

        Ok(config)
    }

    /// Parse a configuration file without consulting the environment.
    pub fn from_file(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.search.workers == 0 {
            anyhow::bail!("search.workers must be greater than 0");
        }

        if self.search.resolve_timeout_secs == 0 {
            anyhow::bail!("search.resolve_timeout_secs must be greater than 0");
        }

        if self.remote.timeout_secs == 0 {
            anyhow::bail!("remote.timeout_secs must be greater than 0");
        }

        if self.remote.user_agent.trim().is_empty() {
            anyhow::bail!("remote.user_agent must not be empty");
        }

        if self.remote.api_url.is_none()
            && !self
                .remote
                .language
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            anyhow::bail!("remote.language is not a valid wiki code: {}", self.remote.language);
        }

        let endpoint = self.api_url();
        url::Url::parse(&endpoint)
            .with_context(|| format!("remote.api_url is not a valid URL: {}", endpoint))?;

        Ok(())
    }

    /// Get the adjacency cache directory
    pub fn cache_dir(&self) -> &Path {
        &self.wikiroute.cache_dir
    }

    /// MediaWiki API endpoint: explicit override, else derived from the language code.
    pub fn api_url(&self) -> String {
        match &self.remote.api_url {
            Some(url) => url.clone(),
            None => format!("https://{}.wikipedia.org/w/api.php", self.remote.language),
        }
    }

    /// Per-title bound on a single resolve inside a batch
    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_secs(self.search.resolve_timeout_secs)
    }

    /// Logger builder honoring `RUST_LOG`, falling back to `wikiroute.log_level`.
    pub fn logger(&self) -> env_logger::Builder {
        env_logger::Builder::from_env(
            env_logger::Env::default()
                .filter_or("RUST_LOG", self.wikiroute.log_level.as_str())
        )
    }
}
