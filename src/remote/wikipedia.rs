use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::config::Config;
use crate::error::{Result, WikirouteError};
use crate::remote::LinkSource;

/// Response envelope of `action=query` (formatversion=2)
#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    query: Option<QueryBody>,
    /// Continuation parameters to send back verbatim for the next page.
    #[serde(default, rename = "continue")]
    continuation: Option<HashMap<String, String>>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct QueryBody {
    #[serde(default)]
    pages: Vec<Page>,
}

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    missing: bool,
    #[serde(default)]
    invalid: bool,
    #[serde(default)]
    links: Vec<PageLink>,
}

#[derive(Debug, Deserialize)]
struct PageLink {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    #[serde(default)]
    info: String,
}

/// Outcome of one HTTP attempt, split by whether retrying can help
enum Attempt {
    Done(QueryResponse),
    Retryable(String),
}

/// MediaWiki action API client
///
/// Identifies itself with the configured User-Agent as the Wikimedia API
/// etiquette requires. Rate limiting (429) and server errors are retried with
/// exponential backoff.
pub struct WikipediaClient {
    client: Client,
    api_url: String,
    max_retries: usize,
    /// Follow only links into this namespace; all namespaces when unset.
    link_namespace: Option<i32>,
}

impl WikipediaClient {
    /// Create a client for the given `api.php` endpoint
    pub fn new(
        api_url: impl Into<String>,
        user_agent: &str,
        timeout: Duration,
        max_retries: usize,
        link_namespace: Option<i32>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| WikirouteError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_url: api_url.into(),
            max_retries,
            link_namespace,
        })
    }

    /// Create a client from the `[remote]` section
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.api_url(),
            &config.remote.user_agent,
            Duration::from_secs(config.remote.timeout_secs),
            config.remote.max_retries,
            config.remote.link_namespace,
        )
    }

    /// First-page parameters of a `prop=links` query
    fn links_params(&self, title: &str) -> Vec<(String, String)> {
        let mut params = vec![
            ("prop".to_string(), "links".to_string()),
            ("titles".to_string(), title.to_string()),
            ("pllimit".to_string(), "max".to_string()),
        ];
        if let Some(namespace) = self.link_namespace {
            params.push(("plnamespace".to_string(), namespace.to_string()));
        }
        params
    }

    /// Run one query with retry
    async fn query(&self, params: &[(String, String)]) -> Result<QueryResponse> {
        let start = std::time::Instant::now();
        let mut attempt = 0;
        let mut delay = Duration::from_secs(1);

        loop {
            match self.query_once(params).await? {
                Attempt::Done(mut response) => {
                    if let Some(err) = response.error.take() {
                        return Err(WikirouteError::Remote(format!(
                            "MediaWiki API error {}: {}",
                            err.code, err.info
                        )));
                    }
                    log::debug!("MediaWiki query took {:?} (attempt {})", start.elapsed(), attempt + 1);
                    return Ok(response);
                }
                Attempt::Retryable(reason) if attempt < self.max_retries => {
                    log::warn!("Retry {}/{} after error: {}", attempt + 1, self.max_retries, reason);
                    tokio::time::sleep(delay).await;
                    delay *= 2; // Exponential backoff
                    attempt += 1;
                }
                Attempt::Retryable(reason) => return Err(WikirouteError::Remote(reason)),
            }
        }
    }

    async fn query_once(&self, params: &[(String, String)]) -> Result<Attempt> {
        let response = match self
            .client
            .get(&self.api_url)
            .query(&[
                ("action", "query"),
                ("format", "json"),
                ("formatversion", "2"),
            ])
            .query(params)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) if e.is_timeout() || e.is_connect() => {
                return Ok(Attempt::Retryable(format!("Network error: {}", e)))
            }
            Err(e) => return Err(WikirouteError::Remote(format!("Network error: {}", e))),
        };

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Ok(Attempt::Retryable(format!("MediaWiki API returned {}", status)));
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(WikirouteError::Remote(format!(
                "MediaWiki API error {}: {}",
                status, body
            )));
        }

        let parsed = response
            .json()
            .await
            .map_err(|e| WikirouteError::Remote(format!("Failed to parse response: {}", e)))?;
        Ok(Attempt::Done(parsed))
    }
}

fn first_page(response: QueryResponse) -> Option<Page> {
    response.query.and_then(|q| q.pages.into_iter().next())
}

fn page_exists(page: Option<&Page>) -> bool {
    page.map_or(false, |p| !p.missing && !p.invalid)
}

#[async_trait]
impl LinkSource for WikipediaClient {
    async fn exists(&self, title: &str) -> Result<bool> {
        let params = vec![
            ("prop".to_string(), "info".to_string()),
            ("titles".to_string(), title.to_string()),
        ];
        let response = self.query(&params).await?;
        Ok(page_exists(first_page(response).as_ref()))
    }

    async fn links(&self, title: &str) -> Result<Vec<String>> {
        let mut links = Vec::new();
        let mut continuation: HashMap<String, String> = HashMap::new();

        loop {
            let mut params = self.links_params(title);
            params.extend(continuation.drain());

            let mut response = self.query(&params).await?;
            let next = response.continuation.take();
            if let Some(page) = first_page(response) {
                links.extend(page.links.into_iter().map(|l| l.title));
            }

            match next {
                Some(next) if !next.is_empty() => continuation = next,
                _ => break,
            }
        }

        log::debug!("Fetched {} links for '{}'", links.len(), title);
        Ok(links)
    }
}
