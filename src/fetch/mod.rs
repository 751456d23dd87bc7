//! Leaderboard page fetching with bounded retry.
//!
//! Pages come from a [`PageSource`]; [`Fetcher`] wraps a source with an
//! exponential back-off policy for transient failures (network errors,
//! 5xx and 408 responses, rate limiting). Everything else surfaces immediately.

#[cfg(test)]
pub mod mock;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::models::{LeaderboardPage, ScrapeTarget};

/// Errors that can occur during fetching.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Rate limited by {host}, retry after {retry_after_secs}s")]
    RateLimited { host: String, retry_after_secs: u64 },

    #[error("HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<FetchError> },
}

impl FetchError {
    /// Whether a retry may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request() || e.is_body(),
            FetchError::RateLimited { .. } => true,
            FetchError::HttpStatus { status, .. } => *status >= 500 || *status == 408,
            FetchError::InvalidUrl(_) | FetchError::Json(_) | FetchError::RetriesExhausted { .. } => {
                false
            }
        }
    }

    /// HTTP status associated with the failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Http(e) => e.status().map(|s| s.as_u16()),
            FetchError::RateLimited { .. } => Some(429),
            FetchError::HttpStatus { status, .. } => Some(*status),
            FetchError::RetriesExhausted { last, .. } => last.status(),
            _ => None,
        }
    }
}

/// Retry policy for transient fetch failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 2000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry `attempt` (1-based): 2s, 4s, 8s with the defaults.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let millis = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        Duration::from_millis(millis.round() as u64)
    }
}

/// Configuration for the HTTP page source and fetcher.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Leaderboard endpoint; region, leaderboard and page go in the query string
    pub base_url: String,

    /// Request timeout
    pub timeout: Duration,

    /// User agent string
    pub user_agent: String,

    /// Retry policy for transient failures
    pub retry: RetryPolicy,

    /// Maximum page requests in flight for one target
    pub page_concurrency: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            base_url: "https://hearthstone.blizzard.com/api/community/leaderboardsData".to_string(),
            timeout: Duration::from_secs(30),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36".to_string(),
            retry: RetryPolicy::default(),
            page_concurrency: 40,
        }
    }
}

/// Anything that can produce one leaderboard page for a URL.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, url: &Url) -> Result<LeaderboardPage, FetchError>;
}

/// Page source backed by the live HTTP API.
pub struct HttpPageSource {
    client: Client,
}

impl HttpPageSource {
    pub fn new(config: &FetcherConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .unwrap_or_else(|_| HeaderValue::from_static("ladder-tracker/0.1.0")),
        );

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn fetch_page(&self, url: &Url) -> Result<LeaderboardPage, FetchError> {
        debug!("Fetching {}", url);

        let response = self.client.get(url.as_str()).send().await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);

            return Err(FetchError::RateLimited {
                host: url.host_str().unwrap_or("unknown").to_string(),
                retry_after_secs: retry_after,
            });
        }

        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Retry-wrapped page fetcher. Cheap to clone into page tasks.
#[derive(Clone)]
pub struct Fetcher {
    source: Arc<dyn PageSource>,
    policy: RetryPolicy,
}

impl Fetcher {
    pub fn new(source: Arc<dyn PageSource>, policy: RetryPolicy) -> Self {
        Self { source, policy }
    }

    /// Create a fetcher over the live HTTP API.
    pub fn http(config: &FetcherConfig) -> Result<Self, FetchError> {
        let source = HttpPageSource::new(config)?;
        Ok(Self::new(Arc::new(source), config.retry.clone()))
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetch one page, retrying transient failures per the policy.
    ///
    /// A `RetriesExhausted` error is terminal; callers must not retry it.
    pub async fn fetch(&self, url: &Url) -> Result<LeaderboardPage, FetchError> {
        let mut attempt = 0u32;

        loop {
            let err = match self.source.fetch_page(url).await {
                Ok(page) => return Ok(page),
                Err(e) => e,
            };

            if !err.is_transient() {
                return Err(err);
            }

            if attempt >= self.policy.max_retries {
                return Err(FetchError::RetriesExhausted {
                    attempts: attempt + 1,
                    last: Box::new(err),
                });
            }

            attempt += 1;
            let mut delay = self.policy.delay_for(attempt);
            if let FetchError::RateLimited { retry_after_secs, .. } = &err {
                delay = delay.max(Duration::from_secs(*retry_after_secs));
            }
            warn!(
                url = %url,
                status = ?err.status(),
                error = %err,
                attempt,
                max_retries = self.policy.max_retries,
                backoff_ms = delay.as_millis() as u64,
                "Page request failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

/// Build the URL of one page of a target's leaderboard.
pub fn page_url(base_url: &str, target: &ScrapeTarget, page: u32) -> Result<Url, FetchError> {
    let mut url = Url::parse(base_url).map_err(|e| FetchError::InvalidUrl(format!("{}: {}", base_url, e)))?;
    url.query_pairs_mut()
        .append_pair("region", &target.region)
        .append_pair("leaderboardId", &target.leaderboard_id)
        .append_pair("page", &page.to_string());
    Ok(url)
}
