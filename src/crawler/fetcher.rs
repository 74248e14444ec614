//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with proper user agent strings
//! - Enforcing the domain allow-list before any request
//! - Per-domain rate limiting shared by all workers
//! - Retry with exponential backoff and jitter for transient failures
//! - Error classification into transient and permanent failures

use crate::config::{Config, CrawlerConfig, UserAgentConfig};
use crate::crawler::rate_limit::RateLimiter;
use crate::url::{extract_domain, DomainAllowList};
use async_trait::async_trait;
use rand::Rng;
use reqwest::{header, redirect::Policy, Client, StatusCode};
use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Maximum number of redirects followed for one request
const MAX_REDIRECTS: usize = 10;

/// Typed fetch failure
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Worth retrying later: timeouts, 5xx, 408, 429, dropped connections
    #[error("Transient failure fetching {url} after {attempts} attempt(s): {reason}")]
    Transient {
        url: String,
        reason: String,
        attempts: u32,
    },

    /// Retrying will not help: 4xx, non-HTML content, DNS failure, disallowed URL
    #[error("Permanent failure fetching {url}: {reason}")]
    Permanent {
        url: String,
        reason: String,
        status: Option<u16>,
    },
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    pub fn reason(&self) -> &str {
        match self {
            Self::Transient { reason, .. } | Self::Permanent { reason, .. } => reason,
        }
    }
}

/// Source of page bodies
///
/// The coordinator only talks to this trait, so tests can script responses
/// without a network.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches the HTML body at `url`
    async fn fetch(&self, url: &Url) -> Result<String, FetchError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use recipe_harvest::config::UserAgentConfig;
/// use recipe_harvest::crawler::build_http_client;
/// use std::time::Duration;
///
/// let config = UserAgentConfig {
///     crawler_name: "RecipeHarvest".to_string(),
///     crawler_version: "0.1".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, Duration::from_secs(30)).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig, timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Computes the delay before retry number `attempt` (1-based)
///
/// `base * 2^(attempt - 1)`, capped at `max`, plus uniform jitter of up to
/// half the capped delay.
pub fn backoff_delay(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    let exponent = attempt.saturating_sub(1).min(32);
    let delay = base_ms.saturating_mul(1u64 << exponent).min(max_ms);

    let jitter = if delay >= 2 {
        rand::rng().random_range(0..=delay / 2)
    } else {
        0
    };

    Duration::from_millis(delay + jitter)
}

/// reqwest-backed [`Fetcher`]
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | Domain not allowed, bad URL | Permanent, no request sent |
/// | HTTP 2xx, HTML | Success |
/// | HTTP 2xx, other content type | Permanent |
/// | HTTP 429 | Penalize domain, retry |
/// | HTTP 408, 5xx | Retry |
/// | Other 4xx | Permanent |
/// | Timeout, connection reset, body error | Retry |
/// | DNS failure, redirect error | Permanent |
///
/// Retries stop after `max-fetch-retries`; the final error is `Transient`.
pub struct HttpFetcher {
    client: Client,
    allow_list: DomainAllowList,
    limiter: Arc<RateLimiter>,
    max_retries: u32,
    backoff_base_ms: u64,
    backoff_max_ms: u64,
}

impl HttpFetcher {
    /// Creates a fetcher with its own rate limiter
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let limiter = Arc::new(RateLimiter::new(Duration::from_millis(
            config.crawler.min_request_delay_ms,
        )));
        Self::with_limiter(config, limiter)
    }

    /// Creates a fetcher sharing an existing rate limiter
    pub fn with_limiter(config: &Config, limiter: Arc<RateLimiter>) -> Result<Self, reqwest::Error> {
        let CrawlerConfig {
            max_fetch_retries,
            backoff_base_ms,
            backoff_max_ms,
            request_timeout_secs,
            ..
        } = config.crawler;

        let client = build_http_client(&config.user_agent, Duration::from_secs(request_timeout_secs))?;

        Ok(Self {
            client,
            allow_list: DomainAllowList::new(&config.site.allowed_domains),
            limiter,
            max_retries: max_fetch_retries,
            backoff_base_ms,
            backoff_max_ms,
        })
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Sends one GET request and classifies the outcome
    async fn fetch_once(&self, url: &Url, domain: &str, attempt: u32) -> Result<String, FetchError> {
        let transient = |reason: String| FetchError::Transient {
            url: url.to_string(),
            reason,
            attempts: attempt,
        };
        let permanent = |reason: String, status: Option<u16>| FetchError::Permanent {
            url: url.to_string(),
            reason,
            status,
        };

        let response = match self.client.get(url.clone()).send().await {
            Ok(response) => response,
            Err(e) => return Err(classify_request_error(&e, &transient, &permanent)),
        };

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let cooldown = retry_after(response.headers())
                .unwrap_or_else(|| self.limiter.min_delay() * 2);
            self.limiter.penalize(domain, cooldown);
            return Err(transient(format!("HTTP {}", status.as_u16())));
        }

        if status == StatusCode::REQUEST_TIMEOUT || status.is_server_error() {
            return Err(transient(format!("HTTP {}", status.as_u16())));
        }

        if !status.is_success() {
            return Err(permanent(format!("HTTP {}", status.as_u16()), Some(status.as_u16())));
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_ascii_lowercase);

        if let Some(content_type) = content_type {
            if !content_type.contains("text/html") && !content_type.contains("application/xhtml+xml") {
                return Err(permanent(
                    format!("Unexpected content type '{}'", content_type),
                    Some(status.as_u16()),
                ));
            }
        }

        response
            .text()
            .await
            .map_err(|e| transient(format!("Failed to read body: {}", e)))
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
        let domain = match extract_domain(url) {
            Some(domain) if self.allow_list.is_allowed(url) => domain,
            _ => {
                return Err(FetchError::Permanent {
                    url: url.to_string(),
                    reason: "Domain not in allow-list".to_string(),
                    status: None,
                })
            }
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            self.limiter.acquire(&domain).await;

            match self.fetch_once(url, &domain, attempt).await {
                Ok(body) => {
                    tracing::debug!(url = %url, attempt, bytes = body.len(), "Fetched page");
                    return Ok(body);
                }
                Err(err @ FetchError::Permanent { .. }) => return Err(err),
                Err(err) if attempt > self.max_retries => return Err(err),
                Err(err) => {
                    let delay = backoff_delay(attempt, self.backoff_base_ms, self.backoff_max_ms);
                    tracing::debug!(
                        url = %url,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = err.reason(),
                        "Retrying transient failure"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Reads a `Retry-After` header given in seconds
fn retry_after(headers: &header::HeaderMap) -> Option<Duration> {
    headers
        .get(header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Sorts a reqwest send error into transient or permanent
fn classify_request_error<T, P>(err: &reqwest::Error, transient: T, permanent: P) -> FetchError
where
    T: Fn(String) -> FetchError,
    P: Fn(String, Option<u16>) -> FetchError,
{
    if err.is_timeout() {
        transient("Request timeout".to_string())
    } else if err.is_redirect() {
        permanent(format!("Redirect error: {}", err), None)
    } else if err.is_builder() {
        permanent(format!("Invalid request: {}", err), None)
    } else if is_dns_error(err) {
        permanent(format!("DNS failure: {}", error_chain(err)), None)
    } else if err.is_connect() {
        transient(format!("Connection failed: {}", error_chain(err)))
    } else {
        transient(error_chain(err))
    }
}

/// Walks the source chain looking for a resolver failure
fn is_dns_error(err: &(dyn StdError + 'static)) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = current {
        if e.to_string().to_ascii_lowercase().contains("dns error") {
            return true;
        }
        current = e.source();
    }
    false
}

/// Joins an error and its sources into one line
fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut current = err.source();
    while let Some(e) = current {
        parts.push(e.to_string());
        current = e.source();
    }
    parts.join(": ")
}
