//! Shared HTTP client for the marketplace collectors.

use std::time::Duration;

use reqwest::Client;

use gapscan_core::AppConfig;

use crate::error::ScraperError;
use crate::rate_limit::retry_with_backoff;

/// HTTP client shared by all platform collectors.
///
/// Handles rate limiting (429), not-found (404), and other non-2xx responses
/// as typed errors. Transient errors (429, 5xx, network failures) are
/// automatically retried with exponential backoff up to `max_retries`
/// additional attempts.
pub struct ScrapeClient {
    pub(crate) client: Client,
    /// Maximum number of retry attempts after the first failure.
    pub(crate) max_retries: u32,
    /// Base delay in seconds for exponential backoff: `backoff_base_secs * 2^attempt`.
    pub(crate) backoff_base_secs: u64,
}

impl ScrapeClient {
    /// Creates a `ScrapeClient` with configured timeout, `User-Agent`, and retry policy.
    ///
    /// `max_retries` is the number of additional attempts after the first failure for
    /// retriable errors (429, 5xx, network errors). Set to `0` to disable retries.
    ///
    /// `backoff_base_secs` controls the base delay for exponential backoff:
    /// the wait before the n-th retry is `backoff_base_secs * 2^(n-1)` seconds.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed (e.g., invalid TLS config).
    pub fn new(
        timeout_secs: u64,
        user_agent: &str,
        max_retries: u32,
        backoff_base_secs: u64,
    ) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            max_retries,
            backoff_base_secs,
        })
    }

    /// Creates a `ScrapeClient` from the application config's scraper settings.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, ScraperError> {
        Self::new(
            config.scraper_request_timeout_secs,
            &config.scraper_user_agent,
            config.scraper_max_retries,
            config.scraper_retry_backoff_base_secs,
        )
    }

    /// Fetches a page as text, with automatic retry on transient errors.
    ///
    /// `query` pairs are URL-encoded onto `endpoint`. Used by the storefront
    /// collectors that parse embedded data out of HTML discovery pages.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::RateLimited`] — HTTP 429 after all retries exhausted.
    /// - [`ScraperError::NotFound`] — HTTP 404 (not retried).
    /// - [`ScraperError::UnexpectedStatus`] — any other non-2xx status (5xx retried, 4xx not).
    /// - [`ScraperError::Http`] — network or TLS failure after all retries exhausted.
    pub(crate) async fn get_html(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<String, ScraperError> {
        retry_with_backoff(self.max_retries, self.backoff_base_secs, || async move {
            let response = self.client.get(endpoint).query(query).send().await?;
            let url = response.url().as_str().to_owned();
            let response = check_status(response, &url)?;
            Ok(response.text().await?)
        })
        .await
    }
}

/// Maps a non-2xx response to the matching [`ScraperError`] variant, passing
/// successful responses through untouched.
///
/// Reads the `Retry-After` header for 429 responses, defaulting to 60 seconds
/// when absent or unparseable.
///
/// # Errors
///
/// - [`ScraperError::RateLimited`] — HTTP 429.
/// - [`ScraperError::NotFound`] — HTTP 404.
/// - [`ScraperError::UnexpectedStatus`] — any other non-2xx status.
pub(crate) fn check_status(
    response: reqwest::Response,
    url: &str,
) -> Result<reqwest::Response, ScraperError> {
    let status = response.status();

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(60);

        return Err(ScraperError::RateLimited {
            domain: extract_domain(url),
            retry_after_secs,
        });
    }

    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(ScraperError::NotFound {
            url: url.to_owned(),
        });
    }

    if !status.is_success() {
        return Err(ScraperError::UnexpectedStatus {
            status: status.as_u16(),
            url: url.to_owned(),
        });
    }

    Ok(response)
}

/// Extracts the hostname from a URL for use in error messages.
///
/// Falls back to the full URL string if parsing fails.
pub(crate) fn extract_domain(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_owned))
        .unwrap_or_else(|| url.to_owned())
}
