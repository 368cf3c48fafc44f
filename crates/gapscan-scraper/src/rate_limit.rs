//! Retry utilities shared by the marketplace collectors.
//!
//! Provides exponential backoff retry logic for transient HTTP errors such as
//! 429 Rate Limited responses and server-side 5xx failures. Non-retriable
//! errors (parse failures, 404s, missing credentials) are propagated
//! immediately without retrying.

use std::future::Future;
use std::time::Duration;

use crate::error::ScraperError;

/// Returns `true` if `err` represents a transient condition that should be
/// retried after a backoff delay.
///
/// Retriable errors:
/// - [`ScraperError::RateLimited`] — HTTP 429; the server has asked us to back off.
/// - [`ScraperError::Http`] — network-level failure (connection reset, timeout, etc.).
/// - [`ScraperError::UnexpectedStatus`] with a 5xx status — server-side fault.
///
/// Non-retriable errors (propagated immediately):
/// - [`ScraperError::NotFound`] — 404; retrying would return the same result.
/// - [`ScraperError::UnexpectedStatus`] with a 4xx status — client fault; retrying won't fix it.
/// - [`ScraperError::Deserialize`] — response body does not parse; retrying won't fix it.
/// - [`ScraperError::MissingCredential`] — configuration issue.
/// - [`ScraperError::CollectionFailed`] / [`ScraperError::CollectionTimedOut`] —
///   terminal dataset-collection outcomes.
/// - [`ScraperError::Signal`] — data shape issue; retrying won't fix it.
pub(crate) fn is_retriable(err: &ScraperError) -> bool {
    match err {
        ScraperError::RateLimited { .. } | ScraperError::Http(_) => true,
        ScraperError::UnexpectedStatus { status, .. } => *status >= 500,
        _ => false,
    }
}

/// Seconds to wait before the next attempt: exponential backoff from
/// `backoff_base_secs`, raised to any `Retry-After` the server sent with a
/// 429 response.
fn retry_delay_secs(err: &ScraperError, backoff_base_secs: u64, attempt: u32) -> u64 {
    // Cap the shift to prevent overflow on extreme configs.
    let backoff = backoff_base_secs.saturating_mul(1u64 << attempt.min(62));
    match err {
        ScraperError::RateLimited {
            retry_after_secs, ..
        } => backoff.max(*retry_after_secs),
        _ => backoff,
    }
}

/// Executes `operation` with exponential backoff retries on transient errors.
///
/// On success the result is returned immediately.
///
/// On a retriable error (see [`is_retriable`]), the function sleeps for
/// `backoff_base_secs * 2^attempt` seconds — never less than a rate-limited
/// response's `Retry-After` — and tries again, up to `max_retries` additional
/// attempts after the first try. If all retries are exhausted the last error
/// is returned.
///
/// Non-retriable errors are returned immediately without sleeping or retrying.
///
/// # Backoff schedule (example with `backoff_base_secs = 1`)
///
/// | Attempt | Sleep before next attempt |
/// |---------|--------------------------|
/// | 0 (initial) | — (no sleep before first try) |
/// | 1 (first retry) | 1 × 2^0 = 1 s |
/// | 2 (second retry) | 1 × 2^1 = 2 s |
/// | 3 (third retry) | 1 × 2^2 = 4 s |
///
/// With `max_retries = 3` the operation is attempted at most 4 times total.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_secs: u64,
    mut operation: F,
) -> Result<T, ScraperError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ScraperError>>,
{
    let mut last_err;
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }
                last_err = err;
            }
        }

        let delay_secs = retry_delay_secs(&last_err, backoff_base_secs, attempt);
        tracing::warn!(
            attempt,
            max_retries,
            delay_secs,
            error = %last_err,
            "transient scraper error, retrying after backoff"
        );
        tokio::time::sleep(Duration::from_secs(delay_secs)).await;
        attempt += 1;
    }
}
