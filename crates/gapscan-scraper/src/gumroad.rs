//! Gumroad marketplace collector (discover page scrape).
//!
//! Gumroad has no public product search API; the discover page embeds its
//! product grid as JSON props in the markup, so signals are pulled straight
//! out of the page text.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use gapscan_core::{MetricType, Platform, RawSignal};

use crate::client::ScrapeClient;
use crate::error::ScraperError;

/// Production base URL of the Gumroad storefront.
pub const DEFAULT_BASE_URL: &str = "https://gumroad.com";

static RATINGS_COUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""ratings_count":\s*(\d+)"#).expect("valid regex"));

/// Collects Gumroad demand and supply signals for one category.
///
/// Fetches the discover page for the category and reduces the embedded
/// product grid to two signals:
///
/// - demand `review_count` — summed ratings counts across products;
/// - supply `product_count` — number of products on the page.
///
/// A page with no parseable products yields an empty vector; either the
/// category genuinely has no products or the markup changed shape, and
/// neither case produces a usable signal.
///
/// # Errors
///
/// - [`ScraperError::RateLimited`] — HTTP 429 after all retries exhausted.
/// - [`ScraperError::NotFound`] — HTTP 404 (not retried).
/// - [`ScraperError::UnexpectedStatus`] — any other non-2xx status (5xx retried, 4xx not).
/// - [`ScraperError::Http`] — network or TLS failure after all retries exhausted.
/// - [`ScraperError::Signal`] — the category or week is not a valid signal key.
pub async fn fetch_signals(
    client: &ScrapeClient,
    base_url: &str,
    category: &str,
    week_start: NaiveDate,
) -> Result<Vec<RawSignal>, ScraperError> {
    let endpoint = format!("{}/discover", base_url.trim_end_matches('/'));
    let html = client.get_html(&endpoint, &[("query", category)]).await?;

    let counts = ratings_counts(&html);
    if counts.is_empty() {
        tracing::warn!(category, "no products parsed from gumroad discover page");
        return Ok(Vec::new());
    }
    build_signals(&counts, category, week_start)
}

/// Pulls every `ratings_count` value out of the JSON props embedded in the
/// page markup, in document order.
fn ratings_counts(html: &str) -> Vec<f64> {
    RATINGS_COUNT_RE
        .captures_iter(html)
        .filter_map(|caps| caps.get(1).and_then(|m| m.as_str().parse::<f64>().ok()))
        .collect()
}

fn build_signals(
    counts: &[f64],
    category: &str,
    week_start: NaiveDate,
) -> Result<Vec<RawSignal>, ScraperError> {
    let review_total: f64 = counts.iter().sum();
    #[allow(clippy::cast_precision_loss)]
    let product_count = counts.len() as f64;

    tracing::debug!(
        category,
        product_count,
        review_total,
        "reduced gumroad products to signals"
    );

    Ok(vec![
        RawSignal::new(
            Platform::Gumroad,
            category,
            MetricType::Demand,
            "review_count",
            review_total,
            week_start,
        )?,
        RawSignal::new(
            Platform::Gumroad,
            category,
            MetricType::Supply,
            "product_count",
            product_count,
            week_start,
        )?,
    ])
}
