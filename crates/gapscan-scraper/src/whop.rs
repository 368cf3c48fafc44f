//! Whop marketplace collector (explore page scrape).
//!
//! Whop renders community cards with humanized member counts such as
//! `"1.2k members"`; signals are pulled straight out of the page text.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use gapscan_core::{MetricType, Platform, RawSignal};

use crate::client::ScrapeClient;
use crate::error::ScraperError;
use crate::parse::parse_count;

/// Production base URL of the Whop storefront.
pub const DEFAULT_BASE_URL: &str = "https://whop.com";

static MEMBER_COUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d[\d,.]*[km]?)\s+members\b").expect("valid regex"));

/// Collects Whop demand and supply signals for one category.
///
/// Fetches the explore page for the category and reduces the community
/// cards to two signals:
///
/// - demand `member_count` — summed member counts across listings;
/// - supply `listing_count` — number of listings on the page.
///
/// A page with no parseable listings yields an empty vector; either the
/// category genuinely has no listings or the markup changed shape, and
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
    let endpoint = format!("{}/explore", base_url.trim_end_matches('/'));
    let html = client.get_html(&endpoint, &[("q", category)]).await?;

    let counts = member_counts(&html);
    if counts.is_empty() {
        tracing::warn!(category, "no listings parsed from whop explore page");
        return Ok(Vec::new());
    }
    build_signals(&counts, category, week_start)
}

/// Pulls every humanized member count out of the page markup, in document
/// order.
fn member_counts(html: &str) -> Vec<f64> {
    MEMBER_COUNT_RE
        .captures_iter(html)
        .filter_map(|caps| caps.get(1).and_then(|m| parse_count(m.as_str())))
        .collect()
}

fn build_signals(
    counts: &[f64],
    category: &str,
    week_start: NaiveDate,
) -> Result<Vec<RawSignal>, ScraperError> {
    let member_total: f64 = counts.iter().sum();
    #[allow(clippy::cast_precision_loss)]
    let listing_count = counts.len() as f64;

    tracing::debug!(
        category,
        listing_count,
        member_total,
        "reduced whop listings to signals"
    );

    Ok(vec![
        RawSignal::new(
            Platform::Whop,
            category,
            MetricType::Demand,
            "member_count",
            member_total,
            week_start,
        )?,
        RawSignal::new(
            Platform::Whop,
            category,
            MetricType::Supply,
            "listing_count",
            listing_count,
            week_start,
        )?,
    ])
}
