//! Etsy marketplace collector (RapidAPI product search).

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;

use gapscan_core::{MetricType, Platform, RawSignal};

use crate::client::{check_status, extract_domain, ScrapeClient};
use crate::error::ScraperError;
use crate::parse::{parse_price, parse_review_total};
use crate::rate_limit::retry_with_backoff;

/// Production base URL of the RapidAPI Etsy search endpoint.
pub const DEFAULT_BASE_URL: &str = "https://etsy-api2.p.rapidapi.com";

/// Product search response envelope.
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    response: Vec<SearchItem>,
}

/// One listing from the search response.
///
/// Fields arrive as display strings (`"4.8 star rating with 12k reviews"`,
/// `"4.8"`), with the price usually nested under `price.salePrice`.
#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default)]
    reviews: Option<String>,
    #[serde(default)]
    rating: Option<String>,
    #[serde(default)]
    price: Value,
}

/// Collects Etsy demand and supply signals for one category.
///
/// Issues a product search against the RapidAPI endpoint at `base_url` and
/// reduces the returned listings to four signals:
///
/// - demand `review_count` — summed per-listing review totals;
/// - demand `avg_rating` — mean listing rating;
/// - supply `listing_count` — number of listings returned;
/// - supply `avg_price` — mean sale price.
///
/// An empty search result yields an empty vector; there is nothing to score.
///
/// # Errors
///
/// - [`ScraperError::RateLimited`] — HTTP 429 after all retries exhausted.
/// - [`ScraperError::NotFound`] — HTTP 404 (not retried).
/// - [`ScraperError::UnexpectedStatus`] — any other non-2xx status (5xx retried, 4xx not).
/// - [`ScraperError::Http`] — network or TLS failure after all retries exhausted.
/// - [`ScraperError::Deserialize`] — response body is not the expected JSON shape.
/// - [`ScraperError::Signal`] — the category or week is not a valid signal key.
pub async fn fetch_signals(
    client: &ScrapeClient,
    base_url: &str,
    api_key: &str,
    category: &str,
    week_start: NaiveDate,
) -> Result<Vec<RawSignal>, ScraperError> {
    let items = search_products(client, base_url, api_key, category).await?;
    if items.is_empty() {
        tracing::warn!(category, "etsy search returned no listings");
        return Ok(Vec::new());
    }
    build_signals(&items, category, week_start)
}

/// Runs the product search, retrying transient failures.
async fn search_products(
    client: &ScrapeClient,
    base_url: &str,
    api_key: &str,
    category: &str,
) -> Result<Vec<SearchItem>, ScraperError> {
    let endpoint = format!("{}/product/search", base_url.trim_end_matches('/'));
    let host = extract_domain(base_url);

    let parsed = retry_with_backoff(client.max_retries, client.backoff_base_secs, || {
        let endpoint = endpoint.clone();
        let host = host.clone();
        async move {
            let response = client
                .client
                .get(&endpoint)
                .query(&[
                    ("query", category),
                    ("page", "1"),
                    ("currency", "USD"),
                    ("language", "en-US"),
                    ("country", "US"),
                    ("orderBy", "mostRelevant"),
                ])
                .header("x-rapidapi-key", api_key)
                .header("x-rapidapi-host", &host)
                .send()
                .await?;

            let url = response.url().as_str().to_owned();
            let response = check_status(response, &url)?;
            let body = response.text().await?;
            serde_json::from_str::<SearchResponse>(&body).map_err(|e| ScraperError::Deserialize {
                context: format!("etsy search for '{category}'"),
                source: e,
            })
        }
    })
    .await?;

    Ok(parsed.response)
}

/// Reduces search listings to raw signals.
///
/// Listings with unparseable review strings or ratings simply do not
/// contribute to those aggregates; an unparseable price contributes `0.0`
/// so the price average still spans every listing.
fn build_signals(
    items: &[SearchItem],
    category: &str,
    week_start: NaiveDate,
) -> Result<Vec<RawSignal>, ScraperError> {
    let review_total: f64 = items
        .iter()
        .filter_map(|item| item.reviews.as_deref().and_then(parse_review_total))
        .sum();

    let ratings: Vec<f64> = items
        .iter()
        .filter_map(|item| item.rating.as_deref().and_then(|r| r.trim().parse::<f64>().ok()))
        .collect();
    let avg_rating = if ratings.is_empty() {
        0.0
    } else {
        #[allow(clippy::cast_precision_loss)]
        let denom = ratings.len() as f64;
        ratings.iter().sum::<f64>() / denom
    };

    #[allow(clippy::cast_precision_loss)]
    let listing_count = items.len() as f64;

    let price_total: f64 = items.iter().map(|item| sale_price(item).unwrap_or(0.0)).sum();
    let avg_price = price_total / listing_count;

    tracing::debug!(
        category,
        listing_count,
        review_total,
        avg_rating,
        avg_price,
        "reduced etsy listings to signals"
    );

    Ok(vec![
        RawSignal::new(
            Platform::Etsy,
            category,
            MetricType::Demand,
            "review_count",
            review_total,
            week_start,
        )?,
        RawSignal::new(
            Platform::Etsy,
            category,
            MetricType::Demand,
            "avg_rating",
            avg_rating,
            week_start,
        )?,
        RawSignal::new(
            Platform::Etsy,
            category,
            MetricType::Supply,
            "listing_count",
            listing_count,
            week_start,
        )?,
        RawSignal::new(
            Platform::Etsy,
            category,
            MetricType::Supply,
            "avg_price",
            avg_price,
            week_start,
        )?,
    ])
}

/// Extracts a listing's sale price.
///
/// The price arrives as an object with a `salePrice` string on most
/// listings, but bare strings and plain numbers appear too.
fn sale_price(item: &SearchItem) -> Option<f64> {
    match &item.price {
        Value::Object(map) => map.get("salePrice").and_then(|v| match v {
            Value::String(s) => parse_price(s),
            other => other.as_f64(),
        }),
        Value::String(s) => parse_price(s),
        other => other.as_f64(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 12, 22).unwrap()
    }

    fn item(reviews: Option<&str>, rating: Option<&str>, price: Value) -> SearchItem {
        SearchItem {
            reviews: reviews.map(str::to_owned),
            rating: rating.map(str::to_owned),
            price,
        }
    }

    #[test]
    fn sale_price_reads_nested_sale_price_string() {
        let it = item(None, None, serde_json::json!({"salePrice": "12.00"}));
        assert_eq!(sale_price(&it), Some(12.0));
    }

    #[test]
    fn sale_price_reads_bare_string() {
        let it = item(None, None, Value::String("$8.50".to_owned()));
        assert_eq!(sale_price(&it), Some(8.5));
    }

    #[test]
    fn sale_price_reads_plain_number() {
        let it = item(None, None, serde_json::json!(5.0));
        assert_eq!(sale_price(&it), Some(5.0));
    }

    #[test]
    fn sale_price_missing_returns_none() {
        let it = item(None, None, Value::Null);
        assert_eq!(sale_price(&it), None);
    }

    #[test]
    fn build_signals_aggregates_listings() {
        let items = vec![
            item(
                Some("4.8 star rating with 12k reviews"),
                Some("4.8"),
                serde_json::json!({"salePrice": "12.00"}),
            ),
            item(
                Some("120 reviews"),
                Some("4.2"),
                serde_json::json!({"salePrice": "8.00"}),
            ),
        ];

        let signals = build_signals(&items, "Digital Planners", monday()).unwrap();
        assert_eq!(signals.len(), 4);

        let by_name = |name: &str| {
            signals
                .iter()
                .find(|s| s.metric_name == name)
                .unwrap_or_else(|| panic!("missing metric {name}"))
        };

        let review_count = by_name("review_count");
        assert_eq!(review_count.metric_type, MetricType::Demand);
        assert!((review_count.raw_value - 12_120.0).abs() < 1e-9);

        let avg_rating = by_name("avg_rating");
        assert!((avg_rating.raw_value - 4.5).abs() < 1e-9);

        let listing_count = by_name("listing_count");
        assert_eq!(listing_count.metric_type, MetricType::Supply);
        assert!((listing_count.raw_value - 2.0).abs() < 1e-9);

        let avg_price = by_name("avg_price");
        assert!((avg_price.raw_value - 10.0).abs() < 1e-9);

        // Categories are normalized on the way in.
        assert!(signals.iter().all(|s| s.category == "digital planners"));
        assert!(signals.iter().all(|s| s.platform == Platform::Etsy));
    }

    #[test]
    fn build_signals_tolerates_unparseable_fields() {
        let items = vec![
            item(Some("no numbers here"), Some("not a rating"), Value::Null),
            item(Some("10 reviews"), Some("4.0"), serde_json::json!({"salePrice": "6.00"})),
        ];

        let signals = build_signals(&items, "stock photos", monday()).unwrap();
        let by_name = |name: &str| signals.iter().find(|s| s.metric_name == name).unwrap();

        // Only the parseable listing contributes reviews and rating.
        assert!((by_name("review_count").raw_value - 10.0).abs() < 1e-9);
        assert!((by_name("avg_rating").raw_value - 4.0).abs() < 1e-9);
        // The unparseable price counts as 0.0, so the average spans both listings.
        assert!((by_name("avg_price").raw_value - 3.0).abs() < 1e-9);
        assert!((by_name("listing_count").raw_value - 2.0).abs() < 1e-9);
    }
}
