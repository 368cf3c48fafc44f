//! Reddit demand collector (Bright Data dataset API).
//!
//! Reddit is not a marketplace, so this collector emits demand signals only;
//! scoring falls back to the configured supply baseline for the platform.
//!
//! Collection is asynchronous on the provider side: a trigger call returns a
//! snapshot id, progress is polled until the snapshot is ready, and the
//! collected posts are then downloaded in one batch.

use std::time::{Duration, Instant};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use gapscan_core::{MetricType, Platform, RawSignal};

use crate::client::{check_status, ScrapeClient};
use crate::error::ScraperError;
use crate::rate_limit::{is_retriable, retry_with_backoff};

/// Production base URL of the Bright Data dataset API.
pub const DEFAULT_BASE_URL: &str = "https://api.brightdata.com";

/// Overall deadline for a snapshot to become ready.
const COLLECTION_TIMEOUT_SECS: u64 = 360;

/// Delay between progress polls.
const POLL_INTERVAL_SECS: u64 = 10;

/// Discovery parameters for one keyword collection.
#[derive(Serialize)]
struct TriggerRequest<'a> {
    keyword: &'a str,
    date: &'a str,
    sort_by: &'a str,
}

#[derive(Debug, Deserialize)]
struct TriggerResponse {
    snapshot_id: String,
}

#[derive(Debug, Deserialize)]
struct ProgressResponse {
    status: String,
}

/// One collected post. Only the engagement counters are read.
#[derive(Debug, Deserialize)]
struct RedditPost {
    #[serde(default)]
    num_upvotes: Option<i64>,
    #[serde(default)]
    num_comments: Option<i64>,
}

/// Collects Reddit demand signals for one category.
///
/// Triggers a keyword discovery run for the category, waits for the snapshot
/// to become ready, downloads the collected posts, and reduces them to two
/// signals:
///
/// - demand `weighted_engagement` — upvote total plus twice the comment total;
/// - demand `post_frequency` — number of posts collected.
///
/// An empty snapshot yields an empty vector; there is nothing to score.
///
/// # Errors
///
/// - [`ScraperError::CollectionFailed`] — the provider reported the snapshot failed.
/// - [`ScraperError::CollectionTimedOut`] — the snapshot was not ready in time.
/// - [`ScraperError::RateLimited`] — HTTP 429 after all retries exhausted.
/// - [`ScraperError::NotFound`] — HTTP 404 (not retried).
/// - [`ScraperError::UnexpectedStatus`] — any other non-2xx status (5xx retried, 4xx not).
/// - [`ScraperError::Http`] — network or TLS failure after all retries exhausted.
/// - [`ScraperError::Deserialize`] — a response body is not the expected JSON shape.
/// - [`ScraperError::Signal`] — the category or week is not a valid signal key.
pub async fn fetch_signals(
    client: &ScrapeClient,
    base_url: &str,
    api_token: &str,
    dataset_id: &str,
    category: &str,
    week_start: NaiveDate,
) -> Result<Vec<RawSignal>, ScraperError> {
    let snapshot_id = trigger_collection(client, base_url, api_token, dataset_id, category).await?;
    tracing::info!(category, snapshot_id, "reddit collection triggered");

    wait_for_completion(
        client,
        base_url,
        api_token,
        &snapshot_id,
        COLLECTION_TIMEOUT_SECS,
        POLL_INTERVAL_SECS,
    )
    .await?;

    let posts = fetch_snapshot(client, base_url, api_token, &snapshot_id).await?;
    if posts.is_empty() {
        tracing::warn!(category, snapshot_id, "reddit snapshot contained no posts");
        return Ok(Vec::new());
    }
    build_signals(&posts, category, week_start)
}

/// Starts a keyword discovery run, retrying transient failures.
/// Returns the snapshot id to poll.
async fn trigger_collection(
    client: &ScrapeClient,
    base_url: &str,
    api_token: &str,
    dataset_id: &str,
    category: &str,
) -> Result<String, ScraperError> {
    let endpoint = format!("{}/datasets/v3/trigger", base_url.trim_end_matches('/'));
    let request_body = [TriggerRequest {
        keyword: category,
        date: "All time",
        sort_by: "Hot",
    }];

    let parsed = retry_with_backoff(client.max_retries, client.backoff_base_secs, || {
        let endpoint = endpoint.clone();
        let request_body = &request_body;
        async move {
            let response = client
                .client
                .post(&endpoint)
                .query(&[
                    ("dataset_id", dataset_id),
                    ("include_errors", "true"),
                    ("type", "discover_new"),
                    ("discover_by", "keyword"),
                ])
                .bearer_auth(api_token)
                .json(request_body)
                .send()
                .await?;

            let url = response.url().as_str().to_owned();
            let response = check_status(response, &url)?;
            let body = response.text().await?;
            serde_json::from_str::<TriggerResponse>(&body).map_err(|e| ScraperError::Deserialize {
                context: format!("trigger response for '{category}'"),
                source: e,
            })
        }
    })
    .await?;

    Ok(parsed.snapshot_id)
}

/// Polls snapshot progress until it reports `ready`.
///
/// Transient poll failures (429, 5xx, network errors) are logged and the
/// loop keeps polling; the overall deadline still applies. Non-transient
/// failures propagate immediately.
async fn wait_for_completion(
    client: &ScrapeClient,
    base_url: &str,
    api_token: &str,
    snapshot_id: &str,
    timeout_secs: u64,
    poll_interval_secs: u64,
) -> Result<(), ScraperError> {
    let url = format!(
        "{}/datasets/v3/progress/{snapshot_id}",
        base_url.trim_end_matches('/')
    );
    let started = Instant::now();

    while started.elapsed() < Duration::from_secs(timeout_secs) {
        match progress_status(client, &url, api_token, snapshot_id).await {
            Ok(status) => {
                tracing::debug!(snapshot_id, status = %status, "reddit collection progress");
                match status.as_str() {
                    "ready" => return Ok(()),
                    "failed" => {
                        return Err(ScraperError::CollectionFailed {
                            snapshot_id: snapshot_id.to_owned(),
                        })
                    }
                    _ => {}
                }
            }
            Err(err) if is_retriable(&err) => {
                tracing::warn!(
                    snapshot_id,
                    error = %err,
                    "transient error polling collection progress"
                );
            }
            Err(err) => return Err(err),
        }
        tokio::time::sleep(Duration::from_secs(poll_interval_secs)).await;
    }

    Err(ScraperError::CollectionTimedOut {
        snapshot_id: snapshot_id.to_owned(),
        timeout_secs,
    })
}

/// Fetches the current snapshot status, single attempt.
async fn progress_status(
    client: &ScrapeClient,
    url: &str,
    api_token: &str,
    snapshot_id: &str,
) -> Result<String, ScraperError> {
    let response = client.client.get(url).bearer_auth(api_token).send().await?;
    let response = check_status(response, url)?;
    let body = response.text().await?;
    let parsed =
        serde_json::from_str::<ProgressResponse>(&body).map_err(|e| ScraperError::Deserialize {
            context: format!("progress for snapshot {snapshot_id}"),
            source: e,
        })?;
    Ok(parsed.status)
}

/// Downloads the collected posts, retrying transient failures.
async fn fetch_snapshot(
    client: &ScrapeClient,
    base_url: &str,
    api_token: &str,
    snapshot_id: &str,
) -> Result<Vec<RedditPost>, ScraperError> {
    let endpoint = format!(
        "{}/datasets/v3/snapshot/{snapshot_id}",
        base_url.trim_end_matches('/')
    );

    retry_with_backoff(client.max_retries, client.backoff_base_secs, || {
        let endpoint = endpoint.clone();
        async move {
            let response = client
                .client
                .get(&endpoint)
                .query(&[("format", "json")])
                .bearer_auth(api_token)
                .send()
                .await?;

            let url = response.url().as_str().to_owned();
            let response = check_status(response, &url)?;
            let body = response.text().await?;
            serde_json::from_str::<Vec<RedditPost>>(&body).map_err(|e| {
                ScraperError::Deserialize {
                    context: format!("snapshot {snapshot_id}"),
                    source: e,
                }
            })
        }
    })
    .await
}

/// Reduces collected posts to raw demand signals.
/// Comments weigh double in the engagement total.
fn build_signals(
    posts: &[RedditPost],
    category: &str,
    week_start: NaiveDate,
) -> Result<Vec<RawSignal>, ScraperError> {
    let total_upvotes: i64 = posts.iter().map(|p| p.num_upvotes.unwrap_or(0)).sum();
    let total_comments: i64 = posts.iter().map(|p| p.num_comments.unwrap_or(0)).sum();

    // Downvoted threads can push the upvote sum negative; floor at zero.
    #[allow(clippy::cast_precision_loss)]
    let engagement = (total_upvotes + 2 * total_comments).max(0) as f64;
    #[allow(clippy::cast_precision_loss)]
    let post_frequency = posts.len() as f64;

    tracing::debug!(
        category,
        total_upvotes,
        total_comments,
        post_frequency,
        "reduced reddit posts to signals"
    );

    Ok(vec![
        RawSignal::new(
            Platform::Reddit,
            category,
            MetricType::Demand,
            "weighted_engagement",
            engagement,
            week_start,
        )?,
        RawSignal::new(
            Platform::Reddit,
            category,
            MetricType::Demand,
            "post_frequency",
            post_frequency,
            week_start,
        )?,
    ])
}
