//! Integration tests for `reddit::fetch_signals`.
//!
//! Uses `wiremock` to fake the dataset API's trigger, progress, and
//! snapshot endpoints. The happy-path mocks report the snapshot ready on
//! the first poll so no test ever sleeps.

use chrono::NaiveDate;
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gapscan_core::{MetricType, Platform};
use gapscan_scraper::{reddit, ScrapeClient, ScraperError};

fn test_client() -> ScrapeClient {
    ScrapeClient::new(5, "gapscan-test/0.1", 0, 0).expect("failed to build test ScrapeClient")
}

fn week() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 12, 22).expect("valid date")
}

/// Mounts the trigger endpoint returning `snapshot_id`.
async fn mount_trigger(server: &MockServer, snapshot_id: &str) {
    Mock::given(method("POST"))
        .and(path("/datasets/v3/trigger"))
        .and(query_param("dataset_id", "gd_test123"))
        .and(query_param("type", "discover_new"))
        .and(query_param("discover_by", "keyword"))
        .and(header("Authorization", "Bearer test-token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(&json!({"snapshot_id": snapshot_id})),
        )
        .mount(server)
        .await;
}

/// Mounts the progress endpoint reporting `status` for `snapshot_id`.
async fn mount_progress(server: &MockServer, snapshot_id: &str, status: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/datasets/v3/progress/{snapshot_id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!({"status": status})))
        .mount(server)
        .await;
}

// ---------------------------------------------------------------------------
// Test 1 – happy path: trigger, ready on first poll, snapshot reduced
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fetch_signals_reduces_posts_to_demand_signals() {
    let server = MockServer::start().await;
    mount_trigger(&server, "snap_1").await;
    mount_progress(&server, "snap_1", "ready").await;

    Mock::given(method("GET"))
        .and(path("/datasets/v3/snapshot/snap_1"))
        .and(query_param("format", "json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!([
            {"num_upvotes": 10, "num_comments": 5},
            {"num_upvotes": 20}
        ])))
        .mount(&server)
        .await;

    let client = test_client();
    let result = reddit::fetch_signals(
        &client,
        &server.uri(),
        "test-token",
        "gd_test123",
        "notion templates",
        week(),
    )
    .await;

    assert!(result.is_ok(), "expected Ok, got: {result:?}");
    let signals = result.unwrap();
    assert_eq!(signals.len(), 2, "expected 2 demand signals");
    assert!(signals.iter().all(|s| s.platform == Platform::Reddit));
    assert!(signals.iter().all(|s| s.metric_type == MetricType::Demand));

    let engagement = signals
        .iter()
        .find(|s| s.metric_name == "weighted_engagement")
        .expect("missing weighted_engagement");
    // 30 upvotes + 2 * 5 comments
    assert!((engagement.raw_value - 40.0).abs() < 1e-9);

    let frequency = signals
        .iter()
        .find(|s| s.metric_name == "post_frequency")
        .expect("missing post_frequency");
    assert!((frequency.raw_value - 2.0).abs() < 1e-9);
}

// ---------------------------------------------------------------------------
// Test 2 – empty snapshot yields no signals
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fetch_signals_returns_empty_vec_for_empty_snapshot() {
    let server = MockServer::start().await;
    mount_trigger(&server, "snap_2").await;
    mount_progress(&server, "snap_2", "ready").await;

    Mock::given(method("GET"))
        .and(path("/datasets/v3/snapshot/snap_2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!([])))
        .mount(&server)
        .await;

    let client = test_client();
    let result = reddit::fetch_signals(
        &client,
        &server.uri(),
        "test-token",
        "gd_test123",
        "notion templates",
        week(),
    )
    .await;

    assert!(result.is_ok(), "expected Ok, got: {result:?}");
    assert!(
        result.unwrap().is_empty(),
        "expected no signals for an empty snapshot"
    );
}

// ---------------------------------------------------------------------------
// Test 3 – provider-reported failure
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fetch_signals_propagates_collection_failure() {
    let server = MockServer::start().await;
    mount_trigger(&server, "snap_3").await;
    mount_progress(&server, "snap_3", "failed").await;

    let client = test_client();
    let result = reddit::fetch_signals(
        &client,
        &server.uri(),
        "test-token",
        "gd_test123",
        "notion templates",
        week(),
    )
    .await;

    assert!(result.is_err(), "expected Err for failed collection");
    match result.unwrap_err() {
        ScraperError::CollectionFailed { snapshot_id } => {
            assert_eq!(snapshot_id, "snap_3");
        }
        other => panic!("expected ScraperError::CollectionFailed, got: {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Test 4 – malformed trigger response
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fetch_signals_propagates_malformed_trigger_response() {
    let server = MockServer::start().await;

    // Trigger responds 200 but without a snapshot_id.
    Mock::given(method("POST"))
        .and(path("/datasets/v3/trigger"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!({"ok": true})))
        .mount(&server)
        .await;

    let client = test_client();
    let result = reddit::fetch_signals(
        &client,
        &server.uri(),
        "test-token",
        "gd_test123",
        "notion templates",
        week(),
    )
    .await;

    assert!(result.is_err(), "expected Err for malformed trigger response");
    assert!(
        matches!(result.unwrap_err(), ScraperError::Deserialize { .. }),
        "expected ScraperError::Deserialize"
    );
}

// ---------------------------------------------------------------------------
// Test 5 – non-transient progress error propagates immediately
// ---------------------------------------------------------------------------

/// A 401 from the progress endpoint is a client fault, not a transient
/// condition, so the poll loop must give up at once instead of burning the
/// whole collection deadline.
#[tokio::test]
async fn fetch_signals_propagates_client_error_from_progress_poll() {
    let server = MockServer::start().await;
    mount_trigger(&server, "snap_5").await;

    Mock::given(method("GET"))
        .and(path("/datasets/v3/progress/snap_5"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let client = test_client();
    let result = reddit::fetch_signals(
        &client,
        &server.uri(),
        "test-token",
        "gd_test123",
        "notion templates",
        week(),
    )
    .await;

    assert!(result.is_err(), "expected Err for 401 progress response");
    match result.unwrap_err() {
        ScraperError::UnexpectedStatus { status, .. } => {
            assert_eq!(status, 401);
        }
        other => panic!("expected ScraperError::UnexpectedStatus, got: {other:?}"),
    }
}
