//! Live integration tests for gapscan-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness. The `migrations` path is relative to the crate root
//! (`crates/gapscan-db/`), so `"../../migrations"` resolves to the workspace
//! migration directory.

use chrono::NaiveDate;
use gapscan_core::{GapScore, MetricType, Platform, RawSignal, ScoringConfig, Verdict};
use gapscan_db::{
    complete_pipeline_run, create_pipeline_run, fail_pipeline_run, get_pipeline_run_by_public_id,
    list_bottom_gap_scores, list_pipeline_runs, list_top_gap_scores, load_gap_scores,
    load_raw_signals, start_pipeline_run, update_normalized_values, upsert_gap_score,
    upsert_raw_signal, upsert_raw_signals, PgSignalStore,
};
use gapscan_engine::{run_pipeline, PipelineOptions};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 12, 22).unwrap()
}

fn signal(
    platform: Platform,
    category: &str,
    metric_type: MetricType,
    metric_name: &str,
    raw_value: f64,
) -> RawSignal {
    RawSignal::new(platform, category, metric_type, metric_name, raw_value, monday())
        .unwrap_or_else(|e| panic!("invalid test signal for '{category}': {e}"))
}

fn gap(platform: Platform, category: &str, gap_score: f64, verdict: Verdict) -> GapScore {
    GapScore {
        platform,
        category: category.to_string(),
        week_start: monday(),
        demand_score: gap_score,
        supply_score: 0.0,
        gap_score,
        verdict,
    }
}

// ---------------------------------------------------------------------------
// Section 1: marketplace_metrics
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn raw_signal_round_trip(pool: sqlx::PgPool) {
    let stored = signal(
        Platform::Etsy,
        "Digital  Planners",
        MetricType::Demand,
        "review_count",
        500.0,
    );
    upsert_raw_signal(&pool, &stored)
        .await
        .expect("upsert_raw_signal failed");

    let loaded = load_raw_signals(&pool, Platform::Etsy, monday())
        .await
        .expect("load_raw_signals failed");

    assert_eq!(loaded.len(), 1);
    // Category was normalized at construction time before hitting the db.
    assert_eq!(loaded[0].category, "digital planners");
    assert_eq!(loaded[0], stored);
}

#[sqlx::test(migrations = "../../migrations")]
async fn rescrape_overwrites_raw_value_and_clears_normalization(pool: sqlx::PgPool) {
    let first = signal(Platform::Etsy, "stock photos", MetricType::Demand, "review_count", 100.0);
    upsert_raw_signal(&pool, &first).await.expect("first upsert failed");

    let normalized = gapscan_core::NormalizedSignal::from_raw(&first, 0.25).unwrap();
    let updated = update_normalized_values(&pool, &[normalized])
        .await
        .expect("update_normalized_values failed");
    assert_eq!(updated, 1);

    let second = signal(Platform::Etsy, "stock photos", MetricType::Demand, "review_count", 140.0);
    upsert_raw_signal(&pool, &second).await.expect("second upsert failed");

    let (raw_value, normalized_value): (f64, Option<f64>) = sqlx::query_as(
        "SELECT raw_value, normalized_value FROM marketplace_metrics \
         WHERE platform = 'etsy' AND category = 'stock photos' AND metric_name = 'review_count'",
    )
    .fetch_one(&pool)
    .await
    .expect("row fetch failed");

    assert_eq!(raw_value, 140.0);
    assert!(
        normalized_value.is_none(),
        "re-scrape must clear the stale normalized value"
    );
}

#[sqlx::test(migrations = "../../migrations")]
async fn load_raw_signals_filters_by_platform_and_week(pool: sqlx::PgPool) {
    let signals = vec![
        signal(Platform::Etsy, "a", MetricType::Demand, "review_count", 1.0),
        signal(Platform::Gumroad, "a", MetricType::Demand, "review_count", 2.0),
    ];
    let written = upsert_raw_signals(&pool, &signals)
        .await
        .expect("batch upsert failed");
    assert_eq!(written, 2);

    let other_week = NaiveDate::from_ymd_opt(2025, 12, 29).unwrap();
    upsert_raw_signal(
        &pool,
        &RawSignal::new(Platform::Etsy, "a", MetricType::Demand, "review_count", 3.0, other_week)
            .unwrap(),
    )
    .await
    .expect("other-week upsert failed");

    let loaded = load_raw_signals(&pool, Platform::Etsy, monday())
        .await
        .expect("load failed");
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].platform, Platform::Etsy);
    assert_eq!(loaded[0].raw_value, 1.0);
}

// ---------------------------------------------------------------------------
// Section 2: gap_scores
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn gap_score_round_trip(pool: sqlx::PgPool) {
    let score = GapScore {
        platform: Platform::Etsy,
        category: "digital planners".to_string(),
        week_start: monday(),
        demand_score: 1.0,
        supply_score: 0.0,
        gap_score: 1.0,
        verdict: Verdict::HighOpportunity,
    };
    upsert_gap_score(&pool, &score).await.expect("upsert failed");

    let rows = load_gap_scores(&pool, Platform::Etsy, monday())
        .await
        .expect("load failed");
    assert_eq!(rows.len(), 1);
    let loaded = GapScore::try_from(rows[0].clone()).expect("row conversion failed");
    assert_eq!(loaded, score);
}

#[sqlx::test(migrations = "../../migrations")]
async fn recompute_keeps_created_at_and_bumps_recomputed_at(pool: sqlx::PgPool) {
    let first = gap(Platform::Etsy, "digital planners", 0.9, Verdict::HighOpportunity);
    upsert_gap_score(&pool, &first).await.expect("first upsert failed");

    let original = load_gap_scores(&pool, Platform::Etsy, monday())
        .await
        .expect("load failed")
        .remove(0);

    let second = gap(Platform::Etsy, "digital planners", 0.2, Verdict::Saturated);
    upsert_gap_score(&pool, &second).await.expect("second upsert failed");

    let recomputed = load_gap_scores(&pool, Platform::Etsy, monday())
        .await
        .expect("load failed")
        .remove(0);

    assert_eq!(recomputed.id, original.id, "recompute must not create a new row");
    assert_eq!(recomputed.created_at, original.created_at);
    assert!(recomputed.recomputed_at >= original.recomputed_at);
    assert_eq!(recomputed.gap_score, 0.2);
    assert_eq!(recomputed.verdict, "saturated");
}

#[sqlx::test(migrations = "../../migrations")]
async fn top_listing_orders_by_gap_desc_then_category(pool: sqlx::PgPool) {
    for score in [
        gap(Platform::Etsy, "b tied", 0.8, Verdict::HighOpportunity),
        gap(Platform::Etsy, "a tied", 0.8, Verdict::HighOpportunity),
        gap(Platform::Gumroad, "winner", 0.95, Verdict::HighOpportunity),
        gap(Platform::Etsy, "loser", 0.1, Verdict::Saturated),
    ] {
        upsert_gap_score(&pool, &score).await.expect("upsert failed");
    }

    let rows = list_top_gap_scores(&pool, monday(), 10)
        .await
        .expect("list failed");
    let order: Vec<&str> = rows.iter().map(|r| r.category.as_str()).collect();
    assert_eq!(order, vec!["winner", "a tied", "b tied", "loser"]);
}

#[sqlx::test(migrations = "../../migrations")]
async fn top_listing_respects_limit(pool: sqlx::PgPool) {
    for (category, value) in [("a", 0.9), ("b", 0.8), ("c", 0.7)] {
        upsert_gap_score(&pool, &gap(Platform::Etsy, category, value, Verdict::HighOpportunity))
            .await
            .expect("upsert failed");
    }

    let rows = list_top_gap_scores(&pool, monday(), 2)
        .await
        .expect("list failed");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].category, "a");
}

#[sqlx::test(migrations = "../../migrations")]
async fn bottom_listing_orders_by_gap_asc(pool: sqlx::PgPool) {
    for (category, value) in [("mid", 0.5), ("worst", 0.05), ("best", 0.9)] {
        upsert_gap_score(&pool, &gap(Platform::Etsy, category, value, Verdict::Competitive))
            .await
            .expect("upsert failed");
    }

    let rows = list_bottom_gap_scores(&pool, monday(), 2)
        .await
        .expect("list failed");
    let order: Vec<&str> = rows.iter().map(|r| r.category.as_str()).collect();
    assert_eq!(order, vec!["worst", "mid"]);
}

// ---------------------------------------------------------------------------
// Section 3: pipeline_runs lifecycle
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn pipeline_run_lifecycle_pending_to_done(pool: sqlx::PgPool) {
    let run = create_pipeline_run(&pool, "compute", Platform::Etsy, monday(), "cli")
        .await
        .expect("create_pipeline_run failed");

    assert_eq!(run.status, "pending");
    assert_eq!(run.run_type, "compute");
    assert!(run.started_at.is_none());
    assert!(run.completed_at.is_none());
    assert_eq!(run.categories_scored, 0);

    start_pipeline_run(&pool, run.id)
        .await
        .expect("start_pipeline_run failed");

    let summary = serde_json::json!({"succeeded": 2, "skipped": []});
    complete_pipeline_run(&pool, run.id, 2, &summary)
        .await
        .expect("complete_pipeline_run failed");

    let fetched = get_pipeline_run_by_public_id(&pool, run.public_id)
        .await
        .expect("get_pipeline_run_by_public_id failed");

    assert_eq!(fetched.status, "done");
    assert!(fetched.started_at.is_some(), "started_at should be set");
    assert!(fetched.completed_at.is_some(), "completed_at should be set");
    assert_eq!(fetched.categories_scored, 2);
    assert_eq!(fetched.summary, Some(summary));
    assert!(fetched.error_message.is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn pipeline_run_lifecycle_running_to_failed(pool: sqlx::PgPool) {
    let run = create_pipeline_run(&pool, "compute", Platform::Reddit, monday(), "api")
        .await
        .expect("create failed");
    start_pipeline_run(&pool, run.id).await.expect("start failed");

    fail_pipeline_run(&pool, run.id, "storage error: connection reset")
        .await
        .expect("fail_pipeline_run failed");

    let fetched = get_pipeline_run_by_public_id(&pool, run.public_id)
        .await
        .expect("get failed");
    assert_eq!(fetched.status, "failed");
    assert!(fetched.completed_at.is_some(), "completed_at should be set after fail");
    assert_eq!(
        fetched.error_message.as_deref(),
        Some("storage error: connection reset")
    );
}

#[sqlx::test(migrations = "../../migrations")]
async fn pipeline_run_can_fail_straight_from_pending(pool: sqlx::PgPool) {
    let run = create_pipeline_run(&pool, "scrape", Platform::Whop, monday(), "scheduler")
        .await
        .expect("create failed");

    fail_pipeline_run(&pool, run.id, "could not build scrape client")
        .await
        .expect("failing a pending run should be allowed");

    let fetched = get_pipeline_run_by_public_id(&pool, run.public_id)
        .await
        .expect("get failed");
    assert_eq!(fetched.status, "failed");
}

#[sqlx::test(migrations = "../../migrations")]
async fn pipeline_run_cannot_complete_from_pending(pool: sqlx::PgPool) {
    let run = create_pipeline_run(&pool, "compute", Platform::Etsy, monday(), "cli")
        .await
        .expect("create failed");

    let err = complete_pipeline_run(&pool, run.id, 1, &serde_json::json!({}))
        .await
        .expect_err("completing a pending run should fail");

    assert!(matches!(
        err,
        gapscan_db::DbError::InvalidPipelineRunTransition {
            expected_status: "running",
            ..
        }
    ));
}

#[sqlx::test(migrations = "../../migrations")]
async fn pipeline_run_cannot_fail_once_terminal(pool: sqlx::PgPool) {
    let run = create_pipeline_run(&pool, "compute", Platform::Etsy, monday(), "cli")
        .await
        .expect("create failed");
    start_pipeline_run(&pool, run.id).await.expect("start failed");
    complete_pipeline_run(&pool, run.id, 0, &serde_json::json!({"succeeded": 0, "skipped": []}))
        .await
        .expect("complete failed");

    let err = fail_pipeline_run(&pool, run.id, "late failure")
        .await
        .expect_err("failing a done run should be rejected");
    assert!(matches!(
        err,
        gapscan_db::DbError::InvalidPipelineRunTransition { .. }
    ));
}

#[sqlx::test(migrations = "../../migrations")]
async fn unknown_public_id_is_not_found(pool: sqlx::PgPool) {
    let err = get_pipeline_run_by_public_id(&pool, uuid::Uuid::new_v4())
        .await
        .expect_err("unknown public_id should be NotFound");
    assert!(matches!(err, gapscan_db::DbError::NotFound));
}

#[sqlx::test(migrations = "../../migrations")]
async fn list_pipeline_runs_returns_most_recent_first(pool: sqlx::PgPool) {
    let first = create_pipeline_run(&pool, "scrape", Platform::Etsy, monday(), "cli")
        .await
        .expect("create failed");
    let second = create_pipeline_run(&pool, "compute", Platform::Etsy, monday(), "cli")
        .await
        .expect("create failed");

    let runs = list_pipeline_runs(&pool, 10).await.expect("list failed");
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].id, second.id);
    assert_eq!(runs[1].id, first.id);
}

// ---------------------------------------------------------------------------
// Section 4: full pipeline against Postgres
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn pipeline_scores_week_and_is_idempotent(pool: sqlx::PgPool) {
    let signals = vec![
        signal(Platform::Etsy, "digital planners", MetricType::Demand, "review_count", 500.0),
        signal(Platform::Etsy, "digital planners", MetricType::Demand, "avg_rating", 4.8),
        signal(Platform::Etsy, "digital planners", MetricType::Supply, "listing_count", 200.0),
        signal(Platform::Etsy, "digital planners", MetricType::Supply, "avg_price", 12.0),
        signal(Platform::Etsy, "stock photos", MetricType::Demand, "review_count", 100.0),
        signal(Platform::Etsy, "stock photos", MetricType::Demand, "avg_rating", 4.2),
        signal(Platform::Etsy, "stock photos", MetricType::Supply, "listing_count", 9000.0),
        signal(Platform::Etsy, "stock photos", MetricType::Supply, "avg_price", 5.0),
    ];
    upsert_raw_signals(&pool, &signals).await.expect("seed failed");

    let store = PgSignalStore::new(pool.clone());
    let scoring = ScoringConfig::embedded_default().expect("embedded scoring config");
    let options = PipelineOptions::default();

    let summary = run_pipeline(&store, &scoring, Platform::Etsy, monday(), &options)
        .await
        .expect("pipeline run failed");
    assert_eq!(summary.succeeded, 2);
    assert!(summary.skipped.is_empty());

    let first_rows = load_gap_scores(&pool, Platform::Etsy, monday())
        .await
        .expect("load failed");
    assert_eq!(first_rows.len(), 2);
    assert_eq!(first_rows[0].category, "digital planners");
    assert_eq!(first_rows[0].gap_score, 1.0);
    assert_eq!(first_rows[0].verdict, "high_opportunity");
    assert_eq!(first_rows[1].category, "stock photos");
    assert_eq!(first_rows[1].gap_score, 0.0);
    assert_eq!(first_rows[1].verdict, "saturated");

    // Normalized values were written back onto the metric rows.
    let normalized_count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM marketplace_metrics \
         WHERE platform = 'etsy' AND normalized_value IS NOT NULL",
    )
    .fetch_one(&pool)
    .await
    .expect("count failed");
    assert_eq!(normalized_count, 8);

    // Rerun: identical rows, original created_at preserved.
    let rerun_summary = run_pipeline(&store, &scoring, Platform::Etsy, monday(), &options)
        .await
        .expect("rerun failed");
    assert_eq!(rerun_summary, summary);

    let second_rows = load_gap_scores(&pool, Platform::Etsy, monday())
        .await
        .expect("load failed");
    for (before, after) in first_rows.iter().zip(&second_rows) {
        assert_eq!(before.id, after.id);
        assert_eq!(before.created_at, after.created_at);
        assert_eq!(before.gap_score, after.gap_score);
        assert_eq!(before.verdict, after.verdict);
    }
}
