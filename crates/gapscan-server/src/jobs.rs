//! Background job bodies shared by the API trigger endpoints and the
//! scheduler.
//!
//! Every job wraps a `pipeline_runs` row: it moves the row to `running`,
//! does the work, and records the outcome. Job functions never return
//! errors; failures are logged and written to the run row so the caller
//! (a spawned task or a cron tick) has nothing to handle.

use chrono::NaiveDate;
use gapscan_core::{AppConfig, Platform, ScoringConfig};
use gapscan_db::PgSignalStore;
use gapscan_engine::{run_pipeline, PipelineOptions};
use gapscan_scraper::{collect_platform_signals, ScrapeClient};
use sqlx::PgPool;

/// Drives one compute run: normalize, aggregate, and score every category
/// with signals for (platform, week), then persist the gap scores.
pub async fn run_compute_job(
    pool: &PgPool,
    scoring: &ScoringConfig,
    options: &PipelineOptions,
    run_id: i64,
    platform: Platform,
    week_start: NaiveDate,
) {
    if let Err(e) = gapscan_db::start_pipeline_run(pool, run_id).await {
        tracing::error!(run_id, error = %e, "compute run could not be started");
        fail_run(pool, run_id, &format!("could not start run: {e}")).await;
        return;
    }

    let store = PgSignalStore::new(pool.clone());
    match run_pipeline(&store, scoring, platform, week_start, options).await {
        Ok(summary) => {
            let categories_scored = i32::try_from(summary.succeeded).unwrap_or(i32::MAX);
            let summary_json = match serde_json::to_value(&summary) {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(run_id, error = %e, "failed to serialize run summary");
                    serde_json::json!({})
                }
            };
            if let Err(e) =
                gapscan_db::complete_pipeline_run(pool, run_id, categories_scored, &summary_json)
                    .await
            {
                tracing::error!(run_id, error = %e, "failed to record compute run completion");
                return;
            }
            tracing::info!(
                run_id,
                platform = %platform,
                week_start = %week_start,
                scored = summary.succeeded,
                skipped = summary.skipped.len(),
                "compute run complete"
            );
        }
        Err(e) => {
            tracing::error!(
                run_id,
                platform = %platform,
                week_start = %week_start,
                error = %e,
                "compute run failed"
            );
            fail_run(pool, run_id, &e.to_string()).await;
        }
    }
}

/// Drives one scrape run: collect raw signals for every category on
/// (platform, week) and upsert them.
///
/// Categories are isolated: a collection or storage error for one category
/// is recorded and the rest still run. The run only fails outright when no
/// category could be collected at all. `categories_scored` on the run row
/// counts categories that stored at least one signal.
pub async fn run_scrape_job(
    pool: &PgPool,
    config: &AppConfig,
    run_id: i64,
    platform: Platform,
    categories: &[String],
    week_start: NaiveDate,
) {
    if let Err(e) = gapscan_db::start_pipeline_run(pool, run_id).await {
        tracing::error!(run_id, error = %e, "scrape run could not be started");
        fail_run(pool, run_id, &format!("could not start run: {e}")).await;
        return;
    }

    let client = match ScrapeClient::from_app_config(config) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!(run_id, error = %e, "scrape run could not build HTTP client");
            fail_run(pool, run_id, &format!("could not build HTTP client: {e}")).await;
            return;
        }
    };

    let mut signals_stored = 0usize;
    let mut categories_with_signals = 0usize;
    let mut failed_categories: Vec<String> = Vec::new();

    for category in categories {
        match collect_platform_signals(&client, config, platform, category, week_start).await {
            Ok(signals) if signals.is_empty() => {
                tracing::info!(
                    run_id,
                    platform = %platform,
                    category = %category,
                    "scrape produced no signals for category"
                );
            }
            Ok(signals) => match gapscan_db::upsert_raw_signals(pool, &signals).await {
                Ok(stored) => {
                    signals_stored += stored;
                    categories_with_signals += 1;
                    tracing::info!(
                        run_id,
                        platform = %platform,
                        category = %category,
                        signals = stored,
                        "scraped signals stored"
                    );
                }
                Err(e) => {
                    tracing::error!(
                        run_id,
                        platform = %platform,
                        category = %category,
                        error = %e,
                        "failed to store scraped signals"
                    );
                    failed_categories.push(category.clone());
                }
            },
            Err(e) => {
                tracing::error!(
                    run_id,
                    platform = %platform,
                    category = %category,
                    error = %e,
                    "scrape failed for category"
                );
                failed_categories.push(category.clone());
            }
        }
    }

    if !categories.is_empty() && failed_categories.len() == categories.len() {
        fail_run(
            pool,
            run_id,
            &format!("all {} categories failed to scrape", categories.len()),
        )
        .await;
        return;
    }

    let summary_json = serde_json::json!({
        "categories_attempted": categories.len(),
        "categories_with_signals": categories_with_signals,
        "signals_stored": signals_stored,
        "failed_categories": failed_categories,
    });
    let categories_scored = i32::try_from(categories_with_signals).unwrap_or(i32::MAX);
    if let Err(e) =
        gapscan_db::complete_pipeline_run(pool, run_id, categories_scored, &summary_json).await
    {
        tracing::error!(run_id, error = %e, "failed to record scrape run completion");
        return;
    }
    tracing::info!(
        run_id,
        platform = %platform,
        week_start = %week_start,
        categories = categories.len(),
        signals = signals_stored,
        "scrape run complete"
    );
}

/// Best-effort transition to `failed`; a run already terminal is left alone.
async fn fail_run(pool: &PgPool, run_id: i64, message: &str) {
    if let Err(e) = gapscan_db::fail_pipeline_run(pool, run_id, message).await {
        tracing::warn!(run_id, error = %e, "failed to record run failure");
    }
}
