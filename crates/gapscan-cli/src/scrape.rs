//! `scrape` command: collect one category's raw signals for a week.

use chrono::NaiveDate;
use gapscan_core::{normalize_category, AppConfig};
use gapscan_scraper::{collect_platform_signals, ScrapeClient};
use sqlx::PgPool;

use crate::{fail_run_best_effort, parse_platform, resolve_week};

/// Scrape one (platform, category, week), store the raw signals, and record
/// the run in `pipeline_runs`.
///
/// # Errors
///
/// Returns an error if the arguments are invalid, the HTTP client cannot be
/// constructed, or the scrape or any database write fails. The run row is
/// marked failed before the error propagates.
pub(crate) async fn run_scrape(
    pool: &PgPool,
    config: &AppConfig,
    platform: &str,
    category: &str,
    week: Option<NaiveDate>,
) -> anyhow::Result<()> {
    let platform = parse_platform(platform)?;
    let category = normalize_category(category);
    if category.is_empty() {
        anyhow::bail!("category must not be blank");
    }
    let week_start = resolve_week(week)?;

    let client = ScrapeClient::from_app_config(config)?;

    let run = gapscan_db::create_pipeline_run(pool, "scrape", platform, week_start, "cli").await?;
    if let Err(e) = gapscan_db::start_pipeline_run(pool, run.id).await {
        fail_run_best_effort(pool, run.id, "scrape", format!("{e:#}")).await;
        return Err(e.into());
    }

    let signals =
        match collect_platform_signals(&client, config, platform, &category, week_start).await {
            Ok(signals) => signals,
            Err(e) => {
                fail_run_best_effort(pool, run.id, "scrape", format!("{e:#}")).await;
                return Err(e.into());
            }
        };

    if signals.is_empty() {
        let summary = scrape_summary(0, 0);
        if let Err(e) = gapscan_db::complete_pipeline_run(pool, run.id, 0, &summary).await {
            fail_run_best_effort(pool, run.id, "scrape", format!("{e:#}")).await;
            return Err(e.into());
        }
        println!("no signals found for '{category}' on {platform} (week {week_start})");
        return Ok(());
    }

    let stored = match gapscan_db::upsert_raw_signals(pool, &signals).await {
        Ok(stored) => stored,
        Err(e) => {
            fail_run_best_effort(pool, run.id, "scrape", format!("{e:#}")).await;
            return Err(e.into());
        }
    };

    let summary = scrape_summary(1, stored);
    if let Err(e) = gapscan_db::complete_pipeline_run(pool, run.id, 1, &summary).await {
        fail_run_best_effort(pool, run.id, "scrape", format!("{e:#}")).await;
        return Err(e.into());
    }
    println!("stored {stored} signals for '{category}' on {platform} (week {week_start})");
    Ok(())
}

fn scrape_summary(categories_with_signals: usize, signals_stored: usize) -> serde_json::Value {
    serde_json::json!({
        "categories_attempted": 1,
        "categories_with_signals": categories_with_signals,
        "signals_stored": signals_stored,
        "failed_categories": [],
    })
}
