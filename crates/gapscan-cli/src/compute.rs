//! `compute` command: run the scoring pipeline for one or all platforms.

use chrono::NaiveDate;
use gapscan_core::{AppConfig, Platform, ScoringConfig};
use gapscan_db::PgSignalStore;
use gapscan_engine::{run_pipeline, PipelineOptions, SkipReason};
use sqlx::PgPool;

use crate::{fail_run_best_effort, parse_platform, resolve_week};

/// Score one week of stored signals, recording one `pipeline_runs` row per
/// platform.
///
/// Platform runs are isolated: a pipeline failure on one platform marks its
/// run failed and moves on. The command only errors out when run bookkeeping
/// itself fails or every platform run failed.
///
/// # Errors
///
/// Returns an error if the arguments are invalid, a run row cannot be
/// created or completed, or all platform runs failed.
pub(crate) async fn run_compute(
    pool: &PgPool,
    config: &AppConfig,
    scoring: &ScoringConfig,
    platform: Option<&str>,
    week: Option<NaiveDate>,
) -> anyhow::Result<()> {
    let week_start = resolve_week(week)?;

    let platforms: Vec<Platform> = match platform {
        Some(raw) => vec![parse_platform(raw)?],
        None => Platform::ALL
            .into_iter()
            .filter(|p| scoring.platform(*p).is_some())
            .collect(),
    };
    if platforms.is_empty() {
        anyhow::bail!("scoring config covers no platforms");
    }

    let options = PipelineOptions::from_app_config(config);
    let store = PgSignalStore::new(pool.clone());
    let platform_count = platforms.len();
    let mut failed_platforms = 0usize;

    for platform in platforms {
        let run =
            gapscan_db::create_pipeline_run(pool, "compute", platform, week_start, "cli").await?;
        if let Err(e) = gapscan_db::start_pipeline_run(pool, run.id).await {
            fail_run_best_effort(pool, run.id, "compute", format!("{e:#}")).await;
            return Err(e.into());
        }

        match run_pipeline(&store, scoring, platform, week_start, &options).await {
            Ok(summary) => {
                let categories_scored = i32::try_from(summary.succeeded).unwrap_or(i32::MAX);
                let summary_json = serde_json::to_value(&summary).unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "failed to serialize run summary");
                    serde_json::json!({})
                });
                if let Err(e) = gapscan_db::complete_pipeline_run(
                    pool,
                    run.id,
                    categories_scored,
                    &summary_json,
                )
                .await
                {
                    fail_run_best_effort(pool, run.id, "compute", format!("{e:#}")).await;
                    return Err(e.into());
                }
                println!(
                    "{platform}: scored {} categories ({} skipped) for week {week_start}",
                    summary.succeeded,
                    summary.skipped.len()
                );
                for skip in &summary.skipped {
                    println!("  skipped '{}' ({})", skip.category, skip_label(skip.reason));
                }
            }
            Err(e) => {
                tracing::error!(platform = %platform, error = %e, "compute run failed");
                fail_run_best_effort(pool, run.id, "compute", format!("{e:#}")).await;
                failed_platforms += 1;
            }
        }
    }

    if failed_platforms == platform_count {
        anyhow::bail!("all {failed_platforms} platform runs failed");
    }
    if failed_platforms > 0 {
        tracing::warn!(
            failed_platforms,
            total_platforms = platform_count,
            "some platform runs failed"
        );
    }
    Ok(())
}

fn skip_label(reason: SkipReason) -> &'static str {
    match reason {
        SkipReason::MissingDemandSignals => "missing demand signals",
        SkipReason::MissingSupplySignals => "missing supply signals",
        SkipReason::StorageTimeout => "storage timeout",
        SkipReason::StorageError => "storage error",
    }
}
