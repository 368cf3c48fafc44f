//! Background job scheduler.
//!
//! Initialises a [`JobScheduler`] at server startup and registers the
//! weekly scrape-and-score job.

use std::sync::Arc;

use gapscan_core::{week_start_for, AppConfig, Platform, ScoringConfig};
use gapscan_engine::PipelineOptions;
use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use crate::jobs;

/// Builds and starts the background job scheduler.
///
/// Registers all recurring jobs and starts the scheduler. Returns the
/// running [`JobScheduler`] handle, which must be kept alive for the
/// lifetime of the process — dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// a job cannot be registered, or the scheduler fails to start.
pub async fn build_scheduler(
    pool: PgPool,
    config: Arc<AppConfig>,
    scoring: Arc<ScoringConfig>,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    register_weekly_gap_job(&scheduler, pool, config, scoring).await?;

    scheduler.start().await?;
    Ok(scheduler)
}

/// Register the weekly scrape-and-score job.
///
/// Runs every Monday at 03:00 UTC (`0 0 3 * * MON`). For each scored
/// platform the job scrapes every watchlist category for the current week,
/// then computes gap scores over whatever signals the week now holds.
async fn register_weekly_gap_job(
    scheduler: &JobScheduler,
    pool: PgPool,
    config: Arc<AppConfig>,
    scoring: Arc<ScoringConfig>,
) -> Result<(), JobSchedulerError> {
    let pool = Arc::new(pool);

    let job = Job::new_async("0 0 3 * * MON", move |_uuid, _lock| {
        let pool = Arc::clone(&pool);
        let config = Arc::clone(&config);
        let scoring = Arc::clone(&scoring);

        Box::pin(async move {
            tracing::info!("scheduler: starting weekly gap score run");
            run_weekly_gap_job(&pool, &config, &scoring).await;
            tracing::info!("scheduler: weekly gap score run complete");
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

/// Drive scrape and compute runs for every platform in the scoring config.
async fn run_weekly_gap_job(pool: &PgPool, config: &AppConfig, scoring: &ScoringConfig) {
    let week_start = week_start_for(chrono::Utc::now().date_naive());
    let watchlist = scoring.watchlist_categories();

    if watchlist.is_empty() {
        tracing::warn!("scheduler: scoring config has an empty watchlist; nothing to scrape");
    }

    let options = PipelineOptions::from_app_config(config);

    for platform in Platform::ALL {
        if scoring.platform(platform).is_none() {
            tracing::warn!(
                platform = %platform,
                "scheduler: platform missing from scoring config; skipping"
            );
            continue;
        }

        if !watchlist.is_empty() {
            match gapscan_db::create_pipeline_run(pool, "scrape", platform, week_start, "scheduler")
                .await
            {
                Ok(run) => {
                    jobs::run_scrape_job(pool, config, run.id, platform, &watchlist, week_start)
                        .await;
                }
                Err(e) => {
                    tracing::error!(
                        platform = %platform,
                        error = %e,
                        "scheduler: failed to create scrape run"
                    );
                }
            }
        }

        match gapscan_db::create_pipeline_run(pool, "compute", platform, week_start, "scheduler")
            .await
        {
            Ok(run) => {
                jobs::run_compute_job(pool, scoring, &options, run.id, platform, week_start).await;
            }
            Err(e) => {
                tracing::error!(
                    platform = %platform,
                    error = %e,
                    "scheduler: failed to create compute run"
                );
            }
        }
    }
}
