//! Database operations for the `pipeline_runs` table.

use chrono::{DateTime, NaiveDate, Utc};
use gapscan_core::Platform;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `pipeline_runs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PipelineRunRow {
    pub id: i64,
    pub public_id: Uuid,
    /// Either `scrape` or `compute`.
    pub run_type: String,
    pub platform: String,
    pub week_start: NaiveDate,
    pub trigger_source: String,
    pub status: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// The schema defines this as `INTEGER NOT NULL DEFAULT 0`.
    pub categories_scored: i32,
    /// JSONB run summary written on completion.
    pub summary: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Creates a new run in `pending` status.
///
/// Generates a UUID in Rust and binds it to `public_id`. Returns the full
/// newly-created row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert or fetch fails.
pub async fn create_pipeline_run(
    pool: &PgPool,
    run_type: &str,
    platform: Platform,
    week_start: NaiveDate,
    trigger_source: &str,
) -> Result<PipelineRunRow, DbError> {
    let public_id = Uuid::new_v4();

    let row = sqlx::query_as::<_, PipelineRunRow>(
        "INSERT INTO pipeline_runs (public_id, run_type, platform, week_start, trigger_source, status) \
         VALUES ($1, $2, $3, $4, $5, 'pending') \
         RETURNING id, public_id, run_type, platform, week_start, trigger_source, status, \
                   started_at, completed_at, categories_scored, summary, error_message, created_at",
    )
    .bind(public_id)
    .bind(run_type)
    .bind(platform.as_str())
    .bind(week_start)
    .bind(trigger_source)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Marks a run as `running` and sets `started_at = NOW()`.
///
/// # Errors
///
/// Returns [`DbError::InvalidPipelineRunTransition`] if the run is not
/// `pending`, or [`DbError::Sqlx`] if the update fails.
pub async fn start_pipeline_run(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE pipeline_runs \
         SET status = 'running', started_at = NOW() \
         WHERE id = $1 AND status = 'pending'",
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidPipelineRunTransition {
            id,
            expected_status: "pending",
        });
    }

    Ok(())
}

/// Marks a run as `done`, recording how many categories got a gap score and
/// the serialized run summary.
///
/// # Errors
///
/// Returns [`DbError::InvalidPipelineRunTransition`] if the run is not
/// `running`, or [`DbError::Sqlx`] if the update fails.
pub async fn complete_pipeline_run(
    pool: &PgPool,
    id: i64,
    categories_scored: i32,
    summary: &serde_json::Value,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE pipeline_runs \
         SET status = 'done', completed_at = NOW(), categories_scored = $1, summary = $2 \
         WHERE id = $3 AND status = 'running'",
    )
    .bind(categories_scored)
    .bind(summary)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidPipelineRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// Marks a run as `failed` with an error message. A run can fail from
/// `pending` (startup errors) as well as from `running`.
///
/// # Errors
///
/// Returns [`DbError::InvalidPipelineRunTransition`] if the run is already
/// terminal, or [`DbError::Sqlx`] if the update fails.
pub async fn fail_pipeline_run(pool: &PgPool, id: i64, error_message: &str) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE pipeline_runs \
         SET status = 'failed', completed_at = NOW(), error_message = $1 \
         WHERE id = $2 AND status IN ('pending', 'running')",
    )
    .bind(error_message)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidPipelineRunTransition {
            id,
            expected_status: "pending or running",
        });
    }

    Ok(())
}

/// Fetches a single run by its externally visible `public_id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given id, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_pipeline_run_by_public_id(
    pool: &PgPool,
    public_id: Uuid,
) -> Result<PipelineRunRow, DbError> {
    let row = sqlx::query_as::<_, PipelineRunRow>(
        "SELECT id, public_id, run_type, platform, week_start, trigger_source, status, \
                started_at, completed_at, categories_scored, summary, error_message, created_at \
         FROM pipeline_runs \
         WHERE public_id = $1",
    )
    .bind(public_id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Returns the most recent `limit` runs, ordered by `created_at DESC`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_pipeline_runs(pool: &PgPool, limit: i64) -> Result<Vec<PipelineRunRow>, DbError> {
    let rows = sqlx::query_as::<_, PipelineRunRow>(
        "SELECT id, public_id, run_type, platform, week_start, trigger_source, status, \
                started_at, completed_at, categories_scored, summary, error_message, created_at \
         FROM pipeline_runs \
         ORDER BY created_at DESC, id DESC \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
