//! Database operations for the `gap_scores` table.

use chrono::{DateTime, NaiveDate, Utc};
use gapscan_core::{GapScore, Platform, Verdict};
use sqlx::PgPool;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `gap_scores` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GapScoreRow {
    pub id: i64,
    pub platform: String,
    pub category: String,
    pub week_start: NaiveDate,
    pub demand_score: f64,
    pub supply_score: f64,
    pub gap_score: f64,
    pub verdict: String,
    pub created_at: DateTime<Utc>,
    pub recomputed_at: DateTime<Utc>,
}

impl TryFrom<GapScoreRow> for GapScore {
    type Error = DbError;

    fn try_from(row: GapScoreRow) -> Result<Self, Self::Error> {
        let platform: Platform = row
            .platform
            .parse()
            .map_err(|e: gapscan_core::SignalError| DbError::InvalidRow(e.to_string()))?;
        let verdict: Verdict = row
            .verdict
            .parse()
            .map_err(|e: gapscan_core::SignalError| DbError::InvalidRow(e.to_string()))?;
        Ok(GapScore {
            platform,
            category: row.category,
            week_start: row.week_start,
            demand_score: row.demand_score,
            supply_score: row.supply_score,
            gap_score: row.gap_score,
            verdict,
        })
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Inserts or overwrites the gap score row for its natural key
/// (platform, category, week_start).
///
/// A conflicting recompute overwrites the three scores and the verdict and
/// bumps `recomputed_at`; `created_at` keeps the first compute time.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_gap_score(pool: &PgPool, score: &GapScore) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO gap_scores \
             (platform, category, week_start, demand_score, supply_score, gap_score, verdict) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         ON CONFLICT (platform, category, week_start) DO UPDATE SET \
             demand_score  = EXCLUDED.demand_score, \
             supply_score  = EXCLUDED.supply_score, \
             gap_score     = EXCLUDED.gap_score, \
             verdict       = EXCLUDED.verdict, \
             recomputed_at = NOW()",
    )
    .bind(score.platform.as_str())
    .bind(&score.category)
    .bind(score.week_start)
    .bind(score.demand_score)
    .bind(score.supply_score)
    .bind(score.gap_score)
    .bind(score.verdict.as_str())
    .execute(pool)
    .await?;

    Ok(())
}

/// Returns the week's gap scores across all platforms, highest gap first,
/// ties broken by category name so the ranking is deterministic.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_top_gap_scores(
    pool: &PgPool,
    week_start: NaiveDate,
    limit: i64,
) -> Result<Vec<GapScoreRow>, DbError> {
    let rows = sqlx::query_as::<_, GapScoreRow>(
        "SELECT id, platform, category, week_start, demand_score, supply_score, \
                gap_score, verdict, created_at, recomputed_at \
         FROM gap_scores \
         WHERE week_start = $1 \
         ORDER BY gap_score DESC, category ASC \
         LIMIT $2",
    )
    .bind(week_start)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns the week's most saturated categories, lowest gap first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_bottom_gap_scores(
    pool: &PgPool,
    week_start: NaiveDate,
    limit: i64,
) -> Result<Vec<GapScoreRow>, DbError> {
    let rows = sqlx::query_as::<_, GapScoreRow>(
        "SELECT id, platform, category, week_start, demand_score, supply_score, \
                gap_score, verdict, created_at, recomputed_at \
         FROM gap_scores \
         WHERE week_start = $1 \
         ORDER BY gap_score ASC, category ASC \
         LIMIT $2",
    )
    .bind(week_start)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns one platform's gap scores for a week, ordered by category.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn load_gap_scores(
    pool: &PgPool,
    platform: Platform,
    week_start: NaiveDate,
) -> Result<Vec<GapScoreRow>, DbError> {
    let rows = sqlx::query_as::<_, GapScoreRow>(
        "SELECT id, platform, category, week_start, demand_score, supply_score, \
                gap_score, verdict, created_at, recomputed_at \
         FROM gap_scores \
         WHERE platform = $1 AND week_start = $2 \
         ORDER BY category ASC",
    )
    .bind(platform.as_str())
    .bind(week_start)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
