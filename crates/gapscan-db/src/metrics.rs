//! Database operations for the `marketplace_metrics` table.

use chrono::{DateTime, NaiveDate, Utc};
use gapscan_core::{NormalizedSignal, Platform, RawSignal};
use sqlx::PgPool;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `marketplace_metrics` table.
///
/// `normalized_value` is `NULL` until the pipeline has scored the week, and
/// reset to `NULL` whenever a re-scrape changes `raw_value`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MetricRow {
    pub id: i64,
    pub platform: String,
    pub category: String,
    pub metric_type: String,
    pub metric_name: String,
    pub raw_value: f64,
    pub normalized_value: Option<f64>,
    pub week_start: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<MetricRow> for RawSignal {
    type Error = DbError;

    fn try_from(row: MetricRow) -> Result<Self, Self::Error> {
        let platform: Platform = row
            .platform
            .parse()
            .map_err(|e: gapscan_core::SignalError| DbError::InvalidRow(e.to_string()))?;
        let metric_type = row
            .metric_type
            .parse()
            .map_err(|e: gapscan_core::SignalError| DbError::InvalidRow(e.to_string()))?;
        RawSignal::new(
            platform,
            &row.category,
            metric_type,
            row.metric_name,
            row.raw_value,
            row.week_start,
        )
        .map_err(|e| DbError::InvalidRow(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Inserts or updates the raw signal row for its natural key
/// (platform, category, metric_name, week_start).
///
/// A conflicting re-scrape overwrites `raw_value` and clears
/// `normalized_value`, since the stored normalization no longer matches the
/// new raw reading. Returns the internal `id` of the row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_raw_signal(pool: &PgPool, signal: &RawSignal) -> Result<i64, DbError> {
    let id: i64 = sqlx::query_scalar::<_, i64>(
        "INSERT INTO marketplace_metrics \
             (platform, category, metric_type, metric_name, raw_value, week_start) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         ON CONFLICT (platform, category, metric_name, week_start) DO UPDATE SET \
             metric_type      = EXCLUDED.metric_type, \
             raw_value        = EXCLUDED.raw_value, \
             normalized_value = NULL, \
             updated_at       = NOW() \
         RETURNING id",
    )
    .bind(signal.platform.as_str())
    .bind(&signal.category)
    .bind(signal.metric_type.as_str())
    .bind(&signal.metric_name)
    .bind(signal.raw_value)
    .bind(signal.week_start)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Upserts a batch of raw signals, returning how many rows were written.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] on the first failing upsert.
pub async fn upsert_raw_signals(pool: &PgPool, signals: &[RawSignal]) -> Result<usize, DbError> {
    let mut written = 0;
    for signal in signals {
        upsert_raw_signal(pool, signal).await?;
        written += 1;
    }
    Ok(written)
}

/// Loads every raw signal stored for `platform` in the week starting at
/// `week_start`, ordered by category then metric name.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails, or [`DbError::InvalidRow`]
/// if a stored row no longer passes signal validation.
pub async fn load_raw_signals(
    pool: &PgPool,
    platform: Platform,
    week_start: NaiveDate,
) -> Result<Vec<RawSignal>, DbError> {
    let rows = sqlx::query_as::<_, MetricRow>(
        "SELECT id, platform, category, metric_type, metric_name, raw_value, \
                normalized_value, week_start, created_at, updated_at \
         FROM marketplace_metrics \
         WHERE platform = $1 AND week_start = $2 \
         ORDER BY category, metric_name",
    )
    .bind(platform.as_str())
    .bind(week_start)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(RawSignal::try_from).collect()
}

/// Writes normalized values back onto their raw rows, returning how many
/// rows were updated. Signals whose raw row has vanished are not counted.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] on the first failing update.
pub async fn update_normalized_values(
    pool: &PgPool,
    signals: &[NormalizedSignal],
) -> Result<usize, DbError> {
    let mut updated = 0;
    for signal in signals {
        let result = sqlx::query(
            "UPDATE marketplace_metrics \
             SET normalized_value = $1, updated_at = NOW() \
             WHERE platform = $2 AND category = $3 AND metric_name = $4 AND week_start = $5",
        )
        .bind(signal.normalized_value)
        .bind(signal.platform.as_str())
        .bind(&signal.category)
        .bind(&signal.metric_name)
        .bind(signal.week_start)
        .execute(pool)
        .await?;
        updated += usize::try_from(result.rows_affected()).unwrap_or(0);
    }
    Ok(updated)
}
