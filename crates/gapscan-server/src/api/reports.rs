use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use gapscan_db::GapScoreRow;
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{
    map_db_error, normalize_limit, resolve_week_start, ApiError, ApiResponse, AppState,
    ResponseMeta,
};

/// Rows on each side of the weekly summary.
const SUMMARY_RANK_SIZE: i64 = 5;

#[derive(Debug, Deserialize)]
pub(super) struct OpportunitiesQuery {
    pub week_start: Option<NaiveDate>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct SummaryQuery {
    pub week_start: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub(super) struct GapScoreItem {
    platform: String,
    category: String,
    week_start: NaiveDate,
    demand_score: f64,
    supply_score: f64,
    gap_score: f64,
    verdict: String,
    created_at: DateTime<Utc>,
    recomputed_at: DateTime<Utc>,
}

impl From<GapScoreRow> for GapScoreItem {
    fn from(row: GapScoreRow) -> Self {
        Self {
            platform: row.platform,
            category: row.category,
            week_start: row.week_start,
            demand_score: row.demand_score,
            supply_score: row.supply_score,
            gap_score: row.gap_score,
            verdict: row.verdict,
            created_at: row.created_at,
            recomputed_at: row.recomputed_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct WeeklySummary {
    week_start: NaiveDate,
    top_opportunities: Vec<GapScoreItem>,
    most_saturated: Vec<GapScoreItem>,
}

/// `GET /api/v1/opportunities` — the week's gap scores across all platforms,
/// highest gap first, ties broken by category name.
pub(super) async fn list_opportunities(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<OpportunitiesQuery>,
) -> Result<Json<ApiResponse<Vec<GapScoreItem>>>, ApiError> {
    let week_start = resolve_week_start(&req_id.0, query.week_start)?;

    let rows =
        gapscan_db::list_top_gap_scores(&state.pool, week_start, normalize_limit(query.limit))
            .await
            .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(GapScoreItem::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// `GET /api/v1/summary` — the week's best opportunities and most saturated
/// categories side by side.
pub(super) async fn weekly_summary(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<ApiResponse<WeeklySummary>>, ApiError> {
    let week_start = resolve_week_start(&req_id.0, query.week_start)?;

    let top = gapscan_db::list_top_gap_scores(&state.pool, week_start, SUMMARY_RANK_SIZE)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let bottom = gapscan_db::list_bottom_gap_scores(&state.pool, week_start, SUMMARY_RANK_SIZE)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: WeeklySummary {
            week_start,
            top_opportunities: top.into_iter().map(GapScoreItem::from).collect(),
            most_saturated: bottom.into_iter().map(GapScoreItem::from).collect(),
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}
