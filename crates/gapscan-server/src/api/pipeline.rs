use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use gapscan_core::{normalize_category, Platform};
use gapscan_db::PipelineRunRow;
use gapscan_engine::PipelineOptions;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::jobs;
use crate::middleware::RequestId;

use super::{
    map_db_error, normalize_limit, resolve_week_start, ApiError, ApiResponse, AppState,
    ResponseMeta,
};

#[derive(Debug, Deserialize)]
pub(super) struct ComputeRunRequest {
    pub platform: String,
    pub week_start: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ScrapeRunRequest {
    pub category: String,
    pub week_start: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RunsQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct PipelineRunItem {
    run_id: Uuid,
    run_type: String,
    platform: String,
    week_start: NaiveDate,
    trigger_source: String,
    status: String,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    categories_scored: i32,
    summary: Option<serde_json::Value>,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<PipelineRunRow> for PipelineRunItem {
    fn from(row: PipelineRunRow) -> Self {
        Self {
            run_id: row.public_id,
            run_type: row.run_type,
            platform: row.platform,
            week_start: row.week_start,
            trigger_source: row.trigger_source,
            status: row.status,
            started_at: row.started_at,
            completed_at: row.completed_at,
            categories_scored: row.categories_scored,
            summary: row.summary,
            error_message: row.error_message,
            created_at: row.created_at,
        }
    }
}

fn parse_platform(request_id: &str, raw: &str) -> Result<Platform, ApiError> {
    raw.parse()
        .map_err(|e: gapscan_core::SignalError| {
            ApiError::new(request_id, "validation_error", e.to_string())
        })
}

/// `POST /api/v1/pipeline/run` — queue a compute run for one (platform, week).
///
/// Returns `202 Accepted` with the pending run; the scoring work itself
/// happens on a spawned task and is observable via the run endpoints.
pub(super) async fn trigger_compute_run(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<ComputeRunRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PipelineRunItem>>), ApiError> {
    let platform = parse_platform(&req_id.0, &body.platform)?;
    let week_start = resolve_week_start(&req_id.0, body.week_start)?;

    let run = gapscan_db::create_pipeline_run(&state.pool, "compute", platform, week_start, "api")
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let pool = state.pool.clone();
    let scoring = state.scoring.clone();
    let options = PipelineOptions::from_app_config(&state.config);
    let run_db_id = run.id;
    tokio::spawn(async move {
        jobs::run_compute_job(&pool, &scoring, &options, run_db_id, platform, week_start).await;
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse {
            data: PipelineRunItem::from(run),
            meta: ResponseMeta::new(req_id.0),
        }),
    ))
}

/// `POST /api/v1/scrape/{platform}` — queue a scrape run for one category.
pub(super) async fn trigger_scrape_run(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(platform): Path<String>,
    Json(body): Json<ScrapeRunRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PipelineRunItem>>), ApiError> {
    let platform = parse_platform(&req_id.0, &platform)?;
    let category = normalize_category(&body.category);
    if category.is_empty() {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            "category must not be blank",
        ));
    }
    let week_start = resolve_week_start(&req_id.0, body.week_start)?;

    let run = gapscan_db::create_pipeline_run(&state.pool, "scrape", platform, week_start, "api")
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let pool = state.pool.clone();
    let config = state.config.clone();
    let run_db_id = run.id;
    tokio::spawn(async move {
        jobs::run_scrape_job(
            &pool,
            &config,
            run_db_id,
            platform,
            &[category],
            week_start,
        )
        .await;
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse {
            data: PipelineRunItem::from(run),
            meta: ResponseMeta::new(req_id.0),
        }),
    ))
}

/// `GET /api/v1/pipeline/runs/{run_id}` — look up one run by public id.
pub(super) async fn get_run(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(run_id): Path<Uuid>,
) -> Result<Json<ApiResponse<PipelineRunItem>>, ApiError> {
    let row = gapscan_db::get_pipeline_run_by_public_id(&state.pool, run_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: PipelineRunItem::from(row),
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// `GET /api/v1/pipeline/runs` — most recent runs, newest first.
pub(super) async fn list_runs(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<RunsQuery>,
) -> Result<Json<ApiResponse<Vec<PipelineRunItem>>>, ApiError> {
    let rows = gapscan_db::list_pipeline_runs(&state.pool, normalize_limit(query.limit))
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(PipelineRunItem::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_run_item_is_serializable() {
        let item = PipelineRunItem {
            run_id: Uuid::new_v4(),
            run_type: "compute".to_string(),
            platform: "etsy".to_string(),
            week_start: NaiveDate::from_ymd_opt(2025, 12, 22).expect("date"),
            trigger_source: "api".to_string(),
            status: "pending".to_string(),
            started_at: None,
            completed_at: None,
            categories_scored: 0,
            summary: None,
            error_message: None,
            created_at: Utc::now(),
        };

        let json = serde_json::to_string(&item).expect("serialize pipeline run");
        assert!(json.contains("\"run_type\":\"compute\""));
        assert!(json.contains("\"week_start\":\"2025-12-22\""));
    }

    #[test]
    fn parse_platform_rejects_unknown_names() {
        let err = parse_platform("req-1", "ebay").expect_err("unknown platform");
        assert_eq!(err.error.code, "validation_error");
        assert!(err.error.message.contains("ebay"));
    }
}
