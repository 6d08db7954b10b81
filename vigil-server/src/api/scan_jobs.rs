//! Scan job API handlers

use axum::{
    extract::{Extension, Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::AuthUser;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{ScanJob, ScanJobRun};
use crate::services::scan::MultiTargetScan;
use crate::AppState;

/// POST /scan-jobs/start-channel-scan request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartChannelScanBody {
    pub publisher_channel_id: Uuid,
}

/// POST /scan-jobs/start-channel-scan
pub async fn start_channel_scan(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Json(body): Json<StartChannelScanBody>,
) -> ApiResult<(axum::http::StatusCode, Json<ScanJob>)> {
    let job = state
        .orchestrator
        .start_channel_scan(user.organization_id, body.publisher_channel_id)
        .await?;
    Ok((axum::http::StatusCode::ACCEPTED, Json(job)))
}

/// POST /scan-jobs/start-multi-target-scan request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartMultiTargetScanBody {
    pub publisher_ids: Vec<Uuid>,
    #[serde(default)]
    pub platform_types: Vec<String>,
    #[serde(default)]
    pub product_ids: Vec<Uuid>,
    pub job_name: Option<String>,
    pub job_description: Option<String>,
}

/// POST /scan-jobs/start-multi-target-scan response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartMultiTargetScanResponse {
    #[serde(flatten)]
    pub job: ScanJob,
    pub run_count: usize,
}

/// POST /scan-jobs/start-multi-target-scan
pub async fn start_multi_target_scan(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Json(body): Json<StartMultiTargetScanBody>,
) -> ApiResult<(axum::http::StatusCode, Json<StartMultiTargetScanResponse>)> {
    let (job, runs) = state
        .orchestrator
        .start_multi_target_scan(
            user.organization_id,
            MultiTargetScan {
                publisher_ids: body.publisher_ids,
                platform_types: body.platform_types,
                product_ids: body.product_ids,
                job_name: body.job_name,
                job_description: body.job_description,
            },
        )
        .await?;

    Ok((
        axum::http::StatusCode::ACCEPTED,
        Json(StartMultiTargetScanResponse {
            job,
            run_count: runs.len(),
        }),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanJobListQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

/// GET /scan-jobs
pub async fn list_scan_jobs(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Query(query): Query<ScanJobListQuery>,
) -> ApiResult<Json<Vec<ScanJob>>> {
    let page = query.page.unwrap_or(1).max(1);
    let page_size = query.page_size.unwrap_or(50).clamp(1, 500);
    let jobs = db::scan_jobs::list_scan_jobs(
        &state.db,
        user.organization_id,
        page_size,
        (page - 1) * page_size,
    )
    .await?;
    Ok(Json(jobs))
}

/// GET /scan-jobs/:id response
#[derive(Debug, Serialize)]
pub struct ScanJobDetail {
    #[serde(flatten)]
    pub job: ScanJob,
    pub runs: Vec<ScanJobRun>,
}

/// GET /scan-jobs/:id
pub async fn get_scan_job(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<ScanJobDetail>> {
    let job = db::scan_jobs::get_scan_job(&state.db, job_id)
        .await?
        .filter(|job| job.organization_id == user.organization_id)
        .ok_or_else(|| ApiError::NotFound(format!("Scan job {} not found", job_id)))?;

    let runs = db::scan_jobs::list_runs_for_job(&state.db, job_id).await?;
    Ok(Json(ScanJobDetail { job, runs }))
}

/// Build scan job routes
pub fn scan_job_routes() -> Router<AppState> {
    Router::new()
        .route("/scan-jobs/start-channel-scan", post(start_channel_scan))
        .route(
            "/scan-jobs/start-multi-target-scan",
            post(start_multi_target_scan),
        )
        .route("/scan-jobs", get(list_scan_jobs))
        .route("/scan-jobs/:id", get(get_scan_job))
}
