//! Flag API handlers
//!
//! GET/POST /flags, GET/PATCH/DELETE /flags/:id, and the per-flag comment
//! thread.

use axum::{
    extract::{Extension, Path, Query, State},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vigil_common::types::{FlagSource, FlagStatus, RuleType, UserRole};

use crate::api::AuthUser;
use crate::db;
use crate::db::flags::FlagFilter;
use crate::error::{ApiError, ApiResult};
use crate::models::{Flag, ReviewUpdate};
use crate::pagination::calculate_pagination;
use crate::services;
use crate::AppState;

/// GET /flags query parameters (camelCase on the wire)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagListQuery {
    pub status: Option<FlagStatus>,
    pub scan_job_id: Option<Uuid>,
    pub publisher_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub rule_id: Option<Uuid>,
    pub ai_ruling: Option<String>,
    pub human_verdict: Option<String>,
    pub assignee_id: Option<Uuid>,
    pub platform: Option<String>,
    pub created_after: Option<chrono::DateTime<chrono::Utc>>,
    pub created_before: Option<chrono::DateTime<chrono::Utc>>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

/// Pagination envelope returned when `page`/`pageSize` are present
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedFlags {
    pub data: Vec<Flag>,
    pub total_flags: i64,
    pub current_page: i64,
    pub page_size: i64,
    pub total_pages: i64,
}

/// GET /flags
///
/// Filterable; paginated when `page`/`pageSize` are given, else a flat
/// array.
pub async fn list_flags(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Query(query): Query<FlagListQuery>,
) -> ApiResult<Response> {
    let filter = FlagFilter {
        organization_id: Some(user.organization_id),
        status: query.status,
        scan_job_id: query.scan_job_id,
        publisher_id: query.publisher_id,
        product_id: query.product_id,
        rule_id: query.rule_id,
        ai_ruling: query.ai_ruling,
        human_verdict: query.human_verdict,
        assignee_id: query.assignee_id,
        platform: query.platform,
        created_after: query.created_after,
        created_before: query.created_before,
    };

    if query.page.is_none() && query.page_size.is_none() {
        let flags = db::flags::list_flags(&state.db, &filter, None, None).await?;
        return Ok(Json(flags).into_response());
    }

    let total = db::flags::count_flags(&state.db, &filter).await?;
    let pagination = calculate_pagination(total, query.page.unwrap_or(1), query.page_size);
    let data = db::flags::list_flags(
        &state.db,
        &filter,
        Some(pagination.page_size),
        Some(pagination.offset),
    )
    .await?;

    Ok(Json(PaginatedFlags {
        data,
        total_flags: total,
        current_page: pagination.page,
        page_size: pagination.page_size,
        total_pages: pagination.total_pages,
    })
    .into_response())
}

/// POST /flags request (manual/system flag creation)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFlagBody {
    pub content_item_id: Uuid,
    pub rule_id: Uuid,
    pub rule_type: RuleType,
    pub ai_confidence: f64,
    pub status: Option<FlagStatus>,
    pub flag_source: Option<FlagSource>,
    pub product_id: Option<Uuid>,
    pub ai_evaluation: Option<String>,
    pub ai_ruling: Option<String>,
}

/// POST /flags
pub async fn create_flag(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Json(body): Json<CreateFlagBody>,
) -> ApiResult<(axum::http::StatusCode, Json<Flag>)> {
    if user.role == UserRole::Publisher {
        return Err(ApiError::Forbidden(
            "Publishers may not create flags".to_string(),
        ));
    }

    let flag = services::flags::create_flag(
        &state.db,
        &state.event_bus,
        services::flags::CreateFlagRequest {
            content_item_id: body.content_item_id,
            rule_id: body.rule_id,
            rule_type: body.rule_type,
            ai_confidence: body.ai_confidence,
            status: body.status.unwrap_or(FlagStatus::Pending),
            flag_source: body.flag_source.unwrap_or(FlagSource::Manual),
            product_id: body.product_id,
            ai_evaluation: body.ai_evaluation,
            ai_ruling: body.ai_ruling,
        },
    )
    .await?;

    Ok((axum::http::StatusCode::CREATED, Json(flag)))
}

/// GET /flags/:id response: the flag with its nested collaborators
#[derive(Debug, Serialize)]
pub struct FlagDetail {
    #[serde(flatten)]
    pub flag: Flag,
    pub content_item: Option<db::content::ContentItem>,
    pub publisher: Option<db::content::Publisher>,
    pub scan_job: Option<crate::models::ScanJob>,
    pub product: Option<db::rules::Product>,
    pub rule: Option<db::rules::RuleRef>,
    pub reviewer: Option<db::users::User>,
    pub comments: Vec<db::comments::FlagComment>,
}

/// GET /flags/:id
pub async fn get_flag(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(flag_id): Path<Uuid>,
) -> ApiResult<Json<FlagDetail>> {
    let flag = load_flag_in_org(&state, flag_id, user.organization_id).await?;

    let content_item = db::content::get_content_item(&state.db, flag.content_item_id).await?;
    let publisher =
        db::content::get_publisher_for_content_item(&state.db, flag.content_item_id).await?;
    let scan_job = match db::flags::scan_job_for_content_item(&state.db, flag.content_item_id).await? {
        Some(job_id) => db::scan_jobs::get_scan_job(&state.db, job_id).await?,
        None => None,
    };
    let product = match flag.product_id {
        Some(product_id) => db::rules::get_product(&state.db, product_id).await?,
        None => None,
    };
    let rule = db::rules::get_rule(&state.db, flag.rule_id, flag.rule_type).await?;
    let reviewer = match flag.reviewer_id {
        Some(reviewer_id) => db::users::get_user(&state.db, reviewer_id).await?,
        None => None,
    };
    let comments = db::comments::list_comments(&state.db, flag_id).await?;

    Ok(Json(FlagDetail {
        flag,
        content_item,
        publisher,
        scan_job,
        product,
        rule,
        reviewer,
        comments,
    }))
}

/// PATCH /flags/:id request
#[derive(Debug, Deserialize)]
pub struct PatchFlagBody {
    pub status: Option<FlagStatus>,
    pub human_verdict: Option<vigil_common::types::HumanVerdict>,
    pub human_verdict_reasoning: Option<String>,
    pub internal_notes: Option<String>,
    pub feedback_notes: Option<String>,
}

/// PATCH /flags/:id
///
/// Reviewers and admins drive the full review workflow; publisher users
/// may only mark their remediation complete (REMEDIATING → CLOSED).
pub async fn patch_flag(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(flag_id): Path<Uuid>,
    Json(body): Json<PatchFlagBody>,
) -> ApiResult<Json<Flag>> {
    let current = load_flag_in_org(&state, flag_id, user.organization_id).await?;

    if user.role == UserRole::Publisher {
        let only_closing = body.status == Some(FlagStatus::Closed)
            && body.human_verdict.is_none()
            && body.human_verdict_reasoning.is_none()
            && body.internal_notes.is_none();
        if !only_closing || current.status != FlagStatus::Remediating {
            return Err(ApiError::Forbidden(
                "Publishers may only mark remediation complete".to_string(),
            ));
        }
    }

    let flag = services::flags::update_flag_review_status(
        &state.db,
        &state.event_bus,
        flag_id,
        user.id,
        ReviewUpdate {
            status: body.status,
            human_verdict: body.human_verdict,
            human_verdict_reasoning: body.human_verdict_reasoning,
            internal_notes: body.internal_notes,
            feedback_notes: body.feedback_notes,
        },
    )
    .await?;

    Ok(Json(flag))
}

/// DELETE /flags/:id (admin/reviewer only; audit-logged)
pub async fn delete_flag(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(flag_id): Path<Uuid>,
) -> ApiResult<axum::http::StatusCode> {
    services::flags::delete_flag(&state.db, &state.event_bus, flag_id, &user).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct CommentBody {
    pub body: String,
}

/// POST /flags/:id/comments
pub async fn post_comment(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(flag_id): Path<Uuid>,
    Json(body): Json<CommentBody>,
) -> ApiResult<(axum::http::StatusCode, Json<db::comments::FlagComment>)> {
    load_flag_in_org(&state, flag_id, user.organization_id).await?;
    let comment =
        services::flags::add_comment(&state.db, &state.event_bus, flag_id, &user, body.body)
            .await?;
    Ok((axum::http::StatusCode::CREATED, Json(comment)))
}

/// DELETE /flags/:id/comments/:comment_id (author or admin)
pub async fn delete_comment(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path((flag_id, comment_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<axum::http::StatusCode> {
    services::flags::delete_comment(&state.db, flag_id, comment_id, &user).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

/// Load a flag and hide it from callers outside its organization
async fn load_flag_in_org(
    state: &AppState,
    flag_id: Uuid,
    organization_id: Uuid,
) -> ApiResult<Flag> {
    let flag = db::flags::load_flag(&state.db, flag_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Flag {} not found", flag_id)))?;

    let publisher =
        db::content::get_publisher_for_content_item(&state.db, flag.content_item_id).await?;
    match publisher {
        Some(publisher) if publisher.organization_id == organization_id => Ok(flag),
        _ => Err(ApiError::NotFound(format!("Flag {} not found", flag_id))),
    }
}

/// Build flag routes
pub fn flag_routes() -> Router<AppState> {
    Router::new()
        .route("/flags", get(list_flags).post(create_flag))
        .route(
            "/flags/:id",
            get(get_flag).patch(patch_flag).delete(delete_flag),
        )
        .route("/flags/:id/comments", post(post_comment))
        .route(
            "/flags/:id/comments/:comment_id",
            delete(delete_comment),
        )
}
