//! Audit log API handler (admin only)

use axum::{
    extract::{Extension, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use vigil_common::types::UserRole;

use crate::api::AuthUser;
use crate::db;
use crate::db::audit::AuditEntry;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditListQuery {
    pub entity_type: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

/// GET /audit-logs
pub async fn list_audit_logs(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Query(query): Query<AuditListQuery>,
) -> ApiResult<Json<Vec<AuditEntry>>> {
    if user.role != UserRole::Admin {
        return Err(ApiError::Forbidden(
            "Only admins may read audit logs".to_string(),
        ));
    }

    let page = query.page.unwrap_or(1).max(1);
    let page_size = query.page_size.unwrap_or(50).clamp(1, 500);
    let entries = db::audit::list_audit_entries(
        &state.db,
        user.organization_id,
        query.entity_type.as_deref(),
        page_size,
        (page - 1) * page_size,
    )
    .await?;

    Ok(Json(entries))
}

/// Build audit routes
pub fn audit_routes() -> Router<AppState> {
    Router::new().route("/audit-logs", get(list_audit_logs))
}
