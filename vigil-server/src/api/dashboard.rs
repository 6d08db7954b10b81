//! Dashboard API handlers
//!
//! Read-only aggregates over flag engine data, recomputed per request.

use axum::{
    extract::{Extension, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::api::AuthUser;
use crate::db;
use crate::db::dashboard::{AgreementStats, DashboardFilter, ViolationRate};
use crate::error::ApiResult;
use crate::AppState;

/// Shared dashboard query parameters
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardQuery {
    pub publisher_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub from: Option<chrono::DateTime<chrono::Utc>>,
    pub to: Option<chrono::DateTime<chrono::Utc>>,
}

impl DashboardQuery {
    fn into_filter(self, organization_id: Uuid) -> DashboardFilter {
        DashboardFilter {
            organization_id,
            publisher_id: self.publisher_id,
            product_id: self.product_id,
            from: self.from,
            to: self.to,
        }
    }
}

/// GET /dashboard/summary response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_flags: i64,
    pub counts_by_status: HashMap<String, i64>,
    pub violation_rate_by_publisher: Vec<ViolationRate>,
    pub violation_rate_by_product: Vec<ViolationRate>,
    pub agreement: AgreementStats,
}

/// GET /dashboard/summary
pub async fn summary(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Query(query): Query<DashboardQuery>,
) -> ApiResult<Json<DashboardSummary>> {
    let filter = query.into_filter(user.organization_id);

    let counts = db::dashboard::counts_by_status(&state.db, &filter).await?;
    let total_flags = counts.iter().map(|(_, n)| n).sum();
    let counts_by_status: HashMap<String, i64> = counts.into_iter().collect();

    let violation_rate_by_publisher =
        db::dashboard::violation_rate_by_publisher(&state.db, &filter).await?;
    let violation_rate_by_product =
        db::dashboard::violation_rate_by_product(&state.db, &filter).await?;
    let agreement = db::dashboard::agreement_rate(&state.db, &filter).await?;

    Ok(Json(DashboardSummary {
        total_flags,
        counts_by_status,
        violation_rate_by_publisher,
        violation_rate_by_product,
        agreement,
    }))
}

/// GET /dashboard/confidence-histogram response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceHistogram {
    /// Ten buckets covering the 0-100 confidence scale
    pub buckets: [i64; 10],
    pub bucket_width: u32,
}

/// GET /dashboard/confidence-histogram
pub async fn confidence_histogram(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Query(query): Query<DashboardQuery>,
) -> ApiResult<Json<ConfidenceHistogram>> {
    let filter = query.into_filter(user.organization_id);
    let buckets = db::dashboard::confidence_histogram(&state.db, &filter).await?;
    Ok(Json(ConfidenceHistogram {
        buckets,
        bucket_width: 10,
    }))
}

/// GET /dashboard/remediation-trend response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemediationTrend {
    /// Mean remediation duration in the requested window (seconds)
    pub average_seconds: Option<f64>,
    /// Mean over the preceding window of equal length
    pub previous_average_seconds: Option<f64>,
    /// Current minus previous; negative means remediation is speeding up
    pub trend_delta_seconds: Option<f64>,
}

/// GET /dashboard/remediation-trend
///
/// Compares the requested window against the preceding window of equal
/// length. Defaults to the last 30 days.
pub async fn remediation_trend(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Query(query): Query<DashboardQuery>,
) -> ApiResult<Json<RemediationTrend>> {
    let to = query.to.unwrap_or_else(chrono::Utc::now);
    let from = query
        .from
        .unwrap_or_else(|| to - chrono::Duration::days(30));
    let window = to - from;

    let current_filter = DashboardFilter {
        organization_id: user.organization_id,
        publisher_id: query.publisher_id,
        product_id: query.product_id,
        from: Some(from),
        to: Some(to),
    };
    let previous_filter = DashboardFilter {
        from: Some(from - window),
        to: Some(from),
        ..current_filter.clone()
    };

    let average_seconds =
        db::dashboard::average_remediation_seconds(&state.db, &current_filter).await?;
    let previous_average_seconds =
        db::dashboard::average_remediation_seconds(&state.db, &previous_filter).await?;
    let trend_delta_seconds = match (average_seconds, previous_average_seconds) {
        (Some(current), Some(previous)) => Some(current - previous),
        _ => None,
    };

    Ok(Json(RemediationTrend {
        average_seconds,
        previous_average_seconds,
        trend_delta_seconds,
    }))
}

/// Build dashboard routes
pub fn dashboard_routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard/summary", get(summary))
        .route("/dashboard/confidence-histogram", get(confidence_histogram))
        .route("/dashboard/remediation-trend", get(remediation_trend))
}
