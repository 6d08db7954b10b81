//! Screenshot API handler

use axum::{
    extract::{Extension, State},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::AuthUser;
use crate::error::ApiResult;
use crate::services::screenshots::ScreenshotResult;
use crate::AppState;

/// POST /screenshots request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotBody {
    pub video_id: String,
    pub seconds: f64,
    pub flag_id: Uuid,
}

/// POST /screenshots
///
/// Returns a cached or freshly captured frame URL and links it to the
/// flag's image reference.
pub async fn create_screenshot(
    State(state): State<AppState>,
    Extension(AuthUser(_user)): Extension<AuthUser>,
    Json(body): Json<ScreenshotBody>,
) -> ApiResult<Json<ScreenshotResult>> {
    let result = state
        .screenshots
        .screenshot_for_flag(body.flag_id, &body.video_id, body.seconds)
        .await?;
    Ok(Json(result))
}

/// Build screenshot routes
pub fn screenshot_routes() -> Router<AppState> {
    Router::new().route("/screenshots", post(create_screenshot))
}
