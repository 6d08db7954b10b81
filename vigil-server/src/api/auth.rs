//! Bearer-token authentication middleware
//!
//! Every protected route requires `Authorization: Bearer <token>`; the
//! token is resolved against the users table and the matched user is made
//! available to handlers as an [`AuthUser`] extension.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};

use crate::db;
use crate::db::users::User;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Authenticated caller, inserted into request extensions by
/// [`require_auth`]
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".to_string()))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::Unauthorized("Expected a bearer token".to_string()))?;

    let user = db::users::get_user_by_token(&state.db, token)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid token".to_string()))?;

    tracing::debug!(user_id = %user.id, role = %user.role, "Request authenticated");
    request.extensions_mut().insert(AuthUser(user));
    Ok(next.run(request).await)
}
