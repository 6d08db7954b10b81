//! vigil-server library interface
//!
//! Exposes the application state, router assembly, and all internal
//! modules for integration testing.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod pagination;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::middleware;
use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use vigil_common::events::EventBus;

use crate::config::ServerConfig;
use crate::services::{ScanOrchestrator, ScreenshotService};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Shared database connection pool
    pub db: SqlitePool,
    /// Event bus feeding the SSE stream
    pub event_bus: EventBus,
    /// Resolved server configuration
    pub config: Arc<ServerConfig>,
    /// Scan fan-out orchestrator
    pub orchestrator: Arc<ScanOrchestrator>,
    /// Screenshot capture with cache-window reuse
    pub screenshots: Arc<ScreenshotService>,
    /// Service startup timestamp for uptime reporting
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        config: ServerConfig,
        orchestrator: ScanOrchestrator,
        screenshots: ScreenshotService,
    ) -> Self {
        Self {
            db,
            event_bus,
            config: Arc::new(config),
            orchestrator: Arc::new(orchestrator),
            screenshots: Arc::new(screenshots),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
///
/// `/health` is public; everything else sits behind the bearer-token
/// middleware.
pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .merge(api::flags::flag_routes())
        .merge(api::scan_jobs::scan_job_routes())
        .merge(api::dashboard::dashboard_routes())
        .merge(api::screenshots::screenshot_routes())
        .merge(api::audit::audit_routes())
        .merge(api::events::event_routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::require_auth,
        ));

    Router::new()
        .merge(api::health::health_routes())
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
