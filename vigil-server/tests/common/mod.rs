//! Shared helpers for vigil-server integration tests

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;
use vigil_common::events::EventBus;

use vigil_server::config::ServerConfig;
use vigil_server::services::screenshots::{CaptureError, CaptureService, ScreenshotService};
use vigil_server::services::scrape::{ExternalRunStatus, ScrapeError, ScrapeRunRequest, ScrapeService};
use vigil_server::services::ScanOrchestrator;
use vigil_server::AppState;

pub const ADMIN_TOKEN: &str = "admin-token";
pub const REVIEWER_TOKEN: &str = "reviewer-token";
pub const PUBLISHER_TOKEN: &str = "publisher-token";

/// Scripted scrape service fake shared with the app under test
#[derive(Default)]
pub struct ScriptedScraper {
    pub statuses: Mutex<HashMap<String, ExternalRunStatus>>,
    pub dispatched: AtomicUsize,
}

impl ScriptedScraper {
    pub fn set_status(&self, external_run_id: &str, status: ExternalRunStatus) {
        self.statuses
            .lock()
            .unwrap()
            .insert(external_run_id.to_string(), status);
    }
}

#[async_trait]
impl ScrapeService for ScriptedScraper {
    async fn start_run(&self, _request: &ScrapeRunRequest) -> Result<String, ScrapeError> {
        let n = self.dispatched.fetch_add(1, Ordering::SeqCst) + 1;
        let run_id = format!("ext-{}", n);
        self.statuses
            .lock()
            .unwrap()
            .insert(run_id.clone(), ExternalRunStatus::Running);
        Ok(run_id)
    }

    async fn run_status(&self, external_run_id: &str) -> Result<ExternalRunStatus, ScrapeError> {
        self.statuses
            .lock()
            .unwrap()
            .get(external_run_id)
            .cloned()
            .ok_or_else(|| ScrapeError::UnknownRun(external_run_id.to_string()))
    }
}

/// Capture fake returning deterministic URLs
pub struct FakeCapture {
    pub calls: AtomicUsize,
}

#[async_trait]
impl CaptureService for FakeCapture {
    async fn capture_frame(&self, video_id: &str, seconds: f64) -> Result<String, CaptureError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("https://frames.test/{}-{}-{}.jpg", video_id, seconds, n))
    }
}

/// Seeded reference ids
pub struct Seed {
    pub organization_id: Uuid,
    pub publisher_id: Uuid,
    pub channel_id: Uuid,
    pub second_channel_id: Uuid,
    pub scan_job_id: Uuid,
    pub content_item_id: Uuid,
    pub product_id: Uuid,
    pub product_rule_id: Uuid,
    pub channel_rule_id: Uuid,
}

/// App under test plus its collaborators
pub struct TestApp {
    pub app: axum::Router,
    pub db: SqlitePool,
    pub scraper: Arc<ScriptedScraper>,
    pub event_bus: EventBus,
    pub seed: Seed,
}

pub async fn spawn_test_app() -> TestApp {
    let db = vigil_common::db::init_memory_pool().await.unwrap();
    let seed = seed_database(&db).await;

    let event_bus = EventBus::new(100);
    let scraper = Arc::new(ScriptedScraper::default());
    let config = ServerConfig {
        bind_address: "127.0.0.1:0".to_string(),
        poll_interval_seconds: 15,
        screenshot_cache_window_seconds: 300,
        scrape_base_url: "http://scrape.test".to_string(),
        capture_base_url: "http://capture.test".to_string(),
    };
    let orchestrator = ScanOrchestrator::new(db.clone(), scraper.clone(), event_bus.clone());
    let screenshots = ScreenshotService::new(
        db.clone(),
        Arc::new(FakeCapture {
            calls: AtomicUsize::new(0),
        }),
        config.screenshot_cache_window_seconds,
    );

    let state = AppState::new(db.clone(), event_bus.clone(), config, orchestrator, screenshots);
    TestApp {
        app: vigil_server::build_router(state),
        db,
        scraper,
        event_bus,
        seed,
    }
}

async fn seed_database(db: &SqlitePool) -> Seed {
    let seed = Seed {
        organization_id: Uuid::new_v4(),
        publisher_id: Uuid::new_v4(),
        channel_id: Uuid::new_v4(),
        second_channel_id: Uuid::new_v4(),
        scan_job_id: Uuid::new_v4(),
        content_item_id: Uuid::new_v4(),
        product_id: Uuid::new_v4(),
        product_rule_id: Uuid::new_v4(),
        channel_rule_id: Uuid::new_v4(),
    };

    sqlx::query("INSERT INTO organizations (id, name) VALUES (?, 'Acme Compliance')")
        .bind(seed.organization_id.to_string())
        .execute(db)
        .await
        .unwrap();

    for (email, role, token) in [
        ("admin@acme.test", "ADMIN", ADMIN_TOKEN),
        ("reviewer@acme.test", "REVIEWER", REVIEWER_TOKEN),
        ("publisher@acme.test", "PUBLISHER", PUBLISHER_TOKEN),
    ] {
        sqlx::query(
            "INSERT INTO users (id, organization_id, email, role, api_token) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(seed.organization_id.to_string())
        .bind(email)
        .bind(role)
        .bind(token)
        .execute(db)
        .await
        .unwrap();
    }

    sqlx::query("INSERT INTO publishers (id, organization_id, name) VALUES (?, ?, 'Creator Co')")
        .bind(seed.publisher_id.to_string())
        .bind(seed.organization_id.to_string())
        .execute(db)
        .await
        .unwrap();

    for (id, platform, handle) in [
        (seed.channel_id, "youtube", "@creator"),
        (seed.second_channel_id, "instagram", "creator.co"),
    ] {
        sqlx::query(
            "INSERT INTO publisher_channels (id, publisher_id, platform, handle) VALUES (?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(seed.publisher_id.to_string())
        .bind(platform)
        .bind(handle)
        .execute(db)
        .await
        .unwrap();
    }

    sqlx::query("INSERT INTO products (id, organization_id, name) VALUES (?, ?, 'SuperSnack')")
        .bind(seed.product_id.to_string())
        .bind(seed.organization_id.to_string())
        .execute(db)
        .await
        .unwrap();

    sqlx::query(
        "INSERT INTO product_rules (id, product_id, name, description) VALUES (?, ?, 'No health claims', 'Content must not state medical benefits')",
    )
    .bind(seed.product_rule_id.to_string())
    .bind(seed.product_id.to_string())
    .execute(db)
    .await
    .unwrap();

    sqlx::query(
        "INSERT INTO channel_rules (id, organization_id, name, description) VALUES (?, ?, 'Ad disclosure', 'Sponsored content must be marked')",
    )
    .bind(seed.channel_rule_id.to_string())
    .bind(seed.organization_id.to_string())
    .execute(db)
    .await
    .unwrap();

    sqlx::query(
        "INSERT INTO scan_jobs (id, organization_id, status, created_at, updated_at) VALUES (?, ?, 'RUNNING', ?, ?)",
    )
    .bind(seed.scan_job_id.to_string())
    .bind(seed.organization_id.to_string())
    .bind(chrono::Utc::now().to_rfc3339())
    .bind(chrono::Utc::now().to_rfc3339())
    .execute(db)
    .await
    .unwrap();

    sqlx::query(
        "INSERT INTO content_items (id, channel_id, scan_job_id, title) VALUES (?, ?, ?, 'Unboxing video')",
    )
    .bind(seed.content_item_id.to_string())
    .bind(seed.channel_id.to_string())
    .bind(seed.scan_job_id.to_string())
    .execute(db)
    .await
    .unwrap();

    seed
}

/// Build a request with an optional bearer token and JSON body
pub fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    match body {
        Some(json) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Extract JSON body from a response
pub async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

/// Assert status and return parsed body
pub async fn expect_json(response: axum::response::Response, status: StatusCode) -> Value {
    assert_eq!(response.status(), status);
    extract_json(response.into_body()).await
}
