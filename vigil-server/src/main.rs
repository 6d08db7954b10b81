//! vigil-server - Compliance Review API
//!
//! Serves the flag review workflow, scan orchestration, and dashboard
//! aggregation over HTTP, and runs the scan-run monitor in-process.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use vigil_common::events::EventBus;

use vigil_server::config::{resolve_scrape_api_key, ServerConfig};
use vigil_server::services::{
    monitor,
    screenshots::{HttpCaptureClient, ScreenshotService},
    HttpScrapeClient, ScanOrchestrator,
};
use vigil_server::AppState;

#[derive(Parser, Debug)]
#[command(name = "vigil-server", about = "Vigil compliance review API server")]
struct Args {
    /// Data directory holding vigil.db (overrides env and TOML)
    #[arg(long)]
    root_folder: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing (RUST_LOG overrides the default filter)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting vigil-server (Compliance Review API)");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Step 1: Resolve root folder and load TOML config
    let root_folder = vigil_common::config::resolve_root_folder(
        args.root_folder.as_deref(),
        "VIGIL_ROOT_FOLDER",
    );
    vigil_common::config::ensure_root_folder(&root_folder)
        .map_err(|e| anyhow::anyhow!("Failed to initialize root folder: {}", e))?;

    let toml_config = vigil_common::config::load_toml_config(
        &vigil_common::config::default_config_path(),
    )
    .unwrap_or_default();
    let config = ServerConfig::resolve(&toml_config);

    // Step 2: Open or create database
    let db_path = vigil_common::config::database_path(&root_folder);
    info!("Database: {}", db_path.display());
    let db_pool = vigil_common::db::init_database_pool(&db_path).await?;
    info!("Database connection established");

    // Step 3: External collaborators
    let scrape_api_key = resolve_scrape_api_key(&db_pool, &toml_config).await?;
    let scraper = Arc::new(HttpScrapeClient::new(
        config.scrape_base_url.clone(),
        scrape_api_key,
    )?);
    let capture = Arc::new(HttpCaptureClient::new(config.capture_base_url.clone())?);

    // Step 4: Application state
    let event_bus = EventBus::new(100);
    let orchestrator = ScanOrchestrator::new(db_pool.clone(), scraper.clone(), event_bus.clone());
    let screenshots = ScreenshotService::new(
        db_pool.clone(),
        capture,
        config.screenshot_cache_window_seconds,
    );
    let state = AppState::new(
        db_pool.clone(),
        event_bus.clone(),
        config.clone(),
        orchestrator,
        screenshots,
    );

    // Step 5: Background scan-run monitor (same process as the API)
    monitor::start_monitoring(db_pool, scraper, event_bus, config.poll_interval_seconds);

    // Step 6: Serve
    let app = vigil_server::build_router(state);
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!("Listening on http://{}", config.bind_address);
    info!("Health check: http://{}/health", config.bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
