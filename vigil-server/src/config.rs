//! Configuration resolution for the Vigil API server
//!
//! Runtime knobs resolve ENV → TOML → compiled default; the scrape API key
//! resolves with Database → ENV → TOML priority, the database being
//! authoritative so the key can be rotated from the settings surface
//! without a restart file edit.

use sqlx::SqlitePool;
use tracing::{info, warn};
use vigil_common::config::TomlConfig;
use vigil_common::{Error, Result};

/// Documented poll interval for the scan run monitor
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 15;
/// Default screenshot reuse window
pub const DEFAULT_CACHE_WINDOW_SECS: u64 = 300;
const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:5810";
const DEFAULT_SCRAPE_BASE_URL: &str = "https://api.scrapehub.example.com";
const DEFAULT_CAPTURE_BASE_URL: &str = "https://frames.scrapehub.example.com";

/// Resolved server configuration, passed explicitly to the components that
/// need it at construction time
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: String,
    pub poll_interval_seconds: u64,
    pub screenshot_cache_window_seconds: u64,
    pub scrape_base_url: String,
    pub capture_base_url: String,
}

impl ServerConfig {
    /// Resolve runtime knobs from environment variables and the TOML config
    pub fn resolve(toml_config: &TomlConfig) -> Self {
        let bind_address = std::env::var("VIGIL_BIND_ADDRESS")
            .ok()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let poll_interval_seconds = env_u64("VIGIL_POLL_INTERVAL_SECONDS")
            .or(toml_config.poll_interval_seconds)
            .unwrap_or(DEFAULT_POLL_INTERVAL_SECS);

        let screenshot_cache_window_seconds = env_u64("VIGIL_SCREENSHOT_CACHE_WINDOW_SECONDS")
            .or(toml_config.screenshot_cache_window_seconds)
            .unwrap_or(DEFAULT_CACHE_WINDOW_SECS);

        let scrape_base_url = std::env::var("VIGIL_SCRAPE_BASE_URL")
            .ok()
            .or_else(|| toml_config.scrape_base_url.clone())
            .unwrap_or_else(|| DEFAULT_SCRAPE_BASE_URL.to_string());

        let capture_base_url = std::env::var("VIGIL_CAPTURE_BASE_URL")
            .ok()
            .or_else(|| toml_config.capture_base_url.clone())
            .unwrap_or_else(|| DEFAULT_CAPTURE_BASE_URL.to_string());

        Self {
            bind_address,
            poll_interval_seconds,
            screenshot_cache_window_seconds,
            scrape_base_url,
            capture_base_url,
        }
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

/// Resolve the scrape-service API key from 3-tier configuration
///
/// **Priority:** Database → ENV → TOML
pub async fn resolve_scrape_api_key(db: &SqlitePool, toml_config: &TomlConfig) -> Result<String> {
    let mut sources = Vec::new();

    // Tier 1: Database (authoritative)
    let db_key = vigil_common::db::get_setting(db, "scrape_api_key").await?;
    if let Some(key) = &db_key {
        if is_valid_key(key) {
            sources.push("database");
        }
    }

    // Tier 2: Environment variable
    let env_key = std::env::var("VIGIL_SCRAPE_API_KEY").ok();
    if let Some(key) = &env_key {
        if is_valid_key(key) {
            sources.push("environment");
        }
    }

    // Tier 3: TOML config
    let toml_key = toml_config.scrape_api_key.as_ref();
    if let Some(key) = toml_key {
        if is_valid_key(key) {
            sources.push("TOML");
        }
    }

    // Warn if multiple sources (potential misconfiguration)
    if sources.len() > 1 {
        warn!(
            "Scrape API key found in multiple sources: {}. Using database (highest priority).",
            sources.join(", ")
        );
    }

    if let Some(key) = db_key {
        if is_valid_key(&key) {
            info!("Scrape API key loaded from database");
            return Ok(key);
        }
    }

    if let Some(key) = env_key {
        if is_valid_key(&key) {
            info!("Scrape API key loaded from environment variable");
            return Ok(key);
        }
    }

    if let Some(key) = toml_key {
        if is_valid_key(key) {
            info!("Scrape API key loaded from TOML config");
            return Ok(key.clone());
        }
    }

    Err(Error::Config(
        "Scrape API key not configured. Please configure using one of:\n\
         1. Settings table: key 'scrape_api_key'\n\
         2. Environment: VIGIL_SCRAPE_API_KEY=your-key-here\n\
         3. TOML config: ~/.config/vigil/config.toml (scrape_api_key = \"your-key\")"
            .to_string(),
    ))
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
