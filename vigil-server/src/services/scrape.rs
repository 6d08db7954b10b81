//! External scrape service client
//!
//! The scrape service is a collaborator: one run per channel is submitted,
//! the service returns a run identifier, and the monitor polls that
//! identifier until the run settles. Internal behavior of the service is
//! out of scope; this module only speaks its HTTP API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;

const USER_AGENT: &str = "Vigil/0.1.0 (compliance scanner)";
const RATE_LIMIT_MS: u64 = 250; // 4 requests per second against the scrape API
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Scrape client errors
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unknown external run: {0}")]
    UnknownRun(String),
}

/// Status reported by the external service for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternalRunStatus {
    Running,
    Succeeded,
    Failed { error: String },
}

/// Parameters for submitting one scrape run
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeRunRequest {
    pub platform: String,
    pub handle: String,
    pub channel_url: Option<String>,
}

/// Client-side view of the external scrape service
#[async_trait]
pub trait ScrapeService: Send + Sync {
    /// Submit one run; returns the external run identifier
    async fn start_run(&self, request: &ScrapeRunRequest) -> Result<String, ScrapeError>;

    /// Poll one run's status by its external identifier
    async fn run_status(&self, external_run_id: &str) -> Result<ExternalRunStatus, ScrapeError>;
}

/// Minimum-interval rate limiter shared across client calls
struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval_ms: u64) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval: Duration::from_millis(min_interval_ms),
        }
    }

    async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!("Scrape API rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

#[derive(Debug, Deserialize)]
struct StartRunResponse {
    run_id: String,
}

#[derive(Debug, Deserialize)]
struct RunStatusResponse {
    status: String,
    #[serde(default)]
    error: Option<String>,
}

/// HTTP implementation of [`ScrapeService`]
pub struct HttpScrapeClient {
    http_client: reqwest::Client,
    rate_limiter: RateLimiter,
    base_url: String,
    api_key: String,
}

impl HttpScrapeClient {
    pub fn new(base_url: String, api_key: String) -> Result<Self, ScrapeError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| ScrapeError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            rate_limiter: RateLimiter::new(RATE_LIMIT_MS),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl ScrapeService for HttpScrapeClient {
    async fn start_run(&self, request: &ScrapeRunRequest) -> Result<String, ScrapeError> {
        self.rate_limiter.wait().await;

        tracing::debug!(
            platform = %request.platform,
            handle = %request.handle,
            "Submitting scrape run"
        );

        let response = self
            .http_client
            .post(format!("{}/v1/runs", self.base_url))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| ScrapeError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ScrapeError::Api(status.as_u16(), body));
        }

        let parsed: StartRunResponse = response
            .json()
            .await
            .map_err(|e| ScrapeError::Parse(e.to_string()))?;
        Ok(parsed.run_id)
    }

    async fn run_status(&self, external_run_id: &str) -> Result<ExternalRunStatus, ScrapeError> {
        self.rate_limiter.wait().await;

        let response = self
            .http_client
            .get(format!("{}/v1/runs/{}", self.base_url, external_run_id))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| ScrapeError::Network(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Err(ScrapeError::UnknownRun(external_run_id.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ScrapeError::Api(status.as_u16(), body));
        }

        let parsed: RunStatusResponse = response
            .json()
            .await
            .map_err(|e| ScrapeError::Parse(e.to_string()))?;

        match parsed.status.as_str() {
            "RUNNING" | "QUEUED" => Ok(ExternalRunStatus::Running),
            "SUCCEEDED" => Ok(ExternalRunStatus::Succeeded),
            "FAILED" => Ok(ExternalRunStatus::Failed {
                error: parsed.error.unwrap_or_else(|| "scrape run failed".to_string()),
            }),
            other => Err(ScrapeError::Parse(format!(
                "Unexpected run status '{}'",
                other
            ))),
        }
    }
}
