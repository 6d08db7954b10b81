//! Screenshot capture with cache-window reuse
//!
//! Frame capture itself is an external collaborator; this service decides
//! whether a previously captured frame is fresh enough to reuse, persists
//! new captures as content images, and links the frame to the requesting
//! flag's image reference.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use std::time::Duration as StdDuration;
use thiserror::Error;
use uuid::Uuid;
use vigil_common::{Error, Result};

use crate::db;
use crate::db::content::ContentImage;

/// Capture client errors
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Client-side view of the external frame-capture service
#[async_trait]
pub trait CaptureService: Send + Sync {
    /// Capture one frame; returns the stored frame URL
    async fn capture_frame(&self, video_id: &str, seconds: f64) -> std::result::Result<String, CaptureError>;
}

#[derive(Debug, serde::Deserialize)]
struct CaptureResponse {
    url: String,
}

/// HTTP implementation of [`CaptureService`]
///
/// Capture is expensive on the far side; requests are paced to one per
/// second in addition to the cache-window reuse upstream.
pub struct HttpCaptureClient {
    http_client: reqwest::Client,
    base_url: String,
    last_request: tokio::sync::Mutex<Option<std::time::Instant>>,
    min_interval: StdDuration,
}

impl HttpCaptureClient {
    pub fn new(base_url: String) -> std::result::Result<Self, CaptureError> {
        let http_client = reqwest::Client::builder()
            .timeout(StdDuration::from_secs(60))
            .build()
            .map_err(|e| CaptureError::Network(e.to_string()))?;
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            last_request: tokio::sync::Mutex::new(None),
            min_interval: StdDuration::from_millis(1000),
        })
    }

    async fn pace(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(std::time::Instant::now());
    }
}

#[async_trait]
impl CaptureService for HttpCaptureClient {
    async fn capture_frame(&self, video_id: &str, seconds: f64) -> std::result::Result<String, CaptureError> {
        self.pace().await;

        let response = self
            .http_client
            .post(format!("{}/v1/frames", self.base_url))
            .json(&serde_json::json!({ "video_id": video_id, "seconds": seconds }))
            .send()
            .await
            .map_err(|e| CaptureError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CaptureError::Api(status.as_u16(), body));
        }

        let parsed: CaptureResponse = response
            .json()
            .await
            .map_err(|e| CaptureError::Parse(e.to_string()))?;
        Ok(parsed.url)
    }
}

/// Result returned to the screenshot endpoint
#[derive(Debug, Clone, serde::Serialize)]
pub struct ScreenshotResult {
    pub image_id: Uuid,
    pub url: String,
    /// True when a frame inside the cache window was reused
    pub cached: bool,
}

pub struct ScreenshotService {
    db: SqlitePool,
    capture: std::sync::Arc<dyn CaptureService>,
    cache_window_seconds: u64,
}

impl ScreenshotService {
    pub fn new(
        db: SqlitePool,
        capture: std::sync::Arc<dyn CaptureService>,
        cache_window_seconds: u64,
    ) -> Self {
        Self {
            db,
            capture,
            cache_window_seconds,
        }
    }

    /// Return a cached or freshly captured frame and link it to the flag
    pub async fn screenshot_for_flag(
        &self,
        flag_id: Uuid,
        video_id: &str,
        seconds: f64,
    ) -> Result<ScreenshotResult> {
        let flag = db::flags::load_flag(&self.db, flag_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Flag {} not found", flag_id)))?;

        let cutoff = Utc::now() - Duration::seconds(self.cache_window_seconds as i64);
        if let Some(image) = db::content::find_cached_image(&self.db, video_id, seconds, cutoff).await? {
            db::flags::set_flag_image(&self.db, flag_id, image.id).await?;
            tracing::debug!(flag_id = %flag_id, image_id = %image.id, "Screenshot served from cache");
            return Ok(ScreenshotResult {
                image_id: image.id,
                url: image.url,
                cached: true,
            });
        }

        let url = self
            .capture
            .capture_frame(video_id, seconds)
            .await
            .map_err(|e| Error::Internal(format!("Frame capture failed: {}", e)))?;

        let image = ContentImage {
            id: Uuid::new_v4(),
            content_item_id: flag.content_item_id,
            url: url.clone(),
            video_id: Some(video_id.to_string()),
            frame_seconds: Some(seconds),
            captured_at: Some(Utc::now().to_rfc3339()),
        };
        db::content::insert_content_image(&self.db, &image).await?;
        db::flags::set_flag_image(&self.db, flag_id, image.id).await?;

        tracing::info!(flag_id = %flag_id, image_id = %image.id, "Frame captured and linked");
        Ok(ScreenshotResult {
            image_id: image.id,
            url,
            cached: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::content::tests_support::seed_content;
    use crate::models::Flag;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use vigil_common::db::init_memory_pool;
    use vigil_common::types::{FlagSource, FlagStatus, RuleType};

    struct CountingCapture {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CaptureService for CountingCapture {
        async fn capture_frame(
            &self,
            video_id: &str,
            seconds: f64,
        ) -> std::result::Result<String, CaptureError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("https://frames.test/{}-{}-{}.jpg", video_id, seconds, n))
        }
    }

    #[tokio::test]
    async fn test_second_request_within_window_reuses_frame() {
        let pool = init_memory_pool().await.unwrap();
        let seeded = seed_content(&pool).await;
        let flag = Flag::new(
            seeded.content_item_id,
            seeded.channel_rule_id,
            RuleType::Channel,
            90.0,
            FlagStatus::Pending,
            FlagSource::Ai,
            None,
            None,
        );
        db::flags::save_flag(&pool, &flag).await.unwrap();

        let capture = Arc::new(CountingCapture {
            calls: AtomicUsize::new(0),
        });
        let service = ScreenshotService::new(pool.clone(), capture.clone(), 300);

        let first = service
            .screenshot_for_flag(flag.id, "vid-9", 42.0)
            .await
            .unwrap();
        assert!(!first.cached);

        let second = service
            .screenshot_for_flag(flag.id, "vid-9", 42.0)
            .await
            .unwrap();
        assert!(second.cached);
        assert_eq!(second.image_id, first.image_id);
        assert_eq!(capture.calls.load(Ordering::SeqCst), 1);

        // A different frame second is a cache miss
        let third = service
            .screenshot_for_flag(flag.id, "vid-9", 43.0)
            .await
            .unwrap();
        assert!(!third.cached);
        assert_eq!(capture.calls.load(Ordering::SeqCst), 2);

        // Flag now references the most recent frame
        let loaded = db::flags::load_flag(&pool, flag.id).await.unwrap().unwrap();
        assert_eq!(loaded.image_id, Some(third.image_id));
    }

    #[tokio::test]
    async fn test_screenshot_for_missing_flag_is_not_found() {
        let pool = init_memory_pool().await.unwrap();
        seed_content(&pool).await;
        let service = ScreenshotService::new(
            pool,
            Arc::new(CountingCapture {
                calls: AtomicUsize::new(0),
            }),
            300,
        );

        let err = service
            .screenshot_for_flag(Uuid::new_v4(), "vid", 1.0)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
