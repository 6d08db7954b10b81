//! Scan orchestration
//!
//! Translates a scan request (single channel, or publishers × platforms
//! with optional focus products) into one master scan job plus one scan run
//! per matched channel, each dispatched to the external scrape service.
//! Completion is reconciled asynchronously by the monitor task.

use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;
use vigil_common::events::EventBus;
use vigil_common::types::ScanRunStatus;
use vigil_common::{Error, Result};

use crate::db;
use crate::db::content::Channel;
use crate::models::{ScanJob, ScanJobRun};

use super::scrape::{ScrapeRunRequest, ScrapeService};

/// Parameters for a multi-target scan
#[derive(Debug, Clone)]
pub struct MultiTargetScan {
    pub publisher_ids: Vec<Uuid>,
    pub platform_types: Vec<String>,
    pub product_ids: Vec<Uuid>,
    pub job_name: Option<String>,
    pub job_description: Option<String>,
}

pub struct ScanOrchestrator {
    db: SqlitePool,
    scraper: Arc<dyn ScrapeService>,
    event_bus: EventBus,
}

impl ScanOrchestrator {
    pub fn new(db: SqlitePool, scraper: Arc<dyn ScrapeService>, event_bus: EventBus) -> Self {
        Self {
            db,
            scraper,
            event_bus,
        }
    }

    /// Start a scan of a single publisher channel
    pub async fn start_channel_scan(
        &self,
        organization_id: Uuid,
        channel_id: Uuid,
    ) -> Result<ScanJob> {
        let channel = db::content::get_channel(&self.db, channel_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Channel {} not found", channel_id)))?;
        let publisher = db::content::get_publisher(&self.db, channel.publisher_id)
            .await?
            .ok_or_else(|| Error::Internal(format!("Channel {} has no publisher", channel_id)))?;
        if publisher.organization_id != organization_id {
            return Err(Error::NotFound(format!("Channel {} not found", channel_id)));
        }

        let job = ScanJob::new(
            organization_id,
            Some(format!("Channel scan: {}", channel.handle)),
            None,
        );
        db::scan_jobs::insert_scan_job(&self.db, &job).await?;

        self.dispatch_run(&job, &channel).await?;

        tracing::info!(scan_job_id = %job.id, channel_id = %channel_id, "Channel scan started");
        Ok(job)
    }

    /// Start a scan across publishers × platforms, with optional focus
    /// products recorded on the job
    pub async fn start_multi_target_scan(
        &self,
        organization_id: Uuid,
        request: MultiTargetScan,
    ) -> Result<(ScanJob, Vec<ScanJobRun>)> {
        if request.publisher_ids.is_empty() {
            return Err(Error::InvalidInput(
                "At least one publisher is required".to_string(),
            ));
        }
        for publisher_id in &request.publisher_ids {
            let publisher = db::content::get_publisher(&self.db, *publisher_id)
                .await?
                .ok_or_else(|| {
                    Error::InvalidInput(format!("Publisher {} does not exist", publisher_id))
                })?;
            if publisher.organization_id != organization_id {
                return Err(Error::InvalidInput(format!(
                    "Publisher {} does not exist",
                    publisher_id
                )));
            }
        }

        let channels = db::content::list_channels_for_targets(
            &self.db,
            &request.publisher_ids,
            &request.platform_types,
        )
        .await?;
        if channels.is_empty() {
            return Err(Error::InvalidInput(
                "No channels match the requested publishers and platforms".to_string(),
            ));
        }

        let job = ScanJob::new(organization_id, request.job_name, request.job_description);
        db::scan_jobs::insert_scan_job(&self.db, &job).await?;
        db::scan_jobs::set_focus_products(&self.db, job.id, &request.product_ids).await?;

        // One run per channel; a failed dispatch marks that run FAILED
        // without blocking its siblings.
        let mut runs = Vec::with_capacity(channels.len());
        for channel in &channels {
            runs.push(self.dispatch_run(&job, channel).await?);
        }

        tracing::info!(
            scan_job_id = %job.id,
            run_count = runs.len(),
            "Multi-target scan started"
        );
        Ok((job, runs))
    }

    /// Create one run row and submit it to the scrape service
    ///
    /// Dispatch failure is terminal for the run (no retry) and is recorded
    /// on the row rather than propagated, so sibling runs proceed.
    async fn dispatch_run(&self, job: &ScanJob, channel: &Channel) -> Result<ScanJobRun> {
        let mut run = ScanJobRun::new(job.id, channel.id);
        db::scan_jobs::insert_scan_run(&self.db, &run).await?;

        let request = ScrapeRunRequest {
            platform: channel.platform.clone(),
            handle: channel.handle.clone(),
            channel_url: channel.url.clone(),
        };

        match self.scraper.start_run(&request).await {
            Ok(external_run_id) => {
                db::scan_jobs::set_external_run_id(&self.db, run.id, &external_run_id).await?;
                run.external_run_id = Some(external_run_id);
                tracing::debug!(
                    run_id = %run.id,
                    external_run_id = ?run.external_run_id,
                    "Scrape run dispatched"
                );
            }
            Err(e) => {
                tracing::warn!(
                    run_id = %run.id,
                    channel_id = %channel.id,
                    error = %e,
                    "Scrape dispatch failed; run marked FAILED"
                );
                db::scan_jobs::set_run_status(
                    &self.db,
                    run.id,
                    ScanRunStatus::Failed,
                    Some(&e.to_string()),
                )
                .await?;
                run.status = ScanRunStatus::Failed;
                run.error_message = Some(e.to_string());
                self.event_bus
                    .emit(vigil_common::events::VigilEvent::ScanRunStatusChanged {
                        run_id: run.id,
                        scan_job_id: job.id,
                        new_status: ScanRunStatus::Failed,
                        timestamp: chrono::Utc::now(),
                    })
                    .ok();
            }
        }

        Ok(run)
    }
}
