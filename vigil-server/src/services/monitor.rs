//! Background monitoring task for scan runs
//!
//! A fixed-interval poll reconciles in-flight scan runs against the
//! external scrape service and rolls per-run outcomes up into job status.
//! Plain reconciliation, not a scheduler: no backoff, no priorities, no
//! retry of failed runs. Ticks run sequentially, so two polls never overlap
//! within one process.

use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing::{debug, info, warn};
use vigil_common::events::{EventBus, VigilEvent};
use vigil_common::types::ScanRunStatus;
use vigil_common::Result;

use crate::db;
use crate::models::aggregate_job_status;

use super::scrape::{ExternalRunStatus, ScrapeError, ScrapeService};

/// Spawn the scan run monitor
pub fn start_monitoring(
    db: SqlitePool,
    scraper: Arc<dyn ScrapeService>,
    event_bus: EventBus,
    poll_interval_seconds: u64,
) {
    tokio::spawn(monitor_task(db, scraper, event_bus, poll_interval_seconds));
}

async fn monitor_task(
    db: SqlitePool,
    scraper: Arc<dyn ScrapeService>,
    event_bus: EventBus,
    poll_interval_seconds: u64,
) {
    let mut interval = time::interval(Duration::from_secs(poll_interval_seconds));

    info!("Scan run monitor started ({}s interval)", poll_interval_seconds);

    loop {
        interval.tick().await;

        if let Err(e) = poll_scan_runs(&db, scraper.as_ref(), &event_bus).await {
            warn!(error = %e, "Scan run poll failed; will retry next tick");
        }
    }
}

/// One reconciliation pass
///
/// Queries the external service for every run still in STARTED, transitions
/// settled runs through FETCHING_RESULTS to COMPLETED/FAILED, then settles
/// any job whose runs have all reached a terminal state. Terminal writes
/// are idempotent, so re-running a pass (or a concurrently polling second
/// instance) converges on the same state.
pub async fn poll_scan_runs(
    db: &SqlitePool,
    scraper: &dyn ScrapeService,
    event_bus: &EventBus,
) -> Result<()> {
    let runs = db::scan_jobs::list_runs_in_status(db, ScanRunStatus::Started).await?;

    for run in &runs {
        let Some(external_run_id) = &run.external_run_id else {
            // Dispatch never recorded an external id (crash between insert
            // and update); the run can never settle on its own.
            warn!(run_id = %run.id, "Run has no external id; marking FAILED");
            transition_run(db, event_bus, run.id, run.scan_job_id, ScanRunStatus::Failed,
                Some("no external run id recorded"))
            .await?;
            continue;
        };

        match scraper.run_status(external_run_id).await {
            Ok(ExternalRunStatus::Running) => {
                debug!(run_id = %run.id, external_run_id = %external_run_id, "Run still in progress");
            }
            Ok(ExternalRunStatus::Succeeded) => {
                transition_run(db, event_bus, run.id, run.scan_job_id,
                    ScanRunStatus::FetchingResults, None)
                .await?;
                transition_run(db, event_bus, run.id, run.scan_job_id,
                    ScanRunStatus::Completed, None)
                .await?;
            }
            Ok(ExternalRunStatus::Failed { error }) => {
                transition_run(db, event_bus, run.id, run.scan_job_id,
                    ScanRunStatus::FetchingResults, None)
                .await?;
                transition_run(db, event_bus, run.id, run.scan_job_id,
                    ScanRunStatus::Failed, Some(&error))
                .await?;
            }
            Err(ScrapeError::UnknownRun(id)) => {
                warn!(run_id = %run.id, external_run_id = %id, "External run unknown; marking FAILED");
                transition_run(db, event_bus, run.id, run.scan_job_id,
                    ScanRunStatus::Failed, Some("external run unknown"))
                .await?;
            }
            Err(e) => {
                // Transient poll error: leave the run STARTED for the next
                // tick rather than failing it.
                warn!(run_id = %run.id, error = %e, "Run status poll failed");
            }
        }
    }

    settle_jobs(db, event_bus).await
}

async fn transition_run(
    db: &SqlitePool,
    event_bus: &EventBus,
    run_id: uuid::Uuid,
    scan_job_id: uuid::Uuid,
    status: ScanRunStatus,
    error_message: Option<&str>,
) -> Result<()> {
    db::scan_jobs::set_run_status(db, run_id, status, error_message).await?;
    event_bus
        .emit(VigilEvent::ScanRunStatusChanged {
            run_id,
            scan_job_id,
            new_status: status,
            timestamp: chrono::Utc::now(),
        })
        .ok();
    Ok(())
}

/// Roll terminal run outcomes up into job status for every unsettled job
async fn settle_jobs(db: &SqlitePool, event_bus: &EventBus) -> Result<()> {
    for job in db::scan_jobs::list_unsettled_jobs(db).await? {
        let runs = db::scan_jobs::list_runs_for_job(db, job.id).await?;
        let statuses: Vec<ScanRunStatus> = runs.iter().map(|r| r.status).collect();

        if let Some(final_status) = aggregate_job_status(&statuses) {
            db::scan_jobs::set_job_status(db, job.id, final_status).await?;
            info!(scan_job_id = %job.id, status = %final_status, "Scan job settled");
            event_bus
                .emit(VigilEvent::ScanJobCompleted {
                    scan_job_id: job.id,
                    status: final_status,
                    timestamp: chrono::Utc::now(),
                })
                .ok();
        }
    }
    Ok(())
}
