//! Scan job and scan run models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vigil_common::types::{ScanJobStatus, ScanRunStatus};

/// A master unit of scraping work, optionally scoped to publishers,
/// platforms, and focus products
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanJob {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: ScanJobStatus,
    /// Derived rollup: true iff at least one non-closed flag exists among
    /// this job's content items
    pub has_active_flags: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ScanJob {
    pub fn new(organization_id: Uuid, name: Option<String>, description: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            organization_id,
            name,
            description,
            status: ScanJobStatus::Running,
            has_active_flags: false,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }
}

/// One external scrape invocation for one channel within a scan job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanJobRun {
    pub id: Uuid,
    pub scan_job_id: Uuid,
    pub channel_id: Uuid,
    /// Identifier assigned by the external scrape service; unique across
    /// all runs
    pub external_run_id: Option<String>,
    pub status: ScanRunStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScanJobRun {
    pub fn new(scan_job_id: Uuid, channel_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            scan_job_id,
            channel_id,
            external_run_id: None,
            status: ScanRunStatus::Started,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Roll per-run statuses up into a job status
///
/// Returns `None` while any run is still in flight. Once every run is
/// terminal: all completed → `COMPLETED`; all failed → `FAILED`; mixed →
/// `COMPLETED_WITH_ERRORS`.
pub fn aggregate_job_status(run_statuses: &[ScanRunStatus]) -> Option<ScanJobStatus> {
    if run_statuses.is_empty() || run_statuses.iter().any(|s| !s.is_terminal()) {
        return None;
    }

    let failed = run_statuses
        .iter()
        .filter(|s| **s == ScanRunStatus::Failed)
        .count();

    Some(if failed == 0 {
        ScanJobStatus::Completed
    } else if failed == run_statuses.len() {
        ScanJobStatus::Failed
    } else {
        ScanJobStatus::CompletedWithErrors
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_waits_for_in_flight_runs() {
        assert_eq!(
            aggregate_job_status(&[ScanRunStatus::Completed, ScanRunStatus::Started]),
            None
        );
        assert_eq!(
            aggregate_job_status(&[ScanRunStatus::FetchingResults]),
            None
        );
        assert_eq!(aggregate_job_status(&[]), None);
    }

    #[test]
    fn test_aggregate_all_completed() {
        assert_eq!(
            aggregate_job_status(&[ScanRunStatus::Completed, ScanRunStatus::Completed]),
            Some(ScanJobStatus::Completed)
        );
    }

    #[test]
    fn test_aggregate_mixed_outcomes() {
        assert_eq!(
            aggregate_job_status(&[ScanRunStatus::Completed, ScanRunStatus::Failed]),
            Some(ScanJobStatus::CompletedWithErrors)
        );
    }

    #[test]
    fn test_aggregate_all_failed() {
        assert_eq!(
            aggregate_job_status(&[ScanRunStatus::Failed, ScanRunStatus::Failed]),
            Some(ScanJobStatus::Failed)
        );
    }
}
