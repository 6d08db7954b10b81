//! Scan job and scan run persistence

use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;
use vigil_common::types::{ScanJobStatus, ScanRunStatus};
use vigil_common::Result;

use crate::models::{ScanJob, ScanJobRun};

use super::{parse_opt_timestamp, parse_timestamp, parse_uuid};

pub async fn insert_scan_job(pool: &SqlitePool, job: &ScanJob) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO scan_jobs (id, organization_id, name, description, status, has_active_flags, created_at, updated_at, completed_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(job.id.to_string())
    .bind(job.organization_id.to_string())
    .bind(&job.name)
    .bind(&job.description)
    .bind(job.status.as_str())
    .bind(job.has_active_flags)
    .bind(job.created_at.to_rfc3339())
    .bind(job.updated_at.to_rfc3339())
    .bind(job.completed_at.map(|t| t.to_rfc3339()))
    .execute(pool)
    .await?;
    Ok(())
}

fn row_to_job(row: &sqlx::sqlite::SqliteRow) -> Result<ScanJob> {
    let id: String = row.get("id");
    let organization_id: String = row.get("organization_id");
    let status: String = row.get("status");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");
    Ok(ScanJob {
        id: parse_uuid(&id, "scan job id")?,
        organization_id: parse_uuid(&organization_id, "organization_id")?,
        name: row.get("name"),
        description: row.get("description"),
        status: status.parse()?,
        has_active_flags: row.get("has_active_flags"),
        created_at: parse_timestamp(&created_at, "created_at")?,
        updated_at: parse_timestamp(&updated_at, "updated_at")?,
        completed_at: parse_opt_timestamp(row.get("completed_at"), "completed_at")?,
    })
}

pub async fn get_scan_job(pool: &SqlitePool, job_id: Uuid) -> Result<Option<ScanJob>> {
    let row = sqlx::query(
        "SELECT id, organization_id, name, description, status, has_active_flags, created_at, updated_at, completed_at FROM scan_jobs WHERE id = ?",
    )
    .bind(job_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(row_to_job).transpose()
}

/// Scan jobs for an organization, newest first
pub async fn list_scan_jobs(
    pool: &SqlitePool,
    organization_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<ScanJob>> {
    let rows = sqlx::query(
        r#"
        SELECT id, organization_id, name, description, status, has_active_flags, created_at, updated_at, completed_at
        FROM scan_jobs
        WHERE organization_id = ?
        ORDER BY created_at DESC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(organization_id.to_string())
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_job).collect()
}

/// Jobs not yet in a terminal status (monitor reconciliation set)
pub async fn list_unsettled_jobs(pool: &SqlitePool) -> Result<Vec<ScanJob>> {
    let rows = sqlx::query(
        r#"
        SELECT id, organization_id, name, description, status, has_active_flags, created_at, updated_at, completed_at
        FROM scan_jobs
        WHERE status IN ('PENDING', 'RUNNING')
        ORDER BY created_at ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_job).collect()
}

/// Update job status; stamps completed_at on entry to a terminal status
pub async fn set_job_status(pool: &SqlitePool, job_id: Uuid, status: ScanJobStatus) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    let completed_at = status.is_terminal().then(|| now.clone());
    sqlx::query(
        "UPDATE scan_jobs SET status = ?, updated_at = ?, completed_at = COALESCE(completed_at, ?) WHERE id = ?",
    )
    .bind(status.as_str())
    .bind(&now)
    .bind(completed_at)
    .bind(job_id.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

/// Write the derived `has_active_flags` rollup
pub async fn set_has_active_flags(pool: &SqlitePool, job_id: Uuid, active: bool) -> Result<()> {
    sqlx::query("UPDATE scan_jobs SET has_active_flags = ?, updated_at = ? WHERE id = ?")
        .bind(active)
        .bind(Utc::now().to_rfc3339())
        .bind(job_id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

/// Record the job's focus products (multi-target scans)
pub async fn set_focus_products(
    pool: &SqlitePool,
    job_id: Uuid,
    product_ids: &[Uuid],
) -> Result<()> {
    for product_id in product_ids {
        sqlx::query(
            "INSERT OR IGNORE INTO scan_job_focus_products (scan_job_id, product_id) VALUES (?, ?)",
        )
        .bind(job_id.to_string())
        .bind(product_id.to_string())
        .execute(pool)
        .await?;
    }
    Ok(())
}

pub async fn insert_scan_run(pool: &SqlitePool, run: &ScanJobRun) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO scan_job_runs (id, scan_job_id, channel_id, external_run_id, status, error_message, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(run.id.to_string())
    .bind(run.scan_job_id.to_string())
    .bind(run.channel_id.to_string())
    .bind(&run.external_run_id)
    .bind(run.status.as_str())
    .bind(&run.error_message)
    .bind(run.created_at.to_rfc3339())
    .bind(run.updated_at.to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

fn row_to_run(row: &sqlx::sqlite::SqliteRow) -> Result<ScanJobRun> {
    let id: String = row.get("id");
    let scan_job_id: String = row.get("scan_job_id");
    let channel_id: String = row.get("channel_id");
    let status: String = row.get("status");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");
    Ok(ScanJobRun {
        id: parse_uuid(&id, "run id")?,
        scan_job_id: parse_uuid(&scan_job_id, "scan_job_id")?,
        channel_id: parse_uuid(&channel_id, "channel_id")?,
        external_run_id: row.get("external_run_id"),
        status: status.parse()?,
        error_message: row.get("error_message"),
        created_at: parse_timestamp(&created_at, "created_at")?,
        updated_at: parse_timestamp(&updated_at, "updated_at")?,
    })
}

const RUN_COLUMNS: &str =
    "id, scan_job_id, channel_id, external_run_id, status, error_message, created_at, updated_at";

/// All runs belonging to one job
pub async fn list_runs_for_job(pool: &SqlitePool, job_id: Uuid) -> Result<Vec<ScanJobRun>> {
    let sql = format!(
        "SELECT {} FROM scan_job_runs WHERE scan_job_id = ? ORDER BY created_at ASC",
        RUN_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(job_id.to_string())
        .fetch_all(pool)
        .await?;
    rows.iter().map(row_to_run).collect()
}

/// Runs awaiting reconciliation by the monitor
pub async fn list_runs_in_status(
    pool: &SqlitePool,
    status: ScanRunStatus,
) -> Result<Vec<ScanJobRun>> {
    let sql = format!(
        "SELECT {} FROM scan_job_runs WHERE status = ? ORDER BY created_at ASC",
        RUN_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(status.as_str())
        .fetch_all(pool)
        .await?;
    rows.iter().map(row_to_run).collect()
}

/// Transition one run's status; terminal failure records the error message
pub async fn set_run_status(
    pool: &SqlitePool,
    run_id: Uuid,
    status: ScanRunStatus,
    error_message: Option<&str>,
) -> Result<()> {
    sqlx::query(
        "UPDATE scan_job_runs SET status = ?, error_message = COALESCE(?, error_message), updated_at = ? WHERE id = ?",
    )
    .bind(status.as_str())
    .bind(error_message)
    .bind(Utc::now().to_rfc3339())
    .bind(run_id.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

/// Record the external run identifier once the dispatch succeeds
pub async fn set_external_run_id(
    pool: &SqlitePool,
    run_id: Uuid,
    external_run_id: &str,
) -> Result<()> {
    sqlx::query("UPDATE scan_job_runs SET external_run_id = ?, updated_at = ? WHERE id = ?")
        .bind(external_run_id)
        .bind(Utc::now().to_rfc3339())
        .bind(run_id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::content::tests_support::seed_content;
    use vigil_common::db::init_memory_pool;

    #[tokio::test]
    async fn test_duplicate_channel_run_rejected() {
        let pool = init_memory_pool().await.unwrap();
        let seeded = seed_content(&pool).await;

        let first = ScanJobRun::new(seeded.scan_job_id, seeded.channel_id);
        insert_scan_run(&pool, &first).await.unwrap();

        // Same (job, channel) pair must violate the uniqueness constraint
        let duplicate = ScanJobRun::new(seeded.scan_job_id, seeded.channel_id);
        assert!(insert_scan_run(&pool, &duplicate).await.is_err());
    }

    #[tokio::test]
    async fn test_duplicate_external_run_id_rejected() {
        let pool = init_memory_pool().await.unwrap();
        let seeded = seed_content(&pool).await;

        let mut first = ScanJobRun::new(seeded.scan_job_id, seeded.channel_id);
        first.external_run_id = Some("ext-1".to_string());
        insert_scan_run(&pool, &first).await.unwrap();

        let mut second = ScanJobRun::new(seeded.scan_job_id, seeded.second_channel_id);
        second.external_run_id = Some("ext-1".to_string());
        assert!(insert_scan_run(&pool, &second).await.is_err());
    }

    #[tokio::test]
    async fn test_run_status_transition_and_listing() {
        let pool = init_memory_pool().await.unwrap();
        let seeded = seed_content(&pool).await;

        let run = ScanJobRun::new(seeded.scan_job_id, seeded.channel_id);
        insert_scan_run(&pool, &run).await.unwrap();

        let started = list_runs_in_status(&pool, ScanRunStatus::Started).await.unwrap();
        assert_eq!(started.len(), 1);

        set_run_status(&pool, run.id, ScanRunStatus::Failed, Some("channel gone"))
            .await
            .unwrap();

        assert!(list_runs_in_status(&pool, ScanRunStatus::Started)
            .await
            .unwrap()
            .is_empty());
        let runs = list_runs_for_job(&pool, seeded.scan_job_id).await.unwrap();
        assert_eq!(runs[0].status, ScanRunStatus::Failed);
        assert_eq!(runs[0].error_message.as_deref(), Some("channel gone"));
    }

    #[tokio::test]
    async fn test_job_terminal_status_stamps_completed_at_once() {
        let pool = init_memory_pool().await.unwrap();
        let seeded = seed_content(&pool).await;

        set_job_status(&pool, seeded.scan_job_id, ScanJobStatus::Completed)
            .await
            .unwrap();
        let first = get_scan_job(&pool, seeded.scan_job_id)
            .await
            .unwrap()
            .unwrap()
            .completed_at
            .unwrap();

        // Idempotent re-write must not move completed_at
        set_job_status(&pool, seeded.scan_job_id, ScanJobStatus::Completed)
            .await
            .unwrap();
        let second = get_scan_job(&pool, seeded.scan_job_id)
            .await
            .unwrap()
            .unwrap()
            .completed_at
            .unwrap();
        assert_eq!(first, second);
    }
}
