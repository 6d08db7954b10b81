//! Flag persistence

use sqlx::{Row, SqlitePool};
use uuid::Uuid;
use vigil_common::types::FlagStatus;
use vigil_common::Result;

use crate::models::Flag;

use super::{parse_opt_timestamp, parse_opt_uuid, parse_timestamp, parse_uuid};

/// Save a flag to the database (insert or full update by id)
pub async fn save_flag(pool: &SqlitePool, flag: &Flag) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO flags (
            id, content_item_id, rule_id, rule_type, product_id, reviewer_id, image_id,
            flag_source, ai_confidence, ai_evaluation, ai_ruling, ai_ruling_verdict,
            feedback_notes, human_verdict, human_verdict_reasoning, internal_notes,
            status, resolution_method,
            in_review_at, decision_made_at, remediation_start_time, remediation_completed_at,
            reviewed_at, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            reviewer_id = excluded.reviewer_id,
            image_id = excluded.image_id,
            feedback_notes = excluded.feedback_notes,
            human_verdict = excluded.human_verdict,
            human_verdict_reasoning = excluded.human_verdict_reasoning,
            internal_notes = excluded.internal_notes,
            status = excluded.status,
            resolution_method = excluded.resolution_method,
            in_review_at = excluded.in_review_at,
            decision_made_at = excluded.decision_made_at,
            remediation_start_time = excluded.remediation_start_time,
            remediation_completed_at = excluded.remediation_completed_at,
            reviewed_at = excluded.reviewed_at,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(flag.id.to_string())
    .bind(flag.content_item_id.to_string())
    .bind(flag.rule_id.to_string())
    .bind(flag.rule_type.as_str())
    .bind(flag.product_id.map(|id| id.to_string()))
    .bind(flag.reviewer_id.map(|id| id.to_string()))
    .bind(flag.image_id.map(|id| id.to_string()))
    .bind(flag.flag_source.as_str())
    .bind(flag.ai_confidence)
    .bind(&flag.ai_evaluation)
    .bind(&flag.ai_ruling)
    .bind(flag.ai_ruling_verdict.map(|v| v.as_str()))
    .bind(&flag.feedback_notes)
    .bind(flag.human_verdict.map(|v| v.as_str()))
    .bind(&flag.human_verdict_reasoning)
    .bind(&flag.internal_notes)
    .bind(flag.status.as_str())
    .bind(flag.resolution_method.map(|m| m.as_str()))
    .bind(flag.in_review_at.map(|t| t.to_rfc3339()))
    .bind(flag.decision_made_at.map(|t| t.to_rfc3339()))
    .bind(flag.remediation_start_time.map(|t| t.to_rfc3339()))
    .bind(flag.remediation_completed_at.map(|t| t.to_rfc3339()))
    .bind(flag.reviewed_at.map(|t| t.to_rfc3339()))
    .bind(flag.created_at.to_rfc3339())
    .bind(flag.updated_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

const FLAG_COLUMNS: &str = r#"
    f.id, f.content_item_id, f.rule_id, f.rule_type, f.product_id, f.reviewer_id, f.image_id,
    f.flag_source, f.ai_confidence, f.ai_evaluation, f.ai_ruling, f.ai_ruling_verdict,
    f.feedback_notes, f.human_verdict, f.human_verdict_reasoning, f.internal_notes,
    f.status, f.resolution_method,
    f.in_review_at, f.decision_made_at, f.remediation_start_time, f.remediation_completed_at,
    f.reviewed_at, f.created_at, f.updated_at
"#;

fn row_to_flag(row: &sqlx::sqlite::SqliteRow) -> Result<Flag> {
    let id: String = row.get("id");
    let content_item_id: String = row.get("content_item_id");
    let rule_id: String = row.get("rule_id");
    let rule_type: String = row.get("rule_type");
    let flag_source: String = row.get("flag_source");
    let status: String = row.get("status");
    let ai_ruling_verdict: Option<String> = row.get("ai_ruling_verdict");
    let human_verdict: Option<String> = row.get("human_verdict");
    let resolution_method: Option<String> = row.get("resolution_method");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(Flag {
        id: parse_uuid(&id, "flag id")?,
        content_item_id: parse_uuid(&content_item_id, "content_item_id")?,
        rule_id: parse_uuid(&rule_id, "rule_id")?,
        rule_type: rule_type.parse()?,
        product_id: parse_opt_uuid(row.get("product_id"), "product_id")?,
        reviewer_id: parse_opt_uuid(row.get("reviewer_id"), "reviewer_id")?,
        image_id: parse_opt_uuid(row.get("image_id"), "image_id")?,
        flag_source: flag_source.parse()?,
        ai_confidence: row.get("ai_confidence"),
        ai_evaluation: row.get("ai_evaluation"),
        ai_ruling: row.get("ai_ruling"),
        ai_ruling_verdict: ai_ruling_verdict.map(|v| v.parse()).transpose()?,
        feedback_notes: row.get("feedback_notes"),
        human_verdict: human_verdict.map(|v| v.parse()).transpose()?,
        human_verdict_reasoning: row.get("human_verdict_reasoning"),
        internal_notes: row.get("internal_notes"),
        status: status.parse()?,
        resolution_method: resolution_method.map(|m| m.parse()).transpose()?,
        in_review_at: parse_opt_timestamp(row.get("in_review_at"), "in_review_at")?,
        decision_made_at: parse_opt_timestamp(row.get("decision_made_at"), "decision_made_at")?,
        remediation_start_time: parse_opt_timestamp(
            row.get("remediation_start_time"),
            "remediation_start_time",
        )?,
        remediation_completed_at: parse_opt_timestamp(
            row.get("remediation_completed_at"),
            "remediation_completed_at",
        )?,
        reviewed_at: parse_opt_timestamp(row.get("reviewed_at"), "reviewed_at")?,
        created_at: parse_timestamp(&created_at, "created_at")?,
        updated_at: parse_timestamp(&updated_at, "updated_at")?,
    })
}

/// Load a flag by id
pub async fn load_flag(pool: &SqlitePool, flag_id: Uuid) -> Result<Option<Flag>> {
    let sql = format!("SELECT {} FROM flags f WHERE f.id = ?", FLAG_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(flag_id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(row_to_flag).transpose()
}

/// Delete a flag row. Returns true if a row was removed.
pub async fn delete_flag_row(pool: &SqlitePool, flag_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM flags WHERE id = ?")
        .bind(flag_id.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Filters accepted by the flag listing endpoint
#[derive(Debug, Clone, Default)]
pub struct FlagFilter {
    pub organization_id: Option<Uuid>,
    pub status: Option<FlagStatus>,
    pub scan_job_id: Option<Uuid>,
    pub publisher_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub rule_id: Option<Uuid>,
    pub ai_ruling: Option<String>,
    pub human_verdict: Option<String>,
    pub assignee_id: Option<Uuid>,
    pub platform: Option<String>,
    pub created_after: Option<chrono::DateTime<chrono::Utc>>,
    pub created_before: Option<chrono::DateTime<chrono::Utc>>,
}

impl FlagFilter {
    /// WHERE clause fragments plus their bind values, in order
    fn conditions(&self) -> (Vec<&'static str>, Vec<String>) {
        let mut clauses = Vec::new();
        let mut binds = Vec::new();

        if let Some(org) = self.organization_id {
            clauses.push("p.organization_id = ?");
            binds.push(org.to_string());
        }
        if let Some(status) = self.status {
            clauses.push("f.status = ?");
            binds.push(status.as_str().to_string());
        }
        if let Some(job) = self.scan_job_id {
            clauses.push("ci.scan_job_id = ?");
            binds.push(job.to_string());
        }
        if let Some(publisher) = self.publisher_id {
            clauses.push("pc.publisher_id = ?");
            binds.push(publisher.to_string());
        }
        if let Some(product) = self.product_id {
            clauses.push("f.product_id = ?");
            binds.push(product.to_string());
        }
        if let Some(rule) = self.rule_id {
            clauses.push("f.rule_id = ?");
            binds.push(rule.to_string());
        }
        if let Some(ruling) = &self.ai_ruling {
            clauses.push("f.ai_ruling = ?");
            binds.push(ruling.clone());
        }
        if let Some(verdict) = &self.human_verdict {
            clauses.push("f.human_verdict = ?");
            binds.push(verdict.clone());
        }
        if let Some(assignee) = self.assignee_id {
            clauses.push("f.reviewer_id = ?");
            binds.push(assignee.to_string());
        }
        if let Some(platform) = &self.platform {
            clauses.push("pc.platform = ?");
            binds.push(platform.clone());
        }
        if let Some(after) = self.created_after {
            clauses.push("f.created_at >= ?");
            binds.push(after.to_rfc3339());
        }
        if let Some(before) = self.created_before {
            clauses.push("f.created_at <= ?");
            binds.push(before.to_rfc3339());
        }

        (clauses, binds)
    }

    fn where_sql(clauses: &[&str]) -> String {
        if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        }
    }
}

const FLAG_FILTER_JOINS: &str = r#"
    FROM flags f
    JOIN content_items ci ON f.content_item_id = ci.id
    JOIN publisher_channels pc ON ci.channel_id = pc.id
    JOIN publishers p ON pc.publisher_id = p.id
"#;

/// List flags matching the filter, newest first, optionally windowed
pub async fn list_flags(
    pool: &SqlitePool,
    filter: &FlagFilter,
    limit: Option<i64>,
    offset: Option<i64>,
) -> Result<Vec<Flag>> {
    let (clauses, binds) = filter.conditions();
    let mut sql = format!(
        "SELECT {} {}{} ORDER BY f.created_at DESC",
        FLAG_COLUMNS,
        FLAG_FILTER_JOINS,
        FlagFilter::where_sql(&clauses)
    );
    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset.unwrap_or(0)));
    }

    let mut query = sqlx::query(&sql);
    for bind in &binds {
        query = query.bind(bind);
    }

    let rows = query.fetch_all(pool).await?;
    rows.iter().map(row_to_flag).collect()
}

/// Count flags matching the filter
pub async fn count_flags(pool: &SqlitePool, filter: &FlagFilter) -> Result<i64> {
    let (clauses, binds) = filter.conditions();
    let sql = format!(
        "SELECT COUNT(*) {}{}",
        FLAG_FILTER_JOINS,
        FlagFilter::where_sql(&clauses)
    );

    let mut query = sqlx::query_scalar(&sql);
    for bind in &binds {
        query = query.bind(bind);
    }

    Ok(query.fetch_one(pool).await?)
}

/// Scan job owning a content item, if any
pub async fn scan_job_for_content_item(
    pool: &SqlitePool,
    content_item_id: Uuid,
) -> Result<Option<Uuid>> {
    let job: Option<Option<String>> =
        sqlx::query_scalar("SELECT scan_job_id FROM content_items WHERE id = ?")
            .bind(content_item_id.to_string())
            .fetch_optional(pool)
            .await?;

    parse_opt_uuid(job.flatten(), "scan_job_id")
}

/// Count non-closed flags among a scan job's content items
///
/// Legacy REMEDIATION_COMPLETE rows count as closed.
pub async fn count_active_flags_for_job(pool: &SqlitePool, scan_job_id: Uuid) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM flags f
        JOIN content_items ci ON f.content_item_id = ci.id
        WHERE ci.scan_job_id = ?
          AND f.status NOT IN ('CLOSED', 'REMEDIATION_COMPLETE')
        "#,
    )
    .bind(scan_job_id.to_string())
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// Link a captured frame to a flag's image reference
pub async fn set_flag_image(pool: &SqlitePool, flag_id: Uuid, image_id: Uuid) -> Result<()> {
    sqlx::query("UPDATE flags SET image_id = ?, updated_at = ? WHERE id = ?")
        .bind(image_id.to_string())
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(flag_id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::content::tests_support::seed_content;
    use vigil_common::db::init_memory_pool;
    use vigil_common::types::{FlagSource, RuleType};

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let pool = init_memory_pool().await.unwrap();
        let seeded = seed_content(&pool).await;

        let flag = Flag::new(
            seeded.content_item_id,
            seeded.channel_rule_id,
            RuleType::Channel,
            72.5,
            FlagStatus::Pending,
            FlagSource::Ai,
            Some("evaluation text".to_string()),
            Some("Violation: undisclosed ad".to_string()),
        );
        save_flag(&pool, &flag).await.unwrap();

        let loaded = load_flag(&pool, flag.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, flag.id);
        assert_eq!(loaded.status, FlagStatus::Pending);
        assert_eq!(loaded.ai_confidence, 72.5);
        assert_eq!(
            loaded.ai_ruling_verdict,
            Some(vigil_common::types::HumanVerdict::Violation)
        );
        assert_eq!(loaded.created_at, flag.created_at);
    }

    #[tokio::test]
    async fn test_upsert_updates_mutable_fields_only() {
        let pool = init_memory_pool().await.unwrap();
        let seeded = seed_content(&pool).await;

        let mut flag = Flag::new(
            seeded.content_item_id,
            seeded.channel_rule_id,
            RuleType::Channel,
            60.0,
            FlagStatus::Pending,
            FlagSource::Ai,
            None,
            None,
        );
        save_flag(&pool, &flag).await.unwrap();

        flag.internal_notes = Some("checked against brand kit".to_string());
        flag.status = FlagStatus::InReview;
        save_flag(&pool, &flag).await.unwrap();

        let loaded = load_flag(&pool, flag.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, FlagStatus::InReview);
        assert_eq!(
            loaded.internal_notes.as_deref(),
            Some("checked against brand kit")
        );
    }

    #[tokio::test]
    async fn test_active_flag_count_ignores_closed() {
        let pool = init_memory_pool().await.unwrap();
        let seeded = seed_content(&pool).await;

        let open = Flag::new(
            seeded.content_item_id,
            seeded.channel_rule_id,
            RuleType::Channel,
            80.0,
            FlagStatus::Pending,
            FlagSource::Ai,
            None,
            None,
        );
        let closed = Flag::new(
            seeded.content_item_id,
            seeded.channel_rule_id,
            RuleType::Channel,
            80.0,
            FlagStatus::Closed,
            FlagSource::Ai,
            None,
            None,
        );
        save_flag(&pool, &open).await.unwrap();
        save_flag(&pool, &closed).await.unwrap();

        let count = count_active_flags_for_job(&pool, seeded.scan_job_id)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_filter_by_status_and_publisher() {
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
        save_flag(&pool, &flag).await.unwrap();

        let filter = FlagFilter {
            status: Some(FlagStatus::Pending),
            publisher_id: Some(seeded.publisher_id),
            platform: Some("youtube".to_string()),
            ..Default::default()
        };
        let flags = list_flags(&pool, &filter, None, None).await.unwrap();
        assert_eq!(flags.len(), 1);
        assert_eq!(count_flags(&pool, &filter).await.unwrap(), 1);

        let none = FlagFilter {
            status: Some(FlagStatus::Remediating),
            ..Default::default()
        };
        assert!(list_flags(&pool, &none, None, None).await.unwrap().is_empty());
    }
}
