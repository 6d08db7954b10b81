//! Audit log persistence
//!
//! Destructive admin actions write a full field snapshot here before the
//! row is removed, so the action stays forensically reconstructable.

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;
use vigil_common::types::UserRole;
use vigil_common::Result;

use super::{parse_timestamp, parse_uuid};

/// One audit log entry
#[derive(Debug, Clone, serde::Serialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub actor_id: Uuid,
    pub actor_role: UserRole,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Uuid,
    /// JSON snapshot of the entity before the action
    pub detail: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        organization_id: Uuid,
        actor_id: Uuid,
        actor_role: UserRole,
        action: &str,
        entity_type: &str,
        entity_id: Uuid,
        detail: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            organization_id,
            actor_id,
            actor_role,
            action: action.to_string(),
            entity_type: entity_type.to_string(),
            entity_id,
            detail,
            created_at: Utc::now(),
        }
    }
}

pub async fn insert_audit_entry(pool: &SqlitePool, entry: &AuditEntry) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO audit_logs (id, organization_id, actor_id, actor_role, action, entity_type, entity_id, detail, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(entry.id.to_string())
    .bind(entry.organization_id.to_string())
    .bind(entry.actor_id.to_string())
    .bind(entry.actor_role.as_str())
    .bind(&entry.action)
    .bind(&entry.entity_type)
    .bind(entry.entity_id.to_string())
    .bind(entry.detail.to_string())
    .bind(entry.created_at.to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

/// Audit entries for an organization, newest first
pub async fn list_audit_entries(
    pool: &SqlitePool,
    organization_id: Uuid,
    entity_type: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<Vec<AuditEntry>> {
    let mut sql = String::from(
        "SELECT id, organization_id, actor_id, actor_role, action, entity_type, entity_id, detail, created_at FROM audit_logs WHERE organization_id = ?",
    );
    if entity_type.is_some() {
        sql.push_str(" AND entity_type = ?");
    }
    sql.push_str(" ORDER BY created_at DESC LIMIT ? OFFSET ?");

    let mut query = sqlx::query(&sql).bind(organization_id.to_string());
    if let Some(entity_type) = entity_type {
        query = query.bind(entity_type);
    }
    let rows = query.bind(limit).bind(offset).fetch_all(pool).await?;

    rows.iter()
        .map(|row| {
            let id: String = row.get("id");
            let organization_id: String = row.get("organization_id");
            let actor_id: String = row.get("actor_id");
            let actor_role: String = row.get("actor_role");
            let entity_id: String = row.get("entity_id");
            let detail: String = row.get("detail");
            let created_at: String = row.get("created_at");
            Ok(AuditEntry {
                id: parse_uuid(&id, "audit id")?,
                organization_id: parse_uuid(&organization_id, "organization_id")?,
                actor_id: parse_uuid(&actor_id, "actor_id")?,
                actor_role: actor_role.parse()?,
                action: row.get("action"),
                entity_type: row.get("entity_type"),
                entity_id: parse_uuid(&entity_id, "entity_id")?,
                detail: serde_json::from_str(&detail).unwrap_or(serde_json::Value::Null),
                created_at: parse_timestamp(&created_at, "created_at")?,
            })
        })
        .collect()
}

/// Count audit entries for an entity (used by tests and forensics)
pub async fn count_audit_entries_for_entity(
    pool: &SqlitePool,
    entity_type: &str,
    entity_id: Uuid,
) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM audit_logs WHERE entity_type = ? AND entity_id = ?",
    )
    .bind(entity_type)
    .bind(entity_id.to_string())
    .fetch_one(pool)
    .await?;
    Ok(count)
}
