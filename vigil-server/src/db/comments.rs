//! Flag comment persistence (append-only thread per flag)

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;
use vigil_common::types::UserRole;
use vigil_common::Result;

use super::{parse_timestamp, parse_uuid};

/// A threaded message attached to a flag
#[derive(Debug, Clone, serde::Serialize)]
pub struct FlagComment {
    pub id: Uuid,
    pub flag_id: Uuid,
    pub author_id: Uuid,
    pub author_role: UserRole,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl FlagComment {
    pub fn new(flag_id: Uuid, author_id: Uuid, author_role: UserRole, body: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            flag_id,
            author_id,
            author_role,
            body,
            created_at: Utc::now(),
        }
    }
}

fn row_to_comment(row: &sqlx::sqlite::SqliteRow) -> Result<FlagComment> {
    let id: String = row.get("id");
    let flag_id: String = row.get("flag_id");
    let author_id: String = row.get("author_id");
    let author_role: String = row.get("author_role");
    let created_at: String = row.get("created_at");
    Ok(FlagComment {
        id: parse_uuid(&id, "comment id")?,
        flag_id: parse_uuid(&flag_id, "flag_id")?,
        author_id: parse_uuid(&author_id, "author_id")?,
        author_role: author_role.parse()?,
        body: row.get("body"),
        created_at: parse_timestamp(&created_at, "created_at")?,
    })
}

pub async fn insert_comment(pool: &SqlitePool, comment: &FlagComment) -> Result<()> {
    sqlx::query(
        "INSERT INTO flag_comments (id, flag_id, author_id, author_role, body, created_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(comment.id.to_string())
    .bind(comment.flag_id.to_string())
    .bind(comment.author_id.to_string())
    .bind(comment.author_role.as_str())
    .bind(&comment.body)
    .bind(comment.created_at.to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_comment(pool: &SqlitePool, comment_id: Uuid) -> Result<Option<FlagComment>> {
    let row = sqlx::query(
        "SELECT id, flag_id, author_id, author_role, body, created_at FROM flag_comments WHERE id = ?",
    )
    .bind(comment_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(row_to_comment).transpose()
}

/// Comments for a flag, oldest first
pub async fn list_comments(pool: &SqlitePool, flag_id: Uuid) -> Result<Vec<FlagComment>> {
    let rows = sqlx::query(
        "SELECT id, flag_id, author_id, author_role, body, created_at FROM flag_comments WHERE flag_id = ? ORDER BY created_at ASC",
    )
    .bind(flag_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_comment).collect()
}

pub async fn delete_comment_row(pool: &SqlitePool, comment_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM flag_comments WHERE id = ?")
        .bind(comment_id.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
