//! Database connection pool initialization

use crate::Result;
use sqlx::SqlitePool;
use std::path::Path;

use super::schema::TABLE_SCHEMAS;

/// Initialize database connection pool
///
/// Connects to the shared vigil.db in the root folder, enables foreign key
/// enforcement, and runs the idempotent schema statements.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Use proper SQLite URI with mode=rwc (read, write, create)
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_schema(&pool).await?;

    Ok(pool)
}

/// Create an in-memory pool with the full schema (tests)
///
/// Capped at one connection: every pooled connection to `sqlite::memory:`
/// would otherwise open its own empty database.
pub async fn init_memory_pool() -> Result<SqlitePool> {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    init_schema(&pool).await?;
    Ok(pool)
}

/// Run foreign-key pragma plus all table schemas against the pool
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON").execute(pool).await?;

    for ddl in TABLE_SCHEMAS {
        sqlx::query(ddl).execute(pool).await?;
    }

    tracing::info!("Database schema initialized ({} statements)", TABLE_SCHEMAS.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_schema_init_is_idempotent() {
        let pool = init_memory_pool().await.unwrap();
        // Second run must be a no-op, not an error
        init_schema(&pool).await.unwrap();

        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'flags'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_content_item_delete_cascades_to_flags() {
        let pool = init_memory_pool().await.unwrap();

        sqlx::query("INSERT INTO organizations (id, name) VALUES ('org1', 'Acme')")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO publishers (id, organization_id, name) VALUES ('pub1', 'org1', 'P')")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO publisher_channels (id, publisher_id, platform, handle) VALUES ('ch1', 'pub1', 'youtube', '@p')",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query("INSERT INTO content_items (id, channel_id) VALUES ('ci1', 'ch1')")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO flags (id, content_item_id, rule_id, rule_type, ai_confidence) VALUES ('f1', 'ci1', 'r1', 'channel', 80.0)",
        )
        .execute(&pool)
        .await
        .unwrap();

        sqlx::query("DELETE FROM content_items WHERE id = 'ci1'")
            .execute(&pool)
            .await
            .unwrap();

        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM flags")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(remaining, 0, "flags must cascade with their content item");
    }
}
