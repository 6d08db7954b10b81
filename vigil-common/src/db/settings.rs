//! Key/value settings persistence
//!
//! The settings table is the authoritative (tier 1) source for runtime
//! credentials such as the scrape-service API key.

use crate::Result;
use sqlx::SqlitePool;

/// Read a setting value by key
pub async fn get_setting(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let value: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;
    Ok(value.map(|(v,)| v))
}

/// Write (or overwrite) a setting value
pub async fn set_setting(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query("INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)")
        .bind(key)
        .bind(value)
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init::init_memory_pool;

    #[tokio::test]
    async fn test_set_get_overwrite() {
        let pool = init_memory_pool().await.unwrap();

        assert_eq!(get_setting(&pool, "scrape_api_key").await.unwrap(), None);

        set_setting(&pool, "scrape_api_key", "abc").await.unwrap();
        assert_eq!(
            get_setting(&pool, "scrape_api_key").await.unwrap().as_deref(),
            Some("abc")
        );

        set_setting(&pool, "scrape_api_key", "xyz").await.unwrap();
        assert_eq!(
            get_setting(&pool, "scrape_api_key").await.unwrap().as_deref(),
            Some("xyz")
        );
    }
}
