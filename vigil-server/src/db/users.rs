//! User lookups for authentication and display

use sqlx::{Row, SqlitePool};
use uuid::Uuid;
use vigil_common::types::UserRole;
use vigil_common::Result;

use super::parse_uuid;

/// User row
#[derive(Debug, Clone, serde::Serialize)]
pub struct User {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub role: UserRole,
}

fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
    let id: String = row.get("id");
    let organization_id: String = row.get("organization_id");
    let role: String = row.get("role");
    Ok(User {
        id: parse_uuid(&id, "user id")?,
        organization_id: parse_uuid(&organization_id, "organization_id")?,
        email: row.get("email"),
        display_name: row.get("display_name"),
        role: role.parse()?,
    })
}

pub async fn get_user(pool: &SqlitePool, id: Uuid) -> Result<Option<User>> {
    let row = sqlx::query(
        "SELECT id, organization_id, email, display_name, role FROM users WHERE id = ?",
    )
    .bind(id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(row_to_user).transpose()
}

/// Resolve a bearer token to its user
pub async fn get_user_by_token(pool: &SqlitePool, token: &str) -> Result<Option<User>> {
    let row = sqlx::query(
        "SELECT id, organization_id, email, display_name, role FROM users WHERE api_token = ?",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(row_to_user).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::content::tests_support::seed_content;
    use vigil_common::db::init_memory_pool;

    #[tokio::test]
    async fn test_token_lookup() {
        let pool = init_memory_pool().await.unwrap();
        let seeded = seed_content(&pool).await;

        let user = get_user_by_token(&pool, "reviewer-token")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.id, seeded.reviewer_id);
        assert_eq!(user.role, UserRole::Reviewer);

        assert!(get_user_by_token(&pool, "bogus").await.unwrap().is_none());
    }
}
