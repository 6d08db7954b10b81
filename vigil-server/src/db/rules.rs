//! Rule reference lookups
//!
//! Rules are inert config data; the flag engine only needs existence checks
//! and name resolution for the polymorphic (rule_id, rule_type) reference.

use sqlx::{Row, SqlitePool};
use uuid::Uuid;
use vigil_common::types::RuleType;
use vigil_common::Result;

/// A rule as referenced from a flag, regardless of which table it lives in
#[derive(Debug, Clone, serde::Serialize)]
pub struct RuleRef {
    pub id: Uuid,
    pub rule_type: RuleType,
    pub name: String,
    pub description: String,
    pub severity: Option<String>,
}

/// Product row (advertiser config)
#[derive(Debug, Clone, serde::Serialize)]
pub struct Product {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub advertiser: Option<String>,
    pub name: String,
}

pub async fn get_product(pool: &SqlitePool, id: Uuid) -> Result<Option<Product>> {
    let row = sqlx::query("SELECT id, organization_id, advertiser, name FROM products WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.map(|row| {
        let id: String = row.get("id");
        let organization_id: String = row.get("organization_id");
        Ok(Product {
            id: super::parse_uuid(&id, "product id")?,
            organization_id: super::parse_uuid(&organization_id, "organization_id")?,
            advertiser: row.get("advertiser"),
            name: row.get("name"),
        })
    })
    .transpose()
}

/// Check that a rule of the given type exists
pub async fn rule_exists(pool: &SqlitePool, rule_id: Uuid, rule_type: RuleType) -> Result<bool> {
    let table = match rule_type {
        RuleType::Product => "product_rules",
        RuleType::Channel => "channel_rules",
    };
    let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {} WHERE id = ?", table))
        .bind(rule_id.to_string())
        .fetch_one(pool)
        .await?;
    Ok(count > 0)
}

/// Resolve a flag's rule reference for display
pub async fn get_rule(
    pool: &SqlitePool,
    rule_id: Uuid,
    rule_type: RuleType,
) -> Result<Option<RuleRef>> {
    let table = match rule_type {
        RuleType::Product => "product_rules",
        RuleType::Channel => "channel_rules",
    };
    let row = sqlx::query(&format!(
        "SELECT name, description, severity FROM {} WHERE id = ?",
        table
    ))
    .bind(rule_id.to_string())
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| RuleRef {
        id: rule_id,
        rule_type,
        name: row.get("name"),
        description: row.get("description"),
        severity: row.get("severity"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::content::tests_support::seed_content;
    use vigil_common::db::init_memory_pool;

    #[tokio::test]
    async fn test_rule_existence_respects_discriminator() {
        let pool = init_memory_pool().await.unwrap();
        let seeded = seed_content(&pool).await;

        assert!(rule_exists(&pool, seeded.product_rule_id, RuleType::Product)
            .await
            .unwrap());
        assert!(rule_exists(&pool, seeded.channel_rule_id, RuleType::Channel)
            .await
            .unwrap());
        // The same id looked up under the wrong discriminator must miss
        assert!(!rule_exists(&pool, seeded.product_rule_id, RuleType::Channel)
            .await
            .unwrap());
        assert!(!rule_exists(&pool, Uuid::new_v4(), RuleType::Product)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_get_rule_resolves_name() {
        let pool = init_memory_pool().await.unwrap();
        let seeded = seed_content(&pool).await;

        let rule = get_rule(&pool, seeded.channel_rule_id, RuleType::Channel)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rule.name, "Ad disclosure");
    }
}
