//! Dashboard aggregation queries
//!
//! Pure read-side: every endpoint recomputes from the flags table on
//! request. No caching layer, no materialized state.

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;
use vigil_common::Result;

/// Scope shared by all dashboard queries
#[derive(Debug, Clone)]
pub struct DashboardFilter {
    pub organization_id: Uuid,
    pub publisher_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl DashboardFilter {
    fn conditions(&self) -> (String, Vec<String>) {
        let mut clauses = vec!["p.organization_id = ?".to_string()];
        let mut binds = vec![self.organization_id.to_string()];

        if let Some(publisher) = self.publisher_id {
            clauses.push("pc.publisher_id = ?".to_string());
            binds.push(publisher.to_string());
        }
        if let Some(product) = self.product_id {
            clauses.push("f.product_id = ?".to_string());
            binds.push(product.to_string());
        }
        if let Some(from) = self.from {
            clauses.push("f.created_at >= ?".to_string());
            binds.push(from.to_rfc3339());
        }
        if let Some(to) = self.to {
            clauses.push("f.created_at <= ?".to_string());
            binds.push(to.to_rfc3339());
        }

        (format!("WHERE {}", clauses.join(" AND ")), binds)
    }
}

const DASHBOARD_JOINS: &str = r#"
    FROM flags f
    JOIN content_items ci ON f.content_item_id = ci.id
    JOIN publisher_channels pc ON ci.channel_id = pc.id
    JOIN publishers p ON pc.publisher_id = p.id
"#;

/// Flag counts grouped by lifecycle status
pub async fn counts_by_status(
    pool: &SqlitePool,
    filter: &DashboardFilter,
) -> Result<Vec<(String, i64)>> {
    let (where_sql, binds) = filter.conditions();
    let sql = format!(
        "SELECT f.status, COUNT(*) AS n {} {} GROUP BY f.status",
        DASHBOARD_JOINS, where_sql
    );

    let mut query = sqlx::query(&sql);
    for bind in &binds {
        query = query.bind(bind);
    }
    let rows = query.fetch_all(pool).await?;
    Ok(rows
        .iter()
        .map(|row| (row.get::<String, _>("status"), row.get::<i64, _>("n")))
        .collect())
}

/// Per-group violation rate (publisher or product)
#[derive(Debug, Clone, serde::Serialize)]
pub struct ViolationRate {
    pub id: Uuid,
    pub name: String,
    pub total_flags: i64,
    pub violations: i64,
    pub violation_rate: f64,
}

/// Violation rate by publisher: confirmed VIOLATION verdicts over all flags
pub async fn violation_rate_by_publisher(
    pool: &SqlitePool,
    filter: &DashboardFilter,
) -> Result<Vec<ViolationRate>> {
    let (where_sql, binds) = filter.conditions();
    let sql = format!(
        r#"
        SELECT p.id AS group_id, p.name AS group_name,
               COUNT(*) AS total,
               SUM(CASE WHEN f.human_verdict = 'VIOLATION' THEN 1 ELSE 0 END) AS violations
        {} {}
        GROUP BY p.id, p.name
        ORDER BY violations DESC
        "#,
        DASHBOARD_JOINS, where_sql
    );
    violation_rate_query(pool, &sql, &binds).await
}

/// Violation rate by product
pub async fn violation_rate_by_product(
    pool: &SqlitePool,
    filter: &DashboardFilter,
) -> Result<Vec<ViolationRate>> {
    let (where_sql, binds) = filter.conditions();
    let sql = format!(
        r#"
        SELECT pr.id AS group_id, pr.name AS group_name,
               COUNT(*) AS total,
               SUM(CASE WHEN f.human_verdict = 'VIOLATION' THEN 1 ELSE 0 END) AS violations
        {}
        JOIN products pr ON f.product_id = pr.id
        {}
        GROUP BY pr.id, pr.name
        ORDER BY violations DESC
        "#,
        DASHBOARD_JOINS, where_sql
    );
    violation_rate_query(pool, &sql, &binds).await
}

async fn violation_rate_query(
    pool: &SqlitePool,
    sql: &str,
    binds: &[String],
) -> Result<Vec<ViolationRate>> {
    let mut query = sqlx::query(sql);
    for bind in binds {
        query = query.bind(bind);
    }
    let rows = query.fetch_all(pool).await?;

    rows.iter()
        .map(|row| {
            let id: String = row.get("group_id");
            let total: i64 = row.get("total");
            let violations: i64 = row.get("violations");
            Ok(ViolationRate {
                id: super::parse_uuid(&id, "group_id")?,
                name: row.get("group_name"),
                total_flags: total,
                violations,
                violation_rate: if total > 0 {
                    violations as f64 / total as f64
                } else {
                    0.0
                },
            })
        })
        .collect()
}

/// AI/human agreement over flags where both sides have a verdict
///
/// Compares the normalized `ai_ruling_verdict` enum against the human
/// verdict; flags whose ruling could not be normalized are excluded.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AgreementStats {
    pub compared: i64,
    pub agreements: i64,
    pub agreement_rate: f64,
}

pub async fn agreement_rate(pool: &SqlitePool, filter: &DashboardFilter) -> Result<AgreementStats> {
    let (where_sql, binds) = filter.conditions();
    let sql = format!(
        r#"
        SELECT COUNT(*) AS compared,
               SUM(CASE WHEN f.ai_ruling_verdict = f.human_verdict THEN 1 ELSE 0 END) AS agreements
        {} {}
          AND f.ai_ruling_verdict IS NOT NULL
          AND f.human_verdict IN ('VIOLATION', 'COMPLIANT')
        "#,
        DASHBOARD_JOINS, where_sql
    );

    let mut query = sqlx::query(&sql);
    for bind in &binds {
        query = query.bind(bind);
    }
    let row = query.fetch_one(pool).await?;
    let compared: i64 = row.get("compared");
    let agreements: Option<i64> = row.get("agreements");
    let agreements = agreements.unwrap_or(0);

    Ok(AgreementStats {
        compared,
        agreements,
        agreement_rate: if compared > 0 {
            agreements as f64 / compared as f64
        } else {
            0.0
        },
    })
}

/// Average remediation duration (seconds) for flags whose remediation
/// completed inside the filter window. None when nothing completed.
pub async fn average_remediation_seconds(
    pool: &SqlitePool,
    filter: &DashboardFilter,
) -> Result<Option<f64>> {
    let (where_sql, binds) = filter.conditions();
    let sql = format!(
        r#"
        SELECT AVG(
            (julianday(f.remediation_completed_at) - julianday(f.remediation_start_time)) * 86400.0
        ) AS avg_seconds
        {} {}
          AND f.remediation_start_time IS NOT NULL
          AND f.remediation_completed_at IS NOT NULL
        "#,
        DASHBOARD_JOINS, where_sql
    );

    let mut query = sqlx::query(&sql);
    for bind in &binds {
        query = query.bind(bind);
    }
    let row = query.fetch_one(pool).await?;
    Ok(row.get("avg_seconds"))
}

/// AI confidence histogram: ten buckets over the 0-100 scale
pub async fn confidence_histogram(
    pool: &SqlitePool,
    filter: &DashboardFilter,
) -> Result<[i64; 10]> {
    let (where_sql, binds) = filter.conditions();
    let sql = format!(
        r#"
        SELECT MIN(CAST(f.ai_confidence / 10 AS INTEGER), 9) AS bucket, COUNT(*) AS n
        {} {}
        GROUP BY bucket
        "#,
        DASHBOARD_JOINS, where_sql
    );

    let mut query = sqlx::query(&sql);
    for bind in &binds {
        query = query.bind(bind);
    }
    let rows = query.fetch_all(pool).await?;

    let mut buckets = [0i64; 10];
    for row in &rows {
        let bucket: i64 = row.get("bucket");
        let n: i64 = row.get("n");
        if (0..10).contains(&bucket) {
            buckets[bucket as usize] = n;
        }
    }
    Ok(buckets)
}
