//! Scraped-content and publisher reference data
//!
//! These tables are populated by the external scraper integration and
//! consumed read-mostly by the flag engine and scan orchestrator.

use sqlx::{Row, SqlitePool};
use uuid::Uuid;
use vigil_common::Result;

use super::{parse_opt_uuid, parse_uuid};

/// Scraped content item row
#[derive(Debug, Clone, serde::Serialize)]
pub struct ContentItem {
    pub id: Uuid,
    pub channel_id: Uuid,
    pub scan_job_id: Option<Uuid>,
    pub external_id: Option<String>,
    pub url: Option<String>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub posted_at: Option<String>,
}

/// Captured or scraped image/frame attached to a content item
#[derive(Debug, Clone, serde::Serialize)]
pub struct ContentImage {
    pub id: Uuid,
    pub content_item_id: Uuid,
    pub url: String,
    pub video_id: Option<String>,
    pub frame_seconds: Option<f64>,
    pub captured_at: Option<String>,
}

/// Publisher row
#[derive(Debug, Clone, serde::Serialize)]
pub struct Publisher {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub contact_email: Option<String>,
}

/// Publisher channel row (one platform presence of a publisher)
#[derive(Debug, Clone, serde::Serialize)]
pub struct Channel {
    pub id: Uuid,
    pub publisher_id: Uuid,
    pub platform: String,
    pub handle: String,
    pub url: Option<String>,
}

pub async fn get_content_item(pool: &SqlitePool, id: Uuid) -> Result<Option<ContentItem>> {
    let row = sqlx::query(
        "SELECT id, channel_id, scan_job_id, external_id, url, title, body, posted_at FROM content_items WHERE id = ?",
    )
    .bind(id.to_string())
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => {
            let id: String = row.get("id");
            let channel_id: String = row.get("channel_id");
            Ok(Some(ContentItem {
                id: parse_uuid(&id, "content item id")?,
                channel_id: parse_uuid(&channel_id, "channel_id")?,
                scan_job_id: parse_opt_uuid(row.get("scan_job_id"), "scan_job_id")?,
                external_id: row.get("external_id"),
                url: row.get("url"),
                title: row.get("title"),
                body: row.get("body"),
                posted_at: row.get("posted_at"),
            }))
        }
        None => Ok(None),
    }
}

pub async fn get_channel(pool: &SqlitePool, id: Uuid) -> Result<Option<Channel>> {
    let row = sqlx::query(
        "SELECT id, publisher_id, platform, handle, url FROM publisher_channels WHERE id = ?",
    )
    .bind(id.to_string())
    .fetch_optional(pool)
    .await?;

    row.map(|row| {
        let id: String = row.get("id");
        let publisher_id: String = row.get("publisher_id");
        Ok(Channel {
            id: parse_uuid(&id, "channel id")?,
            publisher_id: parse_uuid(&publisher_id, "publisher_id")?,
            platform: row.get("platform"),
            handle: row.get("handle"),
            url: row.get("url"),
        })
    })
    .transpose()
}

pub async fn get_publisher(pool: &SqlitePool, id: Uuid) -> Result<Option<Publisher>> {
    let row = sqlx::query("SELECT id, organization_id, name, contact_email FROM publishers WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.map(|row| {
        let id: String = row.get("id");
        let organization_id: String = row.get("organization_id");
        Ok(Publisher {
            id: parse_uuid(&id, "publisher id")?,
            organization_id: parse_uuid(&organization_id, "organization_id")?,
            name: row.get("name"),
            contact_email: row.get("contact_email"),
        })
    })
    .transpose()
}

/// Publisher owning a content item (via its channel)
pub async fn get_publisher_for_content_item(
    pool: &SqlitePool,
    content_item_id: Uuid,
) -> Result<Option<Publisher>> {
    let row = sqlx::query(
        r#"
        SELECT p.id, p.organization_id, p.name, p.contact_email
        FROM publishers p
        JOIN publisher_channels pc ON pc.publisher_id = p.id
        JOIN content_items ci ON ci.channel_id = pc.id
        WHERE ci.id = ?
        "#,
    )
    .bind(content_item_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.map(|row| {
        let id: String = row.get("id");
        let organization_id: String = row.get("organization_id");
        Ok(Publisher {
            id: parse_uuid(&id, "publisher id")?,
            organization_id: parse_uuid(&organization_id, "organization_id")?,
            name: row.get("name"),
            contact_email: row.get("contact_email"),
        })
    })
    .transpose()
}

/// Channels matching a multi-target scan scope: the cross product of the
/// given publishers and platforms
pub async fn list_channels_for_targets(
    pool: &SqlitePool,
    publisher_ids: &[Uuid],
    platforms: &[String],
) -> Result<Vec<Channel>> {
    if publisher_ids.is_empty() {
        return Ok(Vec::new());
    }

    let publisher_placeholders = vec!["?"; publisher_ids.len()].join(", ");
    let mut sql = format!(
        "SELECT id, publisher_id, platform, handle, url FROM publisher_channels WHERE publisher_id IN ({})",
        publisher_placeholders
    );
    if !platforms.is_empty() {
        let platform_placeholders = vec!["?"; platforms.len()].join(", ");
        sql.push_str(&format!(" AND platform IN ({})", platform_placeholders));
    }
    sql.push_str(" ORDER BY publisher_id, platform");

    let mut query = sqlx::query(&sql);
    for publisher_id in publisher_ids {
        query = query.bind(publisher_id.to_string());
    }
    for platform in platforms {
        query = query.bind(platform);
    }

    let rows = query.fetch_all(pool).await?;
    rows.iter()
        .map(|row| {
            let id: String = row.get("id");
            let publisher_id: String = row.get("publisher_id");
            Ok(Channel {
                id: parse_uuid(&id, "channel id")?,
                publisher_id: parse_uuid(&publisher_id, "publisher_id")?,
                platform: row.get("platform"),
                handle: row.get("handle"),
                url: row.get("url"),
            })
        })
        .collect()
}

/// Insert a captured frame for a content item
pub async fn insert_content_image(pool: &SqlitePool, image: &ContentImage) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO content_images (id, content_item_id, url, video_id, frame_seconds, captured_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(image.id.to_string())
    .bind(image.content_item_id.to_string())
    .bind(&image.url)
    .bind(&image.video_id)
    .bind(image.frame_seconds)
    .bind(&image.captured_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Most recent frame for (video, second) captured after the given cutoff
///
/// Screenshot requests within the cache window reuse this row instead of
/// invoking the capture service again.
pub async fn find_cached_image(
    pool: &SqlitePool,
    video_id: &str,
    frame_seconds: f64,
    captured_after: chrono::DateTime<chrono::Utc>,
) -> Result<Option<ContentImage>> {
    let row = sqlx::query(
        r#"
        SELECT id, content_item_id, url, video_id, frame_seconds, captured_at
        FROM content_images
        WHERE video_id = ? AND frame_seconds = ? AND captured_at >= ?
        ORDER BY captured_at DESC
        LIMIT 1
        "#,
    )
    .bind(video_id)
    .bind(frame_seconds)
    .bind(captured_after.to_rfc3339())
    .fetch_optional(pool)
    .await?;

    row.map(|row| {
        let id: String = row.get("id");
        let content_item_id: String = row.get("content_item_id");
        Ok(ContentImage {
            id: parse_uuid(&id, "image id")?,
            content_item_id: parse_uuid(&content_item_id, "content_item_id")?,
            url: row.get("url"),
            video_id: row.get("video_id"),
            frame_seconds: row.get("frame_seconds"),
            captured_at: row.get("captured_at"),
        })
    })
    .transpose()
}

#[cfg(test)]
pub mod tests_support {
    //! Seed helpers shared by the crate's database tests

    use sqlx::SqlitePool;
    use uuid::Uuid;

    pub struct SeededContent {
        pub organization_id: Uuid,
        pub publisher_id: Uuid,
        pub channel_id: Uuid,
        pub second_channel_id: Uuid,
        pub scan_job_id: Uuid,
        pub content_item_id: Uuid,
        pub product_id: Uuid,
        pub product_rule_id: Uuid,
        pub channel_rule_id: Uuid,
        pub admin_id: Uuid,
        pub reviewer_id: Uuid,
        pub publisher_user_id: Uuid,
    }

    /// Insert one organization with a publisher, two channels, a running
    /// scan job, one content item under the job, rules, and three users
    /// (one per role).
    pub async fn seed_content(pool: &SqlitePool) -> SeededContent {
        let seeded = SeededContent {
            organization_id: Uuid::new_v4(),
            publisher_id: Uuid::new_v4(),
            channel_id: Uuid::new_v4(),
            second_channel_id: Uuid::new_v4(),
            scan_job_id: Uuid::new_v4(),
            content_item_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            product_rule_id: Uuid::new_v4(),
            channel_rule_id: Uuid::new_v4(),
            admin_id: Uuid::new_v4(),
            reviewer_id: Uuid::new_v4(),
            publisher_user_id: Uuid::new_v4(),
        };

        sqlx::query("INSERT INTO organizations (id, name) VALUES (?, 'Acme Compliance')")
            .bind(seeded.organization_id.to_string())
            .execute(pool)
            .await
            .unwrap();

        for (id, email, role, token) in [
            (seeded.admin_id, "admin@acme.test", "ADMIN", "admin-token"),
            (seeded.reviewer_id, "reviewer@acme.test", "REVIEWER", "reviewer-token"),
            (seeded.publisher_user_id, "publisher@acme.test", "PUBLISHER", "publisher-token"),
        ] {
            sqlx::query(
                "INSERT INTO users (id, organization_id, email, role, api_token) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(id.to_string())
            .bind(seeded.organization_id.to_string())
            .bind(email)
            .bind(role)
            .bind(token)
            .execute(pool)
            .await
            .unwrap();
        }

        sqlx::query("INSERT INTO publishers (id, organization_id, name) VALUES (?, ?, 'Creator Co')")
            .bind(seeded.publisher_id.to_string())
            .bind(seeded.organization_id.to_string())
            .execute(pool)
            .await
            .unwrap();

        for (id, platform, handle) in [
            (seeded.channel_id, "youtube", "@creator"),
            (seeded.second_channel_id, "instagram", "creator.co"),
        ] {
            sqlx::query(
                "INSERT INTO publisher_channels (id, publisher_id, platform, handle) VALUES (?, ?, ?, ?)",
            )
            .bind(id.to_string())
            .bind(seeded.publisher_id.to_string())
            .bind(platform)
            .bind(handle)
            .execute(pool)
            .await
            .unwrap();
        }

        sqlx::query("INSERT INTO products (id, organization_id, name) VALUES (?, ?, 'SuperSnack')")
            .bind(seeded.product_id.to_string())
            .bind(seeded.organization_id.to_string())
            .execute(pool)
            .await
            .unwrap();

        sqlx::query(
            "INSERT INTO product_rules (id, product_id, name, description) VALUES (?, ?, 'No health claims', 'Content must not state medical benefits')",
        )
        .bind(seeded.product_rule_id.to_string())
        .bind(seeded.product_id.to_string())
        .execute(pool)
        .await
        .unwrap();

        sqlx::query(
            "INSERT INTO channel_rules (id, organization_id, name, description) VALUES (?, ?, 'Ad disclosure', 'Sponsored content must be marked')",
        )
        .bind(seeded.channel_rule_id.to_string())
        .bind(seeded.organization_id.to_string())
        .execute(pool)
        .await
        .unwrap();

        sqlx::query(
            "INSERT INTO scan_jobs (id, organization_id, status, created_at, updated_at) VALUES (?, ?, 'RUNNING', ?, ?)",
        )
        .bind(seeded.scan_job_id.to_string())
        .bind(seeded.organization_id.to_string())
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(pool)
        .await
        .unwrap();

        sqlx::query(
            "INSERT INTO content_items (id, channel_id, scan_job_id, title) VALUES (?, ?, ?, 'Unboxing video')",
        )
        .bind(seeded.content_item_id.to_string())
        .bind(seeded.channel_id.to_string())
        .bind(seeded.scan_job_id.to_string())
        .execute(pool)
        .await
        .unwrap();

        seeded
    }
}
