//! Flag engine operations
//!
//! Service-layer entry points for flag creation, review updates, deletion,
//! and comments. Every mutation that can change which flags count as active
//! recomputes the owning scan job's `has_active_flags` rollup afterwards:
//! a full recount, idempotent and safe to re-run after partial failure.

use sqlx::SqlitePool;
use uuid::Uuid;
use vigil_common::events::{EventBus, VigilEvent};
use vigil_common::types::{FlagSource, FlagStatus, RuleType, UserRole};
use vigil_common::{Error, Result};

use crate::db;
use crate::db::audit::AuditEntry;
use crate::db::comments::FlagComment;
use crate::db::users::User;
use crate::models::{Flag, ReviewUpdate};

/// Input for flag creation (AI detector, manual, or system)
#[derive(Debug, Clone)]
pub struct CreateFlagRequest {
    pub content_item_id: Uuid,
    pub rule_id: Uuid,
    pub rule_type: RuleType,
    pub ai_confidence: f64,
    pub status: FlagStatus,
    pub flag_source: FlagSource,
    pub product_id: Option<Uuid>,
    pub ai_evaluation: Option<String>,
    pub ai_ruling: Option<String>,
}

/// Create a flag, recomputing the parent job's rollup unless the flag was
/// born closed
pub async fn create_flag(
    pool: &SqlitePool,
    event_bus: &EventBus,
    request: CreateFlagRequest,
) -> Result<Flag> {
    if !(0.0..=100.0).contains(&request.ai_confidence) {
        return Err(Error::InvalidInput(format!(
            "Confidence must be on the 0-100 scale, got {}",
            request.ai_confidence
        )));
    }
    if db::content::get_content_item(pool, request.content_item_id)
        .await?
        .is_none()
    {
        return Err(Error::InvalidInput(format!(
            "Content item {} does not exist",
            request.content_item_id
        )));
    }
    if !db::rules::rule_exists(pool, request.rule_id, request.rule_type).await? {
        return Err(Error::InvalidInput(format!(
            "No {} rule with id {}",
            request.rule_type, request.rule_id
        )));
    }

    let mut flag = Flag::new(
        request.content_item_id,
        request.rule_id,
        request.rule_type,
        request.ai_confidence,
        request.status,
        request.flag_source,
        request.ai_evaluation,
        request.ai_ruling,
    );
    flag.product_id = request.product_id;

    db::flags::save_flag(pool, &flag).await?;

    let scan_job_id =
        db::flags::scan_job_for_content_item(pool, flag.content_item_id).await?;
    if !flag.status.is_closed() {
        if let Some(job_id) = scan_job_id {
            refresh_job_rollup(pool, job_id).await?;
        }
    }

    tracing::info!(
        flag_id = %flag.id,
        content_item_id = %flag.content_item_id,
        source = %flag.flag_source,
        status = %flag.status,
        "Flag created"
    );
    event_bus
        .emit(VigilEvent::FlagCreated {
            flag_id: flag.id,
            content_item_id: flag.content_item_id,
            scan_job_id,
            status: flag.status,
            timestamp: flag.created_at,
        })
        .ok();

    Ok(flag)
}

/// Apply a reviewer's status/verdict update to a flag
pub async fn update_flag_review_status(
    pool: &SqlitePool,
    event_bus: &EventBus,
    flag_id: Uuid,
    reviewer_id: Uuid,
    update: ReviewUpdate,
) -> Result<Flag> {
    let mut flag = db::flags::load_flag(pool, flag_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Flag {} not found", flag_id)))?;

    let now = chrono::Utc::now();
    let transition = flag.apply_review(reviewer_id, &update, now);
    db::flags::save_flag(pool, &flag).await?;

    if let Some(transition) = transition {
        if let Some(job_id) =
            db::flags::scan_job_for_content_item(pool, flag.content_item_id).await?
        {
            refresh_job_rollup(pool, job_id).await?;
        }

        tracing::info!(
            flag_id = %flag.id,
            old_status = %transition.old_status,
            new_status = %transition.new_status,
            reviewer_id = %reviewer_id,
            "Flag status changed"
        );
        event_bus
            .emit(VigilEvent::FlagStatusChanged {
                flag_id: flag.id,
                old_status: transition.old_status,
                new_status: transition.new_status,
                reviewer_id: Some(reviewer_id),
                timestamp: now,
            })
            .ok();
    }

    Ok(flag)
}

/// Hard-delete a flag (admin/reviewer only), writing the audit snapshot
/// first so the action is forensically reconstructable
pub async fn delete_flag(
    pool: &SqlitePool,
    event_bus: &EventBus,
    flag_id: Uuid,
    actor: &User,
) -> Result<()> {
    if !matches!(actor.role, UserRole::Admin | UserRole::Reviewer) {
        return Err(Error::NotPermitted(format!(
            "Role {} may not delete flags",
            actor.role
        )));
    }

    let flag = db::flags::load_flag(pool, flag_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Flag {} not found", flag_id)))?;

    // Flags are organization-scoped through their publisher
    let publisher = db::content::get_publisher_for_content_item(pool, flag.content_item_id)
        .await?
        .ok_or_else(|| Error::Internal(format!("Flag {} has no publisher", flag_id)))?;
    if publisher.organization_id != actor.organization_id {
        return Err(Error::NotPermitted(
            "Flag belongs to another organization".to_string(),
        ));
    }

    // Capture the parent job before the row disappears
    let scan_job_id = db::flags::scan_job_for_content_item(pool, flag.content_item_id).await?;

    let snapshot = serde_json::to_value(&flag)
        .map_err(|e| Error::Internal(format!("Failed to snapshot flag: {}", e)))?;
    let entry = AuditEntry::new(
        actor.organization_id,
        actor.id,
        actor.role,
        "flag.delete",
        "flag",
        flag.id,
        snapshot,
    );
    db::audit::insert_audit_entry(pool, &entry).await?;

    db::flags::delete_flag_row(pool, flag_id).await?;

    if let Some(job_id) = scan_job_id {
        refresh_job_rollup(pool, job_id).await?;
    }

    tracing::info!(flag_id = %flag_id, actor_id = %actor.id, "Flag deleted (audit logged)");
    event_bus
        .emit(VigilEvent::FlagDeleted {
            flag_id,
            scan_job_id,
            timestamp: chrono::Utc::now(),
        })
        .ok();

    Ok(())
}

/// Append a comment to a flag's thread
pub async fn add_comment(
    pool: &SqlitePool,
    event_bus: &EventBus,
    flag_id: Uuid,
    author: &User,
    body: String,
) -> Result<FlagComment> {
    if body.trim().is_empty() {
        return Err(Error::InvalidInput("Comment body must not be empty".to_string()));
    }
    if db::flags::load_flag(pool, flag_id).await?.is_none() {
        return Err(Error::NotFound(format!("Flag {} not found", flag_id)));
    }

    let comment = FlagComment::new(flag_id, author.id, author.role, body);
    db::comments::insert_comment(pool, &comment).await?;

    event_bus
        .emit(VigilEvent::FlagCommentAdded {
            flag_id,
            comment_id: comment.id,
            timestamp: comment.created_at,
        })
        .ok();

    Ok(comment)
}

/// Delete a comment: permitted for its author or an admin
pub async fn delete_comment(
    pool: &SqlitePool,
    flag_id: Uuid,
    comment_id: Uuid,
    actor: &User,
) -> Result<()> {
    let comment = db::comments::get_comment(pool, comment_id)
        .await?
        .filter(|c| c.flag_id == flag_id)
        .ok_or_else(|| Error::NotFound(format!("Comment {} not found", comment_id)))?;

    if comment.author_id != actor.id && actor.role != UserRole::Admin {
        return Err(Error::NotPermitted(
            "Only the comment author or an admin may delete a comment".to_string(),
        ));
    }

    db::comments::delete_comment_row(pool, comment_id).await?;
    Ok(())
}

/// Recompute one job's `has_active_flags` by full recount
///
/// Stateless recount rather than an incremental counter: a bounded query
/// cost buys freedom from missed decrement/increment drift.
pub async fn refresh_job_rollup(pool: &SqlitePool, scan_job_id: Uuid) -> Result<bool> {
    let active = db::flags::count_active_flags_for_job(pool, scan_job_id).await? > 0;
    db::scan_jobs::set_has_active_flags(pool, scan_job_id, active).await?;
    tracing::debug!(scan_job_id = %scan_job_id, has_active_flags = active, "Rollup recomputed");
    Ok(active)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::content::tests_support::{seed_content, SeededContent};
    use vigil_common::db::init_memory_pool;

    async fn setup() -> (SqlitePool, EventBus, SeededContent) {
        let pool = init_memory_pool().await.unwrap();
        let seeded = seed_content(&pool).await;
        (pool, EventBus::new(100), seeded)
    }

    fn ai_request(seeded: &SeededContent) -> CreateFlagRequest {
        CreateFlagRequest {
            content_item_id: seeded.content_item_id,
            rule_id: seeded.channel_rule_id,
            rule_type: RuleType::Channel,
            ai_confidence: 95.0,
            status: FlagStatus::Pending,
            flag_source: FlagSource::Ai,
            product_id: None,
            ai_evaluation: None,
            ai_ruling: Some("VIOLATION".to_string()),
        }
    }

    async fn job_rollup(pool: &SqlitePool, seeded: &SeededContent) -> bool {
        db::scan_jobs::get_scan_job(pool, seeded.scan_job_id)
            .await
            .unwrap()
            .unwrap()
            .has_active_flags
    }

    async fn reviewer(pool: &SqlitePool, seeded: &SeededContent) -> User {
        db::users::get_user(pool, seeded.reviewer_id)
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_flag_validates_rule_reference() {
        let (pool, bus, seeded) = setup().await;

        let mut request = ai_request(&seeded);
        request.rule_id = Uuid::new_v4();
        let err = create_flag(&pool, &bus, request).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        // Right id, wrong discriminator
        let mut request = ai_request(&seeded);
        request.rule_type = RuleType::Product;
        let err = create_flag(&pool, &bus, request).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_create_flag_rejects_out_of_range_confidence() {
        let (pool, bus, seeded) = setup().await;
        let mut request = ai_request(&seeded);
        request.ai_confidence = 101.0;
        assert!(matches!(
            create_flag(&pool, &bus, request).await.unwrap_err(),
            Error::InvalidInput(_)
        ));
    }

    #[tokio::test]
    async fn test_rollup_tracks_flag_lifecycle() {
        let (pool, bus, seeded) = setup().await;
        assert!(!job_rollup(&pool, &seeded).await);

        // Create: one active flag -> rollup true
        let flag = create_flag(&pool, &bus, ai_request(&seeded)).await.unwrap();
        assert!(job_rollup(&pool, &seeded).await);

        // Close it -> rollup false
        update_flag_review_status(
            &pool,
            &bus,
            flag.id,
            seeded.reviewer_id,
            ReviewUpdate {
                status: Some(FlagStatus::InReview),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        update_flag_review_status(
            &pool,
            &bus,
            flag.id,
            seeded.reviewer_id,
            ReviewUpdate {
                status: Some(FlagStatus::Closed),
                human_verdict: Some(vigil_common::types::HumanVerdict::Compliant),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(!job_rollup(&pool, &seeded).await);

        // A second flag flips it back to true
        create_flag(&pool, &bus, ai_request(&seeded)).await.unwrap();
        assert!(job_rollup(&pool, &seeded).await);
    }

    #[tokio::test]
    async fn test_flag_created_closed_leaves_rollup_false() {
        let (pool, bus, seeded) = setup().await;
        let mut request = ai_request(&seeded);
        request.status = FlagStatus::Closed;
        create_flag(&pool, &bus, request).await.unwrap();
        assert!(!job_rollup(&pool, &seeded).await);
    }

    #[tokio::test]
    async fn test_update_missing_flag_is_not_found() {
        let (pool, bus, seeded) = setup().await;
        let err = update_flag_review_status(
            &pool,
            &bus,
            Uuid::new_v4(),
            seeded.reviewer_id,
            ReviewUpdate::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_flag_writes_exactly_one_audit_snapshot() {
        let (pool, bus, seeded) = setup().await;
        let flag = create_flag(&pool, &bus, ai_request(&seeded)).await.unwrap();
        let actor = reviewer(&pool, &seeded).await;

        delete_flag(&pool, &bus, flag.id, &actor).await.unwrap();

        assert!(db::flags::load_flag(&pool, flag.id).await.unwrap().is_none());
        assert_eq!(
            db::audit::count_audit_entries_for_entity(&pool, "flag", flag.id)
                .await
                .unwrap(),
            1
        );

        // Snapshot must capture the pre-deletion state
        let entries = db::audit::list_audit_entries(&pool, seeded.organization_id, Some("flag"), 10, 0)
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "flag.delete");
        assert_eq!(entries[0].detail["status"], "PENDING");
        assert_eq!(entries[0].detail["id"], flag.id.to_string());

        // Rollup reflects the deletion
        assert!(!job_rollup(&pool, &seeded).await);
    }

    #[tokio::test]
    async fn test_delete_flag_forbidden_for_publisher_role() {
        let (pool, bus, seeded) = setup().await;
        let flag = create_flag(&pool, &bus, ai_request(&seeded)).await.unwrap();
        let actor = db::users::get_user(&pool, seeded.publisher_user_id)
            .await
            .unwrap()
            .unwrap();

        let err = delete_flag(&pool, &bus, flag.id, &actor).await.unwrap_err();
        assert!(matches!(err, Error::NotPermitted(_)));
        // No audit entry and no deletion on a refused action
        assert!(db::flags::load_flag(&pool, flag.id).await.unwrap().is_some());
        assert_eq!(
            db::audit::count_audit_entries_for_entity(&pool, "flag", flag.id)
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_comment_delete_permissions() {
        let (pool, bus, seeded) = setup().await;
        let flag = create_flag(&pool, &bus, ai_request(&seeded)).await.unwrap();

        let author = db::users::get_user(&pool, seeded.publisher_user_id)
            .await
            .unwrap()
            .unwrap();
        let comment = add_comment(&pool, &bus, flag.id, &author, "fixed in latest upload".to_string())
            .await
            .unwrap();

        // A different non-admin may not delete it
        let other = reviewer(&pool, &seeded).await;
        let err = delete_comment(&pool, flag.id, comment.id, &other)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotPermitted(_)));

        // The author may
        delete_comment(&pool, flag.id, comment.id, &author)
            .await
            .unwrap();
        assert!(db::comments::get_comment(&pool, comment.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_admin_may_delete_any_comment() {
        let (pool, bus, seeded) = setup().await;
        let flag = create_flag(&pool, &bus, ai_request(&seeded)).await.unwrap();
        let author = reviewer(&pool, &seeded).await;
        let comment = add_comment(&pool, &bus, flag.id, &author, "note".to_string())
            .await
            .unwrap();

        let admin = db::users::get_user(&pool, seeded.admin_id).await.unwrap().unwrap();
        delete_comment(&pool, flag.id, comment.id, &admin).await.unwrap();
    }

    #[tokio::test]
    async fn test_fast_path_review_backfills_timestamps() {
        let (pool, bus, seeded) = setup().await;
        let flag = create_flag(&pool, &bus, ai_request(&seeded)).await.unwrap();

        let updated = update_flag_review_status(
            &pool,
            &bus,
            flag.id,
            seeded.reviewer_id,
            ReviewUpdate {
                status: Some(FlagStatus::Remediating),
                human_verdict: Some(vigil_common::types::HumanVerdict::Violation),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.status, FlagStatus::Remediating);
        assert_eq!(updated.in_review_at, updated.decision_made_at);
        assert!(updated.remediation_start_time.is_some());

        // And the persisted row agrees
        let loaded = db::flags::load_flag(&pool, flag.id).await.unwrap().unwrap();
        assert_eq!(loaded.in_review_at, updated.in_review_at);
        assert_eq!(loaded.remediation_start_time, updated.remediation_start_time);
    }
}
