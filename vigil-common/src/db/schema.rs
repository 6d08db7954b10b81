//! Table definitions for the shared vigil.db schema
//!
//! All primary keys are UUIDv4 stored as TEXT; timestamps are RFC3339 TEXT.
//! Statements are idempotent (`CREATE ... IF NOT EXISTS`) and executed in
//! order at every startup, so adding a table here is the whole migration.

/// DDL statements, in dependency order
pub const TABLE_SCHEMAS: &[&str] = &[
    // Tenancy root; deleting an organization cascades through publishers,
    // users, products, and scan jobs.
    r#"
    CREATE TABLE IF NOT EXISTS organizations (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        organization_id TEXT NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
        email TEXT NOT NULL UNIQUE,
        display_name TEXT,
        role TEXT NOT NULL CHECK (role IN ('ADMIN', 'REVIEWER', 'PUBLISHER')),
        api_token TEXT UNIQUE,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS publishers (
        id TEXT PRIMARY KEY,
        organization_id TEXT NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        contact_email TEXT,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS publisher_channels (
        id TEXT PRIMARY KEY,
        publisher_id TEXT NOT NULL REFERENCES publishers(id) ON DELETE CASCADE,
        platform TEXT NOT NULL,
        handle TEXT NOT NULL,
        url TEXT,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS products (
        id TEXT PRIMARY KEY,
        organization_id TEXT NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
        advertiser TEXT,
        name TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS product_rules (
        id TEXT PRIMARY KEY,
        product_id TEXT NOT NULL REFERENCES products(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        description TEXT NOT NULL,
        severity TEXT,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS channel_rules (
        id TEXT PRIMARY KEY,
        organization_id TEXT NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        description TEXT NOT NULL,
        severity TEXT,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS scan_jobs (
        id TEXT PRIMARY KEY,
        organization_id TEXT NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
        name TEXT,
        description TEXT,
        status TEXT NOT NULL DEFAULT 'PENDING',
        has_active_flags INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        completed_at TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS scan_job_focus_products (
        scan_job_id TEXT NOT NULL REFERENCES scan_jobs(id) ON DELETE CASCADE,
        product_id TEXT NOT NULL REFERENCES products(id) ON DELETE CASCADE,
        PRIMARY KEY (scan_job_id, product_id)
    )
    "#,
    // external_run_id UNIQUE enforces one run per external invocation;
    // (scan_job_id, channel_id) UNIQUE enforces one run per channel per job.
    r#"
    CREATE TABLE IF NOT EXISTS scan_job_runs (
        id TEXT PRIMARY KEY,
        scan_job_id TEXT NOT NULL REFERENCES scan_jobs(id) ON DELETE CASCADE,
        channel_id TEXT NOT NULL REFERENCES publisher_channels(id) ON DELETE CASCADE,
        external_run_id TEXT UNIQUE,
        status TEXT NOT NULL DEFAULT 'STARTED',
        error_message TEXT,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        UNIQUE (scan_job_id, channel_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS content_items (
        id TEXT PRIMARY KEY,
        channel_id TEXT NOT NULL REFERENCES publisher_channels(id) ON DELETE CASCADE,
        scan_job_id TEXT REFERENCES scan_jobs(id) ON DELETE SET NULL,
        external_id TEXT,
        url TEXT,
        title TEXT,
        body TEXT,
        posted_at TEXT,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS content_images (
        id TEXT PRIMARY KEY,
        content_item_id TEXT NOT NULL REFERENCES content_items(id) ON DELETE CASCADE,
        url TEXT NOT NULL,
        video_id TEXT,
        frame_seconds REAL,
        captured_at TEXT,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    // rule_id/rule_type is a polymorphic reference into product_rules or
    // channel_rules; existence is checked in application code at create time.
    r#"
    CREATE TABLE IF NOT EXISTS flags (
        id TEXT PRIMARY KEY,
        content_item_id TEXT NOT NULL REFERENCES content_items(id) ON DELETE CASCADE,
        rule_id TEXT NOT NULL,
        rule_type TEXT NOT NULL CHECK (rule_type IN ('product', 'channel')),
        product_id TEXT REFERENCES products(id) ON DELETE SET NULL,
        reviewer_id TEXT REFERENCES users(id) ON DELETE SET NULL,
        image_id TEXT REFERENCES content_images(id) ON DELETE SET NULL,
        flag_source TEXT NOT NULL DEFAULT 'ai',
        ai_confidence REAL NOT NULL,
        ai_evaluation TEXT,
        ai_ruling TEXT,
        ai_ruling_verdict TEXT,
        feedback_notes TEXT,
        human_verdict TEXT,
        human_verdict_reasoning TEXT,
        internal_notes TEXT,
        status TEXT NOT NULL DEFAULT 'PENDING'
            CHECK (status IN ('PENDING', 'IN_REVIEW', 'REMEDIATING', 'REMEDIATION_COMPLETE', 'CLOSED')),
        resolution_method TEXT,
        in_review_at TEXT,
        decision_made_at TEXT,
        remediation_start_time TEXT,
        remediation_completed_at TEXT,
        reviewed_at TEXT,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS flag_comments (
        id TEXT PRIMARY KEY,
        flag_id TEXT NOT NULL REFERENCES flags(id) ON DELETE CASCADE,
        author_id TEXT NOT NULL,
        author_role TEXT NOT NULL,
        body TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS audit_logs (
        id TEXT PRIMARY KEY,
        organization_id TEXT NOT NULL,
        actor_id TEXT NOT NULL,
        actor_role TEXT NOT NULL,
        action TEXT NOT NULL,
        entity_type TEXT NOT NULL,
        entity_id TEXT NOT NULL,
        detail TEXT NOT NULL DEFAULT '{}',
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS settings (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )
    "#,
    r#"CREATE INDEX IF NOT EXISTS idx_flags_content_item ON flags(content_item_id)"#,
    r#"CREATE INDEX IF NOT EXISTS idx_flags_status ON flags(status)"#,
    r#"CREATE INDEX IF NOT EXISTS idx_flags_reviewer ON flags(reviewer_id)"#,
    r#"CREATE INDEX IF NOT EXISTS idx_content_items_scan_job ON content_items(scan_job_id)"#,
    r#"CREATE INDEX IF NOT EXISTS idx_content_items_channel ON content_items(channel_id)"#,
    r#"CREATE INDEX IF NOT EXISTS idx_scan_job_runs_status ON scan_job_runs(status)"#,
    r#"CREATE INDEX IF NOT EXISTS idx_flag_comments_flag ON flag_comments(flag_id)"#,
    r#"CREATE INDEX IF NOT EXISTS idx_audit_logs_entity ON audit_logs(entity_type, entity_id)"#,
];
