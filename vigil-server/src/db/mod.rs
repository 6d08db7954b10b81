//! Database access for the Vigil API server
//!
//! Raw SQL via sqlx against the shared vigil.db; UUIDs stored as TEXT,
//! timestamps as RFC3339 TEXT.

pub mod audit;
pub mod comments;
pub mod content;
pub mod dashboard;
pub mod flags;
pub mod rules;
pub mod scan_jobs;
pub mod users;

use chrono::{DateTime, Utc};
use uuid::Uuid;
use vigil_common::{Error, Result};

/// Parse a TEXT column into a UUID, naming the column on failure
pub(crate) fn parse_uuid(value: &str, column: &str) -> Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| Error::Internal(format!("Failed to parse {}: {}", column, e)))
}

/// Parse an optional TEXT column into a UUID
pub(crate) fn parse_opt_uuid(value: Option<String>, column: &str) -> Result<Option<Uuid>> {
    value.map(|s| parse_uuid(&s, column)).transpose()
}

/// Parse an RFC3339 TEXT column into a UTC timestamp
pub(crate) fn parse_timestamp(value: &str, column: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse {}: {}", column, e)))
}

/// Parse an optional RFC3339 TEXT column
pub(crate) fn parse_opt_timestamp(
    value: Option<String>,
    column: &str,
) -> Result<Option<DateTime<Utc>>> {
    value.map(|s| parse_timestamp(&s, column)).transpose()
}
