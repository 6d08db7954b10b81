//! Shared domain enums for the Vigil services
//!
//! These types travel across every layer: database TEXT columns, the HTTP
//! API, and the event bus. Database storage uses the same SCREAMING_SNAKE
//! spelling as the wire format (`as_str` / `FromStr` round-trip).

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Flag lifecycle status
///
/// Workflow stages are `PENDING → IN_REVIEW → REMEDIATING → CLOSED`.
/// `REMEDIATION_COMPLETE` exists in legacy data as a publisher-facing alias
/// of `CLOSED`: it is accepted on read and counts as closed, but application
/// logic never writes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlagStatus {
    /// Detected, awaiting a reviewer
    Pending,
    /// Reviewer has opened the flag
    InReview,
    /// Violation confirmed, waiting on publisher action
    Remediating,
    /// Legacy alias of Closed (never written, see module docs)
    RemediationComplete,
    /// Terminal
    Closed,
}

impl FlagStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlagStatus::Pending => "PENDING",
            FlagStatus::InReview => "IN_REVIEW",
            FlagStatus::Remediating => "REMEDIATING",
            FlagStatus::RemediationComplete => "REMEDIATION_COMPLETE",
            FlagStatus::Closed => "CLOSED",
        }
    }

    /// True for states that no longer count toward a scan job's
    /// `has_active_flags` rollup.
    pub fn is_closed(&self) -> bool {
        matches!(self, FlagStatus::Closed | FlagStatus::RemediationComplete)
    }
}

impl std::fmt::Display for FlagStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FlagStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PENDING" => Ok(FlagStatus::Pending),
            "IN_REVIEW" => Ok(FlagStatus::InReview),
            "REMEDIATING" => Ok(FlagStatus::Remediating),
            "REMEDIATION_COMPLETE" => Ok(FlagStatus::RemediationComplete),
            "CLOSED" => Ok(FlagStatus::Closed),
            other => Err(Error::InvalidInput(format!("Invalid flag status: {}", other))),
        }
    }
}

/// Human reviewer's binding determination on a flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HumanVerdict {
    Violation,
    Compliant,
    /// The flag itself was erroneous (bad detection, wrong rule)
    Error,
}

impl HumanVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            HumanVerdict::Violation => "VIOLATION",
            HumanVerdict::Compliant => "COMPLIANT",
            HumanVerdict::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for HumanVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HumanVerdict {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "VIOLATION" => Ok(HumanVerdict::Violation),
            "COMPLIANT" => Ok(HumanVerdict::Compliant),
            "ERROR" => Ok(HumanVerdict::Error),
            other => Err(Error::InvalidInput(format!("Invalid verdict: {}", other))),
        }
    }
}

/// How a flag reached its terminal state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolutionMethod {
    AiAutoRemediate,
    AiAutoClose,
    HumanReview,
}

impl ResolutionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionMethod::AiAutoRemediate => "AI_AUTO_REMEDIATE",
            ResolutionMethod::AiAutoClose => "AI_AUTO_CLOSE",
            ResolutionMethod::HumanReview => "HUMAN_REVIEW",
        }
    }
}

impl std::fmt::Display for ResolutionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResolutionMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "AI_AUTO_REMEDIATE" => Ok(ResolutionMethod::AiAutoRemediate),
            "AI_AUTO_CLOSE" => Ok(ResolutionMethod::AiAutoClose),
            "HUMAN_REVIEW" => Ok(ResolutionMethod::HumanReview),
            other => Err(Error::InvalidInput(format!(
                "Invalid resolution method: {}",
                other
            ))),
        }
    }
}

/// Origin of a flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagSource {
    Ai,
    Manual,
    System,
}

impl FlagSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlagSource::Ai => "ai",
            FlagSource::Manual => "manual",
            FlagSource::System => "system",
        }
    }
}

impl std::fmt::Display for FlagSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FlagSource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ai" => Ok(FlagSource::Ai),
            "manual" => Ok(FlagSource::Manual),
            "system" => Ok(FlagSource::System),
            other => Err(Error::InvalidInput(format!("Invalid flag source: {}", other))),
        }
    }
}

/// Discriminator of the polymorphic rule reference on a flag
///
/// A flag points at either a product rule or a channel rule via
/// `(rule_id, rule_type)`; the referenced table carries no relational FK, so
/// existence is checked in application code at create time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleType {
    Product,
    Channel,
}

impl RuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::Product => "product",
            RuleType::Channel => "channel",
        }
    }
}

impl std::fmt::Display for RuleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RuleType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "product" => Ok(RuleType::Product),
            "channel" => Ok(RuleType::Channel),
            other => Err(Error::InvalidInput(format!(
                "Invalid rule type '{}' (expected 'product' or 'channel')",
                other
            ))),
        }
    }
}

/// Master scan job status, rolled up from its runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanJobStatus {
    Pending,
    Running,
    Completed,
    CompletedWithErrors,
    Failed,
}

impl ScanJobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanJobStatus::Pending => "PENDING",
            ScanJobStatus::Running => "RUNNING",
            ScanJobStatus::Completed => "COMPLETED",
            ScanJobStatus::CompletedWithErrors => "COMPLETED_WITH_ERRORS",
            ScanJobStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScanJobStatus::Completed | ScanJobStatus::CompletedWithErrors | ScanJobStatus::Failed
        )
    }
}

impl std::fmt::Display for ScanJobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ScanJobStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PENDING" => Ok(ScanJobStatus::Pending),
            "RUNNING" => Ok(ScanJobStatus::Running),
            "COMPLETED" => Ok(ScanJobStatus::Completed),
            "COMPLETED_WITH_ERRORS" => Ok(ScanJobStatus::CompletedWithErrors),
            "FAILED" => Ok(ScanJobStatus::Failed),
            other => Err(Error::InvalidInput(format!(
                "Invalid scan job status: {}",
                other
            ))),
        }
    }
}

/// Status of one external scrape invocation within a scan job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanRunStatus {
    Started,
    FetchingResults,
    Completed,
    Failed,
}

impl ScanRunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanRunStatus::Started => "STARTED",
            ScanRunStatus::FetchingResults => "FETCHING_RESULTS",
            ScanRunStatus::Completed => "COMPLETED",
            ScanRunStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ScanRunStatus::Completed | ScanRunStatus::Failed)
    }
}

impl std::fmt::Display for ScanRunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ScanRunStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "STARTED" => Ok(ScanRunStatus::Started),
            "FETCHING_RESULTS" => Ok(ScanRunStatus::FetchingResults),
            "COMPLETED" => Ok(ScanRunStatus::Completed),
            "FAILED" => Ok(ScanRunStatus::Failed),
            other => Err(Error::InvalidInput(format!(
                "Invalid scan run status: {}",
                other
            ))),
        }
    }
}

/// Role attached to a user account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Admin,
    Reviewer,
    Publisher,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "ADMIN",
            UserRole::Reviewer => "REVIEWER",
            UserRole::Publisher => "PUBLISHER",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ADMIN" => Ok(UserRole::Admin),
            "REVIEWER" => Ok(UserRole::Reviewer),
            "PUBLISHER" => Ok(UserRole::Publisher),
            other => Err(Error::InvalidInput(format!("Invalid role: {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_status_round_trip() {
        for status in [
            FlagStatus::Pending,
            FlagStatus::InReview,
            FlagStatus::Remediating,
            FlagStatus::RemediationComplete,
            FlagStatus::Closed,
        ] {
            let parsed: FlagStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_legacy_remediation_complete_counts_as_closed() {
        let status: FlagStatus = "REMEDIATION_COMPLETE".parse().unwrap();
        assert!(status.is_closed());
        assert!(FlagStatus::Closed.is_closed());
        assert!(!FlagStatus::Remediating.is_closed());
    }

    #[test]
    fn test_invalid_status_rejected() {
        assert!("OPEN".parse::<FlagStatus>().is_err());
        assert!("".parse::<FlagStatus>().is_err());
    }

    #[test]
    fn test_rule_type_lowercase_only() {
        assert_eq!("product".parse::<RuleType>().unwrap(), RuleType::Product);
        assert!("PRODUCT".parse::<RuleType>().is_err());
    }

    #[test]
    fn test_serde_spelling_matches_db_spelling() {
        let json = serde_json::to_string(&FlagStatus::InReview).unwrap();
        assert_eq!(json, "\"IN_REVIEW\"");
        let json = serde_json::to_string(&ResolutionMethod::AiAutoClose).unwrap();
        assert_eq!(json, "\"AI_AUTO_CLOSE\"");
        let json = serde_json::to_string(&FlagSource::Ai).unwrap();
        assert_eq!(json, "\"ai\"");
    }
}
