//! Flag lifecycle state machine
//!
//! A flag progresses `PENDING → IN_REVIEW → REMEDIATING → CLOSED`, with a
//! fast path `PENDING → REMEDIATING` when a reviewer records a violation
//! without an explicit "in review" step, and a direct `IN_REVIEW → CLOSED`
//! path for compliant verdicts or violations needing no remediation.
//!
//! Stage-entry timestamps are set exactly once, on the transition into the
//! corresponding stage, and never overwritten; later transitions backfill a
//! missing timestamp but leave an existing one untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vigil_common::types::{
    FlagSource, FlagStatus, HumanVerdict, ResolutionMethod, RuleType,
};

/// One detected (or asserted) compliance issue against one content item
/// under one rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flag {
    pub id: Uuid,
    pub content_item_id: Uuid,
    /// Polymorphic reference: resolved against product_rules or
    /// channel_rules depending on `rule_type`
    pub rule_id: Uuid,
    pub rule_type: RuleType,
    pub product_id: Option<Uuid>,
    pub reviewer_id: Option<Uuid>,
    pub image_id: Option<Uuid>,
    pub flag_source: FlagSource,

    // AI fields: written once by the detector, immutable thereafter
    // except for feedback_notes
    pub ai_confidence: f64,
    pub ai_evaluation: Option<String>,
    pub ai_ruling: Option<String>,
    /// Normalized form of `ai_ruling`, derived once at write time so the
    /// read side never string-matches
    pub ai_ruling_verdict: Option<HumanVerdict>,
    pub feedback_notes: Option<String>,

    // Human fields
    pub human_verdict: Option<HumanVerdict>,
    pub human_verdict_reasoning: Option<String>,
    pub internal_notes: Option<String>,

    pub status: FlagStatus,
    pub resolution_method: Option<ResolutionMethod>,

    // Stage-entry timestamps, each set exactly once
    pub in_review_at: Option<DateTime<Utc>>,
    pub decision_made_at: Option<DateTime<Utc>>,
    pub remediation_start_time: Option<DateTime<Utc>>,
    pub remediation_completed_at: Option<DateTime<Utc>>,
    /// Refreshed on every review update, unlike the stage timestamps
    pub reviewed_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Mutable review fields accepted from a reviewer
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewUpdate {
    pub status: Option<FlagStatus>,
    pub human_verdict: Option<HumanVerdict>,
    pub human_verdict_reasoning: Option<String>,
    pub internal_notes: Option<String>,
    pub feedback_notes: Option<String>,
}

/// Status change produced by a review update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusTransition {
    pub old_status: FlagStatus,
    pub new_status: FlagStatus,
}

impl Flag {
    /// Create a new flag in the given initial status
    ///
    /// The AI ruling is normalized here, at write time. Flags created
    /// directly in a settled state by the detector record how they got
    /// there (`AI_AUTO_REMEDIATE` / `AI_AUTO_CLOSE`).
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        content_item_id: Uuid,
        rule_id: Uuid,
        rule_type: RuleType,
        ai_confidence: f64,
        status: FlagStatus,
        flag_source: FlagSource,
        ai_evaluation: Option<String>,
        ai_ruling: Option<String>,
    ) -> Self {
        let now = Utc::now();
        let ai_ruling_verdict = ai_ruling.as_deref().and_then(normalize_ruling);
        let resolution_method = match (flag_source, status) {
            (FlagSource::Ai, FlagStatus::Remediating) => Some(ResolutionMethod::AiAutoRemediate),
            (FlagSource::Ai, FlagStatus::Closed) => Some(ResolutionMethod::AiAutoClose),
            _ => None,
        };

        Self {
            id: Uuid::new_v4(),
            content_item_id,
            rule_id,
            rule_type,
            product_id: None,
            reviewer_id: None,
            image_id: None,
            flag_source,
            ai_confidence,
            ai_evaluation,
            ai_ruling,
            ai_ruling_verdict,
            feedback_notes: None,
            human_verdict: None,
            human_verdict_reasoning: None,
            internal_notes: None,
            status,
            resolution_method,
            in_review_at: None,
            decision_made_at: None,
            remediation_start_time: if status == FlagStatus::Remediating {
                Some(now)
            } else {
                None
            },
            remediation_completed_at: None,
            reviewed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a reviewer's update, computing stage-timestamp backfills from
    /// the (current, requested) status pair
    ///
    /// Pairs outside the transition table still apply the status change and
    /// reviewer link, but set no stage timestamp beyond `reviewed_at`
    /// (which every review update refreshes). Returns the transition when
    /// the status actually changed.
    pub fn apply_review(
        &mut self,
        reviewer_id: Uuid,
        update: &ReviewUpdate,
        now: DateTime<Utc>,
    ) -> Option<StatusTransition> {
        self.reviewer_id = Some(reviewer_id);
        self.reviewed_at = Some(now);
        self.updated_at = now;

        if let Some(verdict) = update.human_verdict {
            self.human_verdict = Some(verdict);
        }
        if let Some(reasoning) = &update.human_verdict_reasoning {
            self.human_verdict_reasoning = Some(reasoning.clone());
        }
        if let Some(notes) = &update.internal_notes {
            self.internal_notes = Some(notes.clone());
        }
        if let Some(notes) = &update.feedback_notes {
            self.feedback_notes = Some(notes.clone());
        }

        let new_status = match update.status {
            Some(s) if s != self.status => s,
            _ => return None,
        };
        let old_status = self.status;

        match (old_status, new_status) {
            (FlagStatus::Pending, FlagStatus::InReview) => {
                self.in_review_at.get_or_insert(now);
            }
            (FlagStatus::InReview, FlagStatus::Remediating) => {
                self.decision_made_at.get_or_insert(now);
                self.remediation_start_time.get_or_insert(now);
            }
            (FlagStatus::InReview, FlagStatus::Closed) => {
                self.decision_made_at.get_or_insert(now);
            }
            // Fast path: reviewer records a violation without an explicit
            // "in review" step; the skipped stages are backfilled.
            (FlagStatus::Pending, FlagStatus::Remediating) => {
                self.in_review_at.get_or_insert(now);
                self.decision_made_at.get_or_insert(now);
                self.remediation_start_time.get_or_insert(now);
            }
            (FlagStatus::Remediating, FlagStatus::Closed) => {
                self.remediation_completed_at.get_or_insert(now);
                self.in_review_at.get_or_insert(now);
                self.decision_made_at.get_or_insert(now);
            }
            _ => {}
        }

        self.status = new_status;
        if new_status == FlagStatus::Closed {
            self.resolution_method
                .get_or_insert(ResolutionMethod::HumanReview);
        }

        Some(StatusTransition {
            old_status,
            new_status,
        })
    }
}

/// Normalize a raw AI ruling label to the reviewer verdict enum
///
/// The detector's ruling text is free-form ("Violation", "VIOLATION:
/// prohibited claim", "No violation detected", "compliant"). Matching is
/// case-insensitive, and the negated forms are checked before the bare
/// substring so "no violation" does not read as a violation.
pub fn normalize_ruling(ruling: &str) -> Option<HumanVerdict> {
    let lowered = ruling.to_lowercase();
    if lowered.contains("no violation") || lowered.contains("compliant") {
        Some(HumanVerdict::Compliant)
    } else if lowered.contains("violation") {
        Some(HumanVerdict::Violation)
    } else {
        None
    }
}
