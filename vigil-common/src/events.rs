//! Event types for the Vigil event system
//!
//! Provides the shared event definitions and EventBus used by the API server
//! and its background tasks. Events are broadcast via the EventBus and can be
//! serialized for SSE transmission to review/publisher UIs.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::types::{FlagStatus, ScanJobStatus, ScanRunStatus};

/// Vigil event types
///
/// All events use this central enum for type safety and exhaustive matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum VigilEvent {
    /// A flag was created (AI detector, manual, or system)
    ///
    /// Triggers:
    /// - SSE: Refresh review queues
    /// - Rollup: Parent scan job `has_active_flags` recompute
    FlagCreated {
        flag_id: Uuid,
        content_item_id: Uuid,
        /// Parent scan job, if the content item belongs to one
        scan_job_id: Option<Uuid>,
        status: FlagStatus,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A flag moved between lifecycle stages
    ///
    /// Triggers:
    /// - SSE: Update reviewer and publisher views
    /// - Rollup: Parent scan job `has_active_flags` recompute
    FlagStatusChanged {
        flag_id: Uuid,
        old_status: FlagStatus,
        new_status: FlagStatus,
        /// Reviewer who drove the transition, when human-initiated
        reviewer_id: Option<Uuid>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A flag was hard-deleted by an admin or reviewer (audit-logged first)
    FlagDeleted {
        flag_id: Uuid,
        scan_job_id: Option<Uuid>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A comment was appended to a flag thread
    FlagCommentAdded {
        flag_id: Uuid,
        comment_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// One scrape run changed status (monitor reconciliation)
    ScanRunStatusChanged {
        run_id: Uuid,
        scan_job_id: Uuid,
        new_status: ScanRunStatus,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A master scan job reached a terminal status
    ScanJobCompleted {
        scan_job_id: Uuid,
        status: ScanJobStatus,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

/// Central event distribution bus for application-wide events
///
/// Uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
/// - Lagged message detection for slow subscribers
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<VigilEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the given channel capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use vigil_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.capacity(), 100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<VigilEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists,
    /// `Err` when nobody is listening. Emitters treat the error as benign:
    /// events are advisory, not a durability mechanism.
    pub fn emit(&self, event: VigilEvent) -> Result<usize, broadcast::error::SendError<VigilEvent>> {
        self.tx.send(event)
    }

    /// Channel capacity this bus was created with
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
