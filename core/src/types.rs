//! Domain types for the office-hours help queue.
//!
//! This module contains the value objects and the central `Ticket` entity.
//! Tickets carry denormalized display names (creator, helper, assignment,
//! location) so that queue views can render without extra lookups.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for a ticket.
///
/// Ticket ids are integers assigned by the ticket store in creation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TicketId(i64);

impl TicketId {
    /// Create a `TicketId` from its integer value.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner integer value.
    #[must_use]
    pub const fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a user (student or staff member).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(Uuid);

impl UserId {
    /// Creates a new random `UserId`.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `UserId` from a `Uuid`.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for a course assignment a ticket is about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssignmentId(i64);

impl AssignmentId {
    /// Create an `AssignmentId` from its integer value.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner integer value.
    #[must_use]
    pub const fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for AssignmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for a physical or virtual help location.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocationId(i64);

impl LocationId {
    /// Create a `LocationId` from its integer value.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner integer value.
    #[must_use]
    pub const fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Enumerations
// ============================================================================

/// Lifecycle status of a ticket.
///
/// Legal transitions form a small graph:
///
/// ```text
/// Pending ──> Open ──> Assigned ──> Resolved
///              ▲          │            │
///              └──────────┘ (requeue)  │
///              ▲                       │
///              └───────────────────────┘ (reopen)
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    /// Awaiting staff approval (moderation stage).
    Pending,
    /// Visible in the queue, waiting for help.
    Open,
    /// A staff member is currently helping.
    Assigned,
    /// Help completed; terminal from the queue's perspective.
    Resolved,
}

impl TicketStatus {
    /// Lowercase name used in query strings and log fields.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Open => "open",
            Self::Assigned => "assigned",
            Self::Resolved => "resolved",
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of help request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketType {
    /// Help with a bug in the student's own work.
    Debugging,
    /// A conceptual question about course material.
    Conceptual,
    /// A routine assignment checkoff.
    Checkoff,
}

impl TicketType {
    /// Whether tickets of this type pass through the moderation stage
    /// when the stage is enabled.
    ///
    /// Checkoffs are routine, pre-defined interactions and skip moderation.
    #[must_use]
    pub const fn requires_moderation(&self) -> bool {
        match self {
            Self::Debugging | Self::Conceptual => true,
            Self::Checkoff => false,
        }
    }

    /// Whether tickets of this type may be marked public.
    ///
    /// Only conceptual questions can be joined by other students; debugging
    /// tickets expose student code and checkoffs are individual.
    #[must_use]
    pub const fn may_be_public(&self) -> bool {
        matches!(self, Self::Conceptual)
    }
}

impl fmt::Display for TicketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Debugging => "debugging",
            Self::Conceptual => "conceptual",
            Self::Checkoff => "checkoff",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Ticket entity
// ============================================================================

/// A single help request.
///
/// The ticket store owns the canonical copy; every other component works on
/// snapshots carried by events or fetched in bulk.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    /// Store-assigned identity, immutable once created.
    pub id: TicketId,
    /// Free-text problem description (at most [`MAX_DESCRIPTION_LEN`] chars).
    pub description: String,
    /// Category of the request.
    pub ticket_type: TicketType,
    /// Current lifecycle status.
    pub status: TicketStatus,
    /// Public tickets may be joined by other students.
    pub is_public: bool,
    /// When the ticket was created.
    pub created_at: DateTime<Utc>,
    /// When help first started; set at the first transition to Assigned.
    pub helped_at: Option<DateTime<Utc>>,
    /// When the ticket was resolved; cleared again by reopen.
    pub resolved_at: Option<DateTime<Utc>>,
    /// Creator identity.
    pub created_by: UserId,
    /// Creator display name.
    pub created_by_name: String,
    /// Current helper identity; cleared by requeue.
    pub helped_by: Option<UserId>,
    /// Current helper display name.
    pub helped_by_name: Option<String>,
    /// Assignment the ticket is about.
    pub assignment_id: AssignmentId,
    /// Assignment display name.
    pub assignment_name: String,
    /// Where the student is sitting.
    pub location_id: LocationId,
    /// Location display name.
    pub location_name: String,
    /// Extra location detail (lab station number, table, …).
    pub location_description: String,
    /// Personal queue this ticket was filed in, if any.
    pub personal_queue_name: Option<String>,
}

/// Maximum accepted description length, in characters.
pub const MAX_DESCRIPTION_LEN: usize = 1000;

impl Ticket {
    /// Whether the ticket is still active (not resolved).
    #[must_use]
    pub const fn is_active(&self) -> bool {
        !matches!(self.status, TicketStatus::Resolved)
    }
}
