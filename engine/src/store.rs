//! The ticket store contract.
//!
//! The store owns the canonical ticket records and is the only shared
//! mutable resource in the system. Every status change goes through
//! [`TicketStore::transition`], whose contract makes the read-validate-write
//! sequence atomic per ticket: the write is conditional on the expected
//! prior status, so two racing transitions against one ticket cannot both
//! succeed.

use chrono::{DateTime, Utc};
use officehours_core::types::{
    AssignmentId, LocationId, Ticket, TicketId, TicketStatus, TicketType, UserId,
};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors raised by ticket store implementations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A targeted ticket does not exist.
    #[error("ticket {0} not found")]
    NotFound(TicketId),

    /// One or more targeted tickets were not in the expected status.
    ///
    /// The batch was not applied at all.
    #[error("{n} ticket(s) not in expected status {expected}", n = .ids.len())]
    PreconditionFailed {
        /// The status the transition requires.
        expected: TicketStatus,
        /// The tickets that violated it.
        ids: Vec<TicketId>,
    },

    /// Backend failure (connection lost, query failed, …).
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Boxed future alias for dyn-compatible trait methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Fields for a ticket about to be created.
///
/// The store assigns the id; the engine decides the initial status and
/// stamps `created_at`.
#[derive(Clone, Debug)]
pub struct NewTicketRecord {
    /// Problem description (already validated by the engine).
    pub description: String,
    /// Category of the request.
    pub ticket_type: TicketType,
    /// Initial status: `Pending` or `Open`.
    pub status: TicketStatus,
    /// Whether other students may join.
    pub is_public: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Creator identity.
    pub created_by: UserId,
    /// Creator display name.
    pub created_by_name: String,
    /// Assignment the ticket is about.
    pub assignment_id: AssignmentId,
    /// Assignment display name.
    pub assignment_name: String,
    /// Help location.
    pub location_id: LocationId,
    /// Location display name.
    pub location_name: String,
    /// Extra location detail.
    pub location_description: String,
    /// Personal queue, if any.
    pub personal_queue_name: Option<String>,
}

/// One of the five legal lifecycle edges, with the data it writes.
#[derive(Clone, Debug)]
pub enum Transition {
    /// Pending → Open.
    Approve,
    /// Open → Assigned: records the helper and the first help time.
    Assign {
        /// Helper identity.
        helper: UserId,
        /// Helper display name.
        helper_name: String,
        /// Time help started.
        at: DateTime<Utc>,
    },
    /// Assigned → Resolved: records the resolution time.
    Resolve {
        /// Time of resolution.
        at: DateTime<Utc>,
    },
    /// Assigned → Open: clears the helper identity.
    Requeue,
    /// Resolved → Open: clears the resolution time.
    Reopen,
}

impl Transition {
    /// The status every targeted ticket must currently have.
    #[must_use]
    pub const fn expected(&self) -> TicketStatus {
        match self {
            Self::Approve => TicketStatus::Pending,
            Self::Assign { .. } => TicketStatus::Open,
            Self::Resolve { .. } | Self::Requeue => TicketStatus::Assigned,
            Self::Reopen => TicketStatus::Resolved,
        }
    }

    /// The status tickets end up in.
    #[must_use]
    pub const fn target(&self) -> TicketStatus {
        match self {
            Self::Approve | Self::Requeue | Self::Reopen => TicketStatus::Open,
            Self::Assign { .. } => TicketStatus::Assigned,
            Self::Resolve { .. } => TicketStatus::Resolved,
        }
    }

    /// Apply this transition's field changes to a ticket.
    ///
    /// `helped_at` is written only on the first assignment; requeue keeps
    /// it but drops the helper identity; reopen clears `resolved_at` so a
    /// later resolve stamps it again.
    pub fn apply(&self, ticket: &mut Ticket) {
        ticket.status = self.target();
        match self {
            Self::Approve => {},
            Self::Assign {
                helper,
                helper_name,
                at,
            } => {
                ticket.helped_by = Some(*helper);
                ticket.helped_by_name = Some(helper_name.clone());
                if ticket.helped_at.is_none() {
                    ticket.helped_at = Some(*at);
                }
            },
            Self::Resolve { at } => {
                ticket.resolved_at = Some(*at);
            },
            Self::Requeue => {
                ticket.helped_by = None;
                ticket.helped_by_name = None;
            },
            Self::Reopen => {
                ticket.resolved_at = None;
            },
        }
    }
}

/// Durable record of tickets.
///
/// Uses explicit `Pin<Box<dyn Future>>` returns so engines can hold the
/// store as `Arc<dyn TicketStore>`.
pub trait TicketStore: Send + Sync {
    /// Persist a new ticket and assign its id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on storage failure.
    fn create(&self, record: NewTicketRecord) -> StoreFuture<'_, Ticket>;

    /// Fetch a single ticket by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on storage failure.
    fn get(&self, id: TicketId) -> StoreFuture<'_, Option<Ticket>>;

    /// List all tickets currently in a status, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on storage failure.
    fn list_by_status(&self, status: TicketStatus) -> StoreFuture<'_, Vec<Ticket>>;

    /// The creator's current non-resolved ticket, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on storage failure.
    fn active_ticket_for(&self, creator: UserId) -> StoreFuture<'_, Option<Ticket>>;

    /// When the creator's most recently resolved ticket was resolved.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on storage failure.
    fn last_resolved_at(&self, creator: UserId) -> StoreFuture<'_, Option<DateTime<Utc>>>;

    /// Atomically transition a batch of tickets.
    ///
    /// All-or-nothing: every targeted ticket must currently be in
    /// `transition.expected()`, checked and written as one conditional
    /// update. On success, returns the updated tickets in the order the
    /// ids were given (duplicates removed).
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] if a targeted ticket does not exist.
    /// - [`StoreError::PreconditionFailed`] if any ticket is not in the
    ///   expected status; no ticket is modified.
    /// - [`StoreError::Backend`] on storage failure.
    fn transition(&self, ids: &[TicketId], transition: Transition) -> StoreFuture<'_, Vec<Ticket>>;
}
