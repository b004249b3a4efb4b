//! The ticket lifecycle engine.
//!
//! Validates and executes status transitions against the ticket store and
//! emits the corresponding events to the event channel. All five lifecycle
//! edges are batch operations with an all-or-nothing contract: clients
//! assume a batch event always describes a fully-applied move, so a batch
//! containing one ineligible ticket fails entirely before any write.

use crate::settings::{SettingsError, SiteSettings};
use crate::store::{NewTicketRecord, StoreError, TicketStore, Transition};
use chrono::Duration;
use officehours_core::channel::{ChannelError, EventChannel};
use officehours_core::environment::Clock;
use officehours_core::event::{self, CodecError, LifecycleEvent, TicketSignal, GLOBAL_TOPIC};
use officehours_core::types::{
    AssignmentId, LocationId, Ticket, TicketId, TicketStatus, TicketType, UserId,
    MAX_DESCRIPTION_LEN,
};
use std::sync::Arc;
use thiserror::Error;

/// Placeholder fragments from the starter description templates; a ticket
/// keeping them verbatim has not described its actual problem.
const STARTER_PLACEHOLDERS: [&str; 2] = ["[this test]", "[this concept]"];

/// Errors raised by lifecycle operations.
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// A targeted ticket's current status does not satisfy the operation's
    /// precondition. No ticket in the batch was modified.
    #[error("invalid transition: {n} ticket(s) not in required status {expected}", n = .ids.len())]
    InvalidTransition {
        /// The status the operation requires.
        expected: TicketStatus,
        /// The tickets that violated it.
        ids: Vec<TicketId>,
    },

    /// A targeted ticket does not exist.
    #[error("ticket {0} not found")]
    NotFound(TicketId),

    /// The creation request carried an unusable description.
    #[error("invalid description: {0}")]
    InvalidDescription(String),

    /// Ticket store or event channel unreachable. Not retried here.
    #[error("transport failure: {0}")]
    Transport(String),
}

impl From<StoreError> for LifecycleError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound(id) => Self::NotFound(id),
            StoreError::PreconditionFailed { expected, ids } => {
                Self::InvalidTransition { expected, ids }
            },
            StoreError::Backend(reason) => Self::Transport(reason),
        }
    }
}

impl From<ChannelError> for LifecycleError {
    fn from(error: ChannelError) -> Self {
        Self::Transport(error.to_string())
    }
}

impl From<SettingsError> for LifecycleError {
    fn from(error: SettingsError) -> Self {
        Self::Transport(error.to_string())
    }
}

impl From<CodecError> for LifecycleError {
    fn from(error: CodecError) -> Self {
        Self::Transport(error.to_string())
    }
}

/// Fields accepted when creating a ticket.
#[derive(Clone, Debug)]
pub struct CreateTicket {
    /// Problem description.
    pub description: String,
    /// Category of the request.
    pub ticket_type: TicketType,
    /// Requested visibility; the engine may force this off.
    pub is_public: bool,
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
    /// Extra location detail (lab station, table, …).
    pub location_description: String,
    /// Personal queue, if any.
    pub personal_queue_name: Option<String>,
}

/// Why a creation request was turned down.
///
/// A rejection is a value, not an error: the caller distinguishes it from a
/// transport failure and renders a precise explanation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CreateRejection {
    /// The creator already has a non-resolved ticket.
    AlreadyActive {
        /// The creator's existing ticket.
        ticket: TicketId,
    },
    /// The creator's last ticket was resolved too recently.
    Cooldown {
        /// Whole minutes until creation is allowed again.
        remaining_minutes: u64,
    },
}

/// Result of a creation request.
#[derive(Clone, Debug)]
pub enum CreateOutcome {
    /// The ticket was persisted and announced on the global topic.
    Created(Ticket),
    /// A business rule blocked creation; nothing was written.
    Rejected(CreateRejection),
}

/// Validates and executes lifecycle operations.
///
/// The engine is the only writer to the ticket store. It fails fast before
/// any write and never leaves a ticket partially updated.
pub struct LifecycleEngine {
    store: Arc<dyn TicketStore>,
    channel: Arc<dyn EventChannel>,
    settings: Arc<dyn SiteSettings>,
    clock: Arc<dyn Clock>,
}

impl LifecycleEngine {
    /// Assemble an engine from its collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn TicketStore>,
        channel: Arc<dyn EventChannel>,
        settings: Arc<dyn SiteSettings>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            channel,
            settings,
            clock,
        }
    }

    /// Read access to the underlying store, for queries.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn TicketStore> {
        &self.store
    }

    /// Create a ticket, subject to the creation business rules.
    ///
    /// The initial status is `Pending` when the moderation stage is enabled
    /// and the ticket type requires moderation, `Open` otherwise. Visibility
    /// is forced private for ticket types that cannot be public and whenever
    /// public tickets are disabled site-wide.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::InvalidDescription`] for an empty, over-long, or
    ///   template-placeholder description.
    /// - [`LifecycleError::Transport`] if the store, settings, or channel
    ///   are unreachable.
    pub async fn create(&self, request: CreateTicket) -> Result<CreateOutcome, LifecycleError> {
        let description = Self::validate_description(&request.description)?;

        // Business rules: one active ticket per creator, then cooldown.
        if let Some(existing) = self.store.active_ticket_for(request.created_by).await? {
            tracing::info!(
                creator = %request.created_by,
                existing = %existing.id,
                "ticket creation rejected: creator already has an active ticket"
            );
            return Ok(CreateOutcome::Rejected(CreateRejection::AlreadyActive {
                ticket: existing.id,
            }));
        }

        let now = self.clock.now();
        let cooldown_minutes = self.settings.cooldown_minutes().await?;
        if cooldown_minutes > 0 {
            if let Some(resolved_at) = self.store.last_resolved_at(request.created_by).await? {
                let cooldown = Duration::minutes(i64::try_from(cooldown_minutes).unwrap_or(i64::MAX));
                let elapsed = now.signed_duration_since(resolved_at);
                if elapsed < cooldown {
                    let remaining = cooldown - elapsed;
                    // Round up so "0 minutes remaining" never blocks.
                    let remaining_minutes = u64::try_from(
                        (remaining.num_seconds() + 59) / 60,
                    )
                    .unwrap_or(0);
                    tracing::info!(
                        creator = %request.created_by,
                        remaining_minutes,
                        "ticket creation rejected: cooldown active"
                    );
                    return Ok(CreateOutcome::Rejected(CreateRejection::Cooldown {
                        remaining_minutes,
                    }));
                }
            }
        }

        let moderation = self.settings.moderation_enabled().await?;
        let status = if moderation && request.ticket_type.requires_moderation() {
            TicketStatus::Pending
        } else {
            TicketStatus::Open
        };

        let public_enabled = self.settings.public_tickets_enabled().await?;
        let is_public = request.is_public
            && public_enabled
            && request.ticket_type.may_be_public();

        let ticket = self
            .store
            .create(NewTicketRecord {
                description,
                ticket_type: request.ticket_type,
                status,
                is_public,
                created_at: now,
                created_by: request.created_by,
                created_by_name: request.created_by_name,
                assignment_id: request.assignment_id,
                assignment_name: request.assignment_name,
                location_id: request.location_id,
                location_name: request.location_name,
                location_description: request.location_description,
                personal_queue_name: request.personal_queue_name,
            })
            .await?;

        tracing::info!(
            ticket = %ticket.id,
            status = %ticket.status,
            ticket_type = %ticket.ticket_type,
            "ticket created"
        );

        let message = LifecycleEvent::NewTicket(ticket.clone()).encode()?;
        self.channel.publish(GLOBAL_TOPIC, &message).await?;

        Ok(CreateOutcome::Created(ticket))
    }

    /// Approve pending tickets into the open queue.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::InvalidTransition`] if any ticket is not Pending;
    /// [`LifecycleError::Transport`] on store or channel failure.
    pub async fn approve(&self, ids: &[TicketId]) -> Result<Vec<Ticket>, LifecycleError> {
        self.run_transition(ids, Transition::Approve, LifecycleEvent::Approved, TicketSignal::Approved)
            .await
    }

    /// Assign open tickets to a helper.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::InvalidTransition`] if any ticket is not Open;
    /// [`LifecycleError::Transport`] on store or channel failure.
    pub async fn assign(
        &self,
        ids: &[TicketId],
        helper: UserId,
        helper_name: impl Into<String>,
    ) -> Result<Vec<Ticket>, LifecycleError> {
        let transition = Transition::Assign {
            helper,
            helper_name: helper_name.into(),
            at: self.clock.now(),
        };
        self.run_transition(ids, transition, LifecycleEvent::Assigned, TicketSignal::Assigned)
            .await
    }

    /// Resolve assigned tickets.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::InvalidTransition`] if any ticket is not Assigned;
    /// [`LifecycleError::Transport`] on store or channel failure.
    pub async fn resolve(&self, ids: &[TicketId]) -> Result<Vec<Ticket>, LifecycleError> {
        let transition = Transition::Resolve {
            at: self.clock.now(),
        };
        self.run_transition(ids, transition, LifecycleEvent::Resolved, TicketSignal::Resolved)
            .await
    }

    /// Put assigned tickets back at the front of the open queue.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::InvalidTransition`] if any ticket is not Assigned;
    /// [`LifecycleError::Transport`] on store or channel failure.
    pub async fn requeue(&self, ids: &[TicketId]) -> Result<Vec<Ticket>, LifecycleError> {
        self.run_transition(ids, Transition::Requeue, LifecycleEvent::Requeued, TicketSignal::Requeued)
            .await
    }

    /// Reopen resolved tickets into the open queue.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::InvalidTransition`] if any ticket is not Resolved;
    /// [`LifecycleError::Transport`] on store or channel failure.
    pub async fn reopen(&self, ids: &[TicketId]) -> Result<Vec<Ticket>, LifecycleError> {
        self.run_transition(ids, Transition::Reopen, LifecycleEvent::Reopened, TicketSignal::Reopened)
            .await
    }

    /// Shared path for the five batch operations: one conditional store
    /// write, then the global list event and the per-ticket signals.
    async fn run_transition(
        &self,
        ids: &[TicketId],
        transition: Transition,
        make_event: fn(Vec<Ticket>) -> LifecycleEvent,
        signal: TicketSignal,
    ) -> Result<Vec<Ticket>, LifecycleError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let expected = transition.expected();
        let target = transition.target();
        let updated = self.store.transition(ids, transition).await?;

        tracing::info!(
            count = updated.len(),
            from = %expected,
            to = %target,
            "tickets transitioned"
        );

        let message = make_event(updated.clone()).encode()?;
        self.channel.publish(GLOBAL_TOPIC, &message).await?;

        let signal_message = signal.encode();
        for ticket in &updated {
            self.channel
                .publish(&event::ticket_topic(ticket.id), &signal_message)
                .await?;
        }

        Ok(updated)
    }

    fn validate_description(raw: &str) -> Result<String, LifecycleError> {
        let description = raw.trim().to_string();
        if description.is_empty() {
            return Err(LifecycleError::InvalidDescription(
                "description must not be empty".to_string(),
            ));
        }
        if description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(LifecycleError::InvalidDescription(format!(
                "description exceeds {MAX_DESCRIPTION_LEN} characters"
            )));
        }
        for placeholder in STARTER_PLACEHOLDERS {
            if description.contains(placeholder) {
                return Err(LifecycleError::InvalidDescription(format!(
                    "replace {placeholder} with the specific test or concept"
                )));
            }
        }
        Ok(description)
    }
}
