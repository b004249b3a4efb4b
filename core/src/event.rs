//! Lifecycle events and their wire representation.
//!
//! Two kinds of message travel over the event channel:
//!
//! - [`LifecycleEvent`] on the global `tickets` topic: carries full ticket
//!   snapshots so queue views can update without re-fetching.
//! - [`TicketSignal`] on a per-ticket `ticket-<id>` topic: a payload-less
//!   hint that the ticket's detail should be re-fetched.
//!
//! Messages are JSON-shaped ([`ChannelMessage`]): an event name plus a JSON
//! payload. Decoding is forward-compatible — an unknown event name yields
//! `None` rather than an error, so future event types never break existing
//! consumers.

use crate::types::{Ticket, TicketId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The global topic carrying queue-wide lifecycle events.
pub const GLOBAL_TOPIC: &str = "tickets";

/// Topic name for a single ticket's signal channel.
#[must_use]
pub fn ticket_topic(id: TicketId) -> String {
    format!("ticket-{id}")
}

/// Errors raised while encoding or decoding channel messages.
#[derive(Error, Debug)]
pub enum CodecError {
    /// The payload did not match the shape the event name implies.
    #[error("malformed payload for event '{name}': {source}")]
    MalformedPayload {
        /// The event name whose payload failed to decode.
        name: String,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Failed to serialize an event for publishing.
    #[error("failed to encode event '{name}': {source}")]
    Encode {
        /// The event name being encoded.
        name: String,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

/// A message as it travels over the event channel: a name plus a JSON
/// payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelMessage {
    /// Event name, e.g. `tickets-assigned`.
    pub name: String,
    /// JSON payload; `null` for payload-less signals.
    pub payload: serde_json::Value,
}

impl ChannelMessage {
    /// Create a message from a name and payload.
    #[must_use]
    pub fn new(name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }
}

/// A queue-wide lifecycle event.
///
/// Creation carries a single ticket; every batch transition carries the
/// list of tickets that moved, in the order the operation was given them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum LifecycleEvent {
    /// A ticket was created.
    NewTicket(Ticket),
    /// Tickets left the moderation stage: Pending → Open.
    Approved(Vec<Ticket>),
    /// Tickets were taken by a helper: Open → Assigned.
    Assigned(Vec<Ticket>),
    /// Tickets were resolved: Assigned → Resolved.
    Resolved(Vec<Ticket>),
    /// Tickets were put back at the front of the queue: Assigned → Open.
    Requeued(Vec<Ticket>),
    /// Resolved tickets re-entered the queue: Resolved → Open.
    Reopened(Vec<Ticket>),
}

impl LifecycleEvent {
    /// The wire name for this event.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::NewTicket(_) => "new-ticket",
            Self::Approved(_) => "tickets-approved",
            Self::Assigned(_) => "tickets-assigned",
            Self::Resolved(_) => "tickets-resolved",
            Self::Requeued(_) => "tickets-requeued",
            Self::Reopened(_) => "tickets-reopened",
        }
    }

    /// The tickets carried by this event.
    #[must_use]
    pub fn tickets(&self) -> &[Ticket] {
        match self {
            Self::NewTicket(ticket) => std::slice::from_ref(ticket),
            Self::Approved(tickets)
            | Self::Assigned(tickets)
            | Self::Resolved(tickets)
            | Self::Requeued(tickets)
            | Self::Reopened(tickets) => tickets,
        }
    }

    /// Encode this event as a channel message.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Encode`] if the payload cannot be serialized.
    pub fn encode(&self) -> Result<ChannelMessage, CodecError> {
        let payload = match self {
            Self::NewTicket(ticket) => serde_json::to_value(ticket),
            Self::Approved(tickets)
            | Self::Assigned(tickets)
            | Self::Resolved(tickets)
            | Self::Requeued(tickets)
            | Self::Reopened(tickets) => serde_json::to_value(tickets),
        }
        .map_err(|source| CodecError::Encode {
            name: self.name().to_string(),
            source,
        })?;

        Ok(ChannelMessage::new(self.name(), payload))
    }

    /// Decode a channel message into a lifecycle event.
    ///
    /// Returns `Ok(None)` for event names this consumer does not know —
    /// unknown names are ignored by contract, not treated as failures.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::MalformedPayload`] when the name is known but
    /// the payload does not deserialize to the expected shape.
    pub fn decode(message: &ChannelMessage) -> Result<Option<Self>, CodecError> {
        let malformed = |source| CodecError::MalformedPayload {
            name: message.name.clone(),
            source,
        };

        let event = match message.name.as_str() {
            "new-ticket" => Self::NewTicket(
                serde_json::from_value(message.payload.clone()).map_err(malformed)?,
            ),
            "tickets-approved" => Self::Approved(
                serde_json::from_value(message.payload.clone()).map_err(malformed)?,
            ),
            "tickets-assigned" => Self::Assigned(
                serde_json::from_value(message.payload.clone()).map_err(malformed)?,
            ),
            "tickets-resolved" => Self::Resolved(
                serde_json::from_value(message.payload.clone()).map_err(malformed)?,
            ),
            "tickets-requeued" => Self::Requeued(
                serde_json::from_value(message.payload.clone()).map_err(malformed)?,
            ),
            "tickets-reopened" => Self::Reopened(
                serde_json::from_value(message.payload.clone()).map_err(malformed)?,
            ),
            _ => return Ok(None),
        };

        Ok(Some(event))
    }
}

/// A payload-less notification on a single ticket's topic.
///
/// Consumers watching one ticket re-fetch its detail on receipt instead of
/// patching local state from a payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketSignal {
    /// The ticket left the moderation stage.
    Approved,
    /// A helper took the ticket.
    Assigned,
    /// The ticket was resolved.
    Resolved,
    /// The ticket went back to the open queue.
    Requeued,
    /// The ticket was reopened.
    Reopened,
}

impl TicketSignal {
    /// The wire name for this signal.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Approved => "ticket-approved",
            Self::Assigned => "ticket-assigned",
            Self::Resolved => "ticket-resolved",
            Self::Requeued => "ticket-requeued",
            Self::Reopened => "ticket-reopened",
        }
    }

    /// Encode this signal as a payload-less channel message.
    #[must_use]
    pub fn encode(&self) -> ChannelMessage {
        ChannelMessage::new(self.name(), serde_json::Value::Null)
    }

    /// Decode a channel message into a signal; unknown names yield `None`.
    #[must_use]
    pub fn decode(message: &ChannelMessage) -> Option<Self> {
        match message.name.as_str() {
            "ticket-approved" => Some(Self::Approved),
            "ticket-assigned" => Some(Self::Assigned),
            "ticket-resolved" => Some(Self::Resolved),
            "ticket-requeued" => Some(Self::Requeued),
            "ticket-reopened" => Some(Self::Reopened),
            _ => None,
        }
    }
}
