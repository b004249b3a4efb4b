//! Ticket statistics endpoint.
//!
//! Returns per-ticket timing rows for offline analysis (wait times,
//! resolution times, load per assignment/location). One row per ticket,
//! across every lifecycle status.

use crate::error::AppError;
use crate::state::AppState;
use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use officehours_core::types::{Ticket, TicketStatus, TicketType};
use serde::Serialize;

/// One ticket's timing and classification data.
#[derive(Debug, Serialize)]
pub struct TicketStatsRow {
    /// When the ticket was created.
    pub created_at: DateTime<Utc>,
    /// When help first started, if it has.
    pub helped_at: Option<DateTime<Utc>>,
    /// When the ticket was resolved, if it has been.
    pub resolved_at: Option<DateTime<Utc>>,
    /// Current lifecycle status.
    pub status: TicketStatus,
    /// Category of the request.
    pub ticket_type: TicketType,
    /// Whether the ticket was public.
    pub is_public: bool,
    /// Help location.
    pub location_id: i64,
    /// Assignment the ticket was about.
    pub assignment_id: i64,
}

impl From<&Ticket> for TicketStatsRow {
    fn from(ticket: &Ticket) -> Self {
        Self {
            created_at: ticket.created_at,
            helped_at: ticket.helped_at,
            resolved_at: ticket.resolved_at,
            status: ticket.status,
            ticket_type: ticket.ticket_type,
            is_public: ticket.is_public,
            location_id: ticket.location_id.value(),
            assignment_id: ticket.assignment_id.value(),
        }
    }
}

/// Timing rows for every ticket, newest statuses last.
pub async fn get_ticket_stats(
    State(state): State<AppState>,
) -> Result<Json<Vec<TicketStatsRow>>, AppError> {
    let mut rows = Vec::new();
    for status in [
        TicketStatus::Pending,
        TicketStatus::Open,
        TicketStatus::Assigned,
        TicketStatus::Resolved,
    ] {
        let tickets = state
            .engine
            .store()
            .list_by_status(status)
            .await
            .map_err(officehours_engine::LifecycleError::from)?;
        rows.extend(tickets.iter().map(TicketStatsRow::from));
    }
    Ok(Json(rows))
}
