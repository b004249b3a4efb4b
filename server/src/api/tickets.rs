//! Ticket API endpoints.
//!
//! - `POST /api/tickets` — create a ticket
//! - `GET /api/tickets?status=open` — bulk fetch one partition
//! - `GET /api/tickets/:id` — single ticket detail
//! - `POST /api/tickets/{approve,assign,resolve,requeue,reopen}` — batch
//!   transitions
//!
//! Batch endpoints return the updated tickets on success and 409 when any
//! targeted ticket fails the operation's precondition (nothing is applied).

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use officehours_core::types::{
    AssignmentId, LocationId, Ticket, TicketId, TicketStatus, TicketType, UserId,
};
use officehours_engine::{CreateOutcome, CreateRejection, CreateTicket};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request to create a new ticket.
#[derive(Debug, Deserialize)]
pub struct CreateTicketRequest {
    /// Problem description.
    pub description: String,
    /// Category of the request.
    pub ticket_type: TicketType,
    /// Requested visibility (the server may force this off).
    #[serde(default)]
    pub is_public: bool,
    /// Creator identity.
    pub created_by: Uuid,
    /// Creator display name.
    pub created_by_name: String,
    /// Assignment the ticket is about.
    pub assignment_id: i64,
    /// Assignment display name.
    pub assignment_name: String,
    /// Help location.
    pub location_id: i64,
    /// Location display name.
    pub location_name: String,
    /// Extra location detail (lab station, table, …).
    #[serde(default)]
    pub location_description: String,
    /// Personal queue, if any.
    #[serde(default)]
    pub personal_queue_name: Option<String>,
}

/// Why the server declined to create a ticket.
#[derive(Debug, Serialize)]
pub struct RejectionBody {
    /// Stable rejection code: `ALREADY_ACTIVE` or `COOLDOWN`.
    pub code: &'static str,
    /// The creator's existing ticket, for `ALREADY_ACTIVE`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing_ticket_id: Option<i64>,
    /// Whole minutes left, for `COOLDOWN`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooldown_minutes_remaining: Option<u64>,
}

/// Response to a creation request.
///
/// A business-rule rejection is an explicit value, not an HTTP error, so
/// clients can tell "not created" apart from a transport failure and show
/// the precise reason.
#[derive(Debug, Serialize)]
pub struct CreateTicketResponse {
    /// The created ticket, when creation succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket: Option<Ticket>,
    /// The rejection, when a business rule blocked creation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection: Option<RejectionBody>,
}

/// Query parameters for listing tickets.
#[derive(Debug, Deserialize)]
pub struct ListTicketsQuery {
    /// Status to list, case-insensitive (`open`, `assigned`, `pending`,
    /// `resolved`).
    pub status: String,
}

/// Request targeting a batch of tickets.
#[derive(Debug, Deserialize)]
pub struct TicketIdsRequest {
    /// Tickets to transition.
    pub ticket_ids: Vec<i64>,
}

/// Request to assign tickets to a helper.
///
/// Authentication is out of scope here, so the helper identity travels in
/// the request body.
#[derive(Debug, Deserialize)]
pub struct AssignTicketsRequest {
    /// Tickets to assign.
    pub ticket_ids: Vec<i64>,
    /// Helper identity.
    pub helper_id: Uuid,
    /// Helper display name.
    pub helper_name: String,
}

/// Site settings echoed to queue clients.
#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    /// Whether new tickets pass through the Pending moderation stage.
    pub moderation_enabled: bool,
    /// Whether tickets may be marked public.
    pub public_tickets_enabled: bool,
    /// Minimum wait after a resolution before the next ticket, in minutes.
    pub cooldown_minutes: u64,
}

fn parse_status(raw: &str) -> Result<TicketStatus, AppError> {
    match raw.to_ascii_lowercase().as_str() {
        "pending" => Ok(TicketStatus::Pending),
        "open" => Ok(TicketStatus::Open),
        "assigned" => Ok(TicketStatus::Assigned),
        "resolved" => Ok(TicketStatus::Resolved),
        other => Err(AppError::bad_request(format!("unknown status '{other}'"))),
    }
}

fn to_ticket_ids(ids: &[i64]) -> Vec<TicketId> {
    ids.iter().copied().map(TicketId::new).collect()
}

// ============================================================================
// Handlers
// ============================================================================

/// Create a new ticket.
///
/// Returns 201 with the ticket, or 200 with a rejection body when a
/// business rule (duplicate active ticket, cooldown) blocked creation.
pub async fn create_ticket(
    State(state): State<AppState>,
    Json(request): Json<CreateTicketRequest>,
) -> Result<(StatusCode, Json<CreateTicketResponse>), AppError> {
    let outcome = state
        .engine
        .create(CreateTicket {
            description: request.description,
            ticket_type: request.ticket_type,
            is_public: request.is_public,
            created_by: UserId::from_uuid(request.created_by),
            created_by_name: request.created_by_name,
            assignment_id: AssignmentId::new(request.assignment_id),
            assignment_name: request.assignment_name,
            location_id: LocationId::new(request.location_id),
            location_name: request.location_name,
            location_description: request.location_description,
            personal_queue_name: request.personal_queue_name,
        })
        .await?;

    let response = match outcome {
        CreateOutcome::Created(ticket) => (
            StatusCode::CREATED,
            Json(CreateTicketResponse {
                ticket: Some(ticket),
                rejection: None,
            }),
        ),
        CreateOutcome::Rejected(rejection) => {
            let body = match rejection {
                CreateRejection::AlreadyActive { ticket } => RejectionBody {
                    code: "ALREADY_ACTIVE",
                    existing_ticket_id: Some(ticket.value()),
                    cooldown_minutes_remaining: None,
                },
                CreateRejection::Cooldown { remaining_minutes } => RejectionBody {
                    code: "COOLDOWN",
                    existing_ticket_id: None,
                    cooldown_minutes_remaining: Some(remaining_minutes),
                },
            };
            (
                StatusCode::OK,
                Json(CreateTicketResponse {
                    ticket: None,
                    rejection: Some(body),
                }),
            )
        },
    };

    Ok(response)
}

/// List tickets in one status, oldest first.
pub async fn list_tickets(
    Query(query): Query<ListTicketsQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<Ticket>>, AppError> {
    let status = parse_status(&query.status)?;
    let tickets = state
        .engine
        .store()
        .list_by_status(status)
        .await
        .map_err(officehours_engine::LifecycleError::from)?;
    Ok(Json(tickets))
}

/// Get one ticket's detail.
///
/// Per-ticket signal subscribers call this on receipt of a signal.
pub async fn get_ticket(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<Ticket>, AppError> {
    let ticket = state
        .engine
        .store()
        .get(TicketId::new(id))
        .await
        .map_err(officehours_engine::LifecycleError::from)?;
    ticket
        .map(Json)
        .ok_or_else(|| AppError::not_found("Ticket", id))
}

/// Approve pending tickets into the open queue.
pub async fn approve_tickets(
    State(state): State<AppState>,
    Json(request): Json<TicketIdsRequest>,
) -> Result<Json<Vec<Ticket>>, AppError> {
    let updated = state
        .engine
        .approve(&to_ticket_ids(&request.ticket_ids))
        .await?;
    Ok(Json(updated))
}

/// Assign open tickets to a helper.
pub async fn assign_tickets(
    State(state): State<AppState>,
    Json(request): Json<AssignTicketsRequest>,
) -> Result<Json<Vec<Ticket>>, AppError> {
    let updated = state
        .engine
        .assign(
            &to_ticket_ids(&request.ticket_ids),
            UserId::from_uuid(request.helper_id),
            request.helper_name,
        )
        .await?;
    Ok(Json(updated))
}

/// Resolve assigned tickets.
pub async fn resolve_tickets(
    State(state): State<AppState>,
    Json(request): Json<TicketIdsRequest>,
) -> Result<Json<Vec<Ticket>>, AppError> {
    let updated = state
        .engine
        .resolve(&to_ticket_ids(&request.ticket_ids))
        .await?;
    Ok(Json(updated))
}

/// Requeue assigned tickets to the front of the open queue.
pub async fn requeue_tickets(
    State(state): State<AppState>,
    Json(request): Json<TicketIdsRequest>,
) -> Result<Json<Vec<Ticket>>, AppError> {
    let updated = state
        .engine
        .requeue(&to_ticket_ids(&request.ticket_ids))
        .await?;
    Ok(Json(updated))
}

/// Reopen resolved tickets.
pub async fn reopen_tickets(
    State(state): State<AppState>,
    Json(request): Json<TicketIdsRequest>,
) -> Result<Json<Vec<Ticket>>, AppError> {
    let updated = state
        .engine
        .reopen(&to_ticket_ids(&request.ticket_ids))
        .await?;
    Ok(Json(updated))
}

/// Current site settings, for queue clients deciding partition routing.
pub async fn get_settings(State(state): State<AppState>) -> Json<SettingsResponse> {
    Json(SettingsResponse {
        moderation_enabled: state.queue.moderation_enabled,
        public_tickets_enabled: state.queue.public_tickets_enabled,
        cooldown_minutes: state.queue.cooldown_minutes,
    })
}
