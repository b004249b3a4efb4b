//! Router configuration for the queue server.

use crate::api::health::{health_check, readiness_check};
use crate::api::stats;
use crate::api::tickets;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

/// Build the complete Axum router.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/tickets", post(tickets::create_ticket).get(tickets::list_tickets))
        .route("/tickets/:id", get(tickets::get_ticket))
        .route("/tickets/approve", post(tickets::approve_tickets))
        .route("/tickets/assign", post(tickets::assign_tickets))
        .route("/tickets/resolve", post(tickets::resolve_tickets))
        .route("/tickets/requeue", post(tickets::requeue_tickets))
        .route("/tickets/reopen", post(tickets::reopen_tickets))
        .route("/settings", get(tickets::get_settings))
        .route("/stats", get(stats::get_ticket_stats));

    Router::new()
        // Health checks outside the API prefix
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .nest("/api", api_routes)
        .with_state(state)
}
