//! The queue reconciliation view.
//!
//! Presents three always-current partitions (Pending / Open / Assigned)
//! without re-querying the server on every event. Each partition is seeded
//! by one bulk fetch and then maintained incrementally from the global
//! lifecycle event stream.
//!
//! All of it is a single reducer over [`QueueAction`], so the partitions can
//! never drift apart: every event moves a ticket between partitions in one
//! state update.
//!
//! # Ordering and duplicates
//!
//! The event channel delivers at-least-once and guarantees nothing across
//! topics, so the reducer is built to converge rather than to trust arrival
//! order:
//!
//! - Insertion deduplicates by id against every partition; applying the
//!   same event twice is a no-op.
//! - Removal by id is a no-op for absent ids.
//! - Resolved ids are remembered so a stale event cannot resurrect a
//!   finished ticket.
//! - A newly created ticket is parked in a **holding area** until a fresh
//!   read of the moderation setting decides whether it belongs in Pending
//!   or Open; if some other event places the ticket first, the held copy is
//!   simply dropped.

use officehours_core::event::LifecycleEvent;
use officehours_core::reducer::{Effect, Effects, Reducer};
use officehours_core::smallvec;
use officehours_core::types::{Ticket, TicketId, TicketStatus};
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by a partition source.
#[derive(Error, Debug, Clone)]
pub enum SourceError {
    /// The bulk fetch failed.
    #[error("partition fetch failed: {0}")]
    Fetch(String),
}

/// Bulk access to tickets by status — in production, the HTTP API's
/// "tickets with status" query.
pub trait PartitionSource: Send + Sync {
    /// Fetch every ticket currently in `status`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Fetch`] when the query fails.
    fn fetch(
        &self,
        status: TicketStatus,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Ticket>, SourceError>> + Send + '_>>;
}

/// Read access to the one setting the view routes on.
///
/// The value is read asynchronously *at insert time*, never captured at
/// subscription time, so a toggle mid-flight is honored.
pub trait QueueSettings: Send + Sync {
    /// Whether this viewer sees the moderation (Pending) stage.
    fn moderation_visible(&self) -> Pin<Box<dyn Future<Output = bool> + Send + '_>>;
}

/// Dependencies injected into the queue reducer.
#[derive(Clone)]
pub struct QueueEnvironment {
    /// Bulk partition fetches.
    pub source: Arc<dyn PartitionSource>,
    /// Moderation-stage visibility for this viewer.
    pub settings: Arc<dyn QueueSettings>,
}

impl QueueEnvironment {
    /// Creates a new `QueueEnvironment`.
    #[must_use]
    pub fn new(source: Arc<dyn PartitionSource>, settings: Arc<dyn QueueSettings>) -> Self {
        Self { source, settings }
    }
}

/// Load progress of one partition, tracked independently so the UI can
/// render partial results while other fetches are still in flight.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum LoadState {
    /// No fetch started yet.
    #[default]
    NotLoaded,
    /// Bulk fetch in flight.
    Loading,
    /// Seeded; now maintained from events.
    Loaded,
    /// Bulk fetch failed.
    Failed(String),
}

/// One displayed partition: an ordered ticket list plus its load state.
#[derive(Clone, Debug, Default)]
pub struct Partition {
    /// Tickets in display order.
    pub tickets: Vec<Ticket>,
    /// Bulk-load progress.
    pub load: LoadState,
}

impl Partition {
    /// Whether a ticket id is present.
    #[must_use]
    pub fn contains(&self, id: TicketId) -> bool {
        self.tickets.iter().any(|ticket| ticket.id == id)
    }

    fn remove_ids(&mut self, ids: &HashSet<TicketId>) {
        self.tickets.retain(|ticket| !ids.contains(&ticket.id));
    }
}

/// The reconciliation view's whole state.
#[derive(Clone, Debug, Default)]
pub struct QueueState {
    /// Tickets awaiting moderation.
    pub pending: Partition,
    /// Tickets waiting for help.
    pub open: Partition,
    /// Tickets currently being helped.
    pub assigned: Partition,
    /// Newly created tickets whose destination partition is not decided yet.
    pub holding: Vec<Ticket>,
    /// Ids known to have resolved; kept so stale events cannot re-insert.
    pub resolved: HashSet<TicketId>,
}

impl QueueState {
    /// Creates an empty view.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The partition displaying a status, if that status is displayed.
    #[must_use]
    pub const fn partition(&self, status: TicketStatus) -> Option<&Partition> {
        match status {
            TicketStatus::Pending => Some(&self.pending),
            TicketStatus::Open => Some(&self.open),
            TicketStatus::Assigned => Some(&self.assigned),
            TicketStatus::Resolved => None,
        }
    }

    const fn partition_mut(&mut self, status: TicketStatus) -> Option<&mut Partition> {
        match status {
            TicketStatus::Pending => Some(&mut self.pending),
            TicketStatus::Open => Some(&mut self.open),
            TicketStatus::Assigned => Some(&mut self.assigned),
            TicketStatus::Resolved => None,
        }
    }

    /// Whether the id already has a settled place: a partition membership
    /// or a remembered resolution.
    #[must_use]
    pub fn is_placed(&self, id: TicketId) -> bool {
        self.resolved.contains(&id)
            || self.pending.contains(id)
            || self.open.contains(id)
            || self.assigned.contains(id)
    }

    fn drop_held(&mut self, ids: &HashSet<TicketId>) {
        self.holding.retain(|ticket| !ids.contains(&ticket.id));
    }
}

/// Inputs to the queue reducer.
#[derive(Debug)]
pub enum QueueAction {
    /// Start the bulk fetch for one partition.
    LoadPartition {
        /// Which partition to load.
        status: TicketStatus,
    },
    /// A bulk fetch completed.
    PartitionLoaded {
        /// Which partition was fetched.
        status: TicketStatus,
        /// The tickets currently in that status, oldest first.
        tickets: Vec<Ticket>,
    },
    /// A bulk fetch failed.
    PartitionLoadFailed {
        /// Which partition failed.
        status: TicketStatus,
        /// Failure description for display.
        error: String,
    },
    /// An event arrived on the global topic.
    Channel(LifecycleEvent),
    /// Flush the holding area using a freshly read moderation setting.
    RouteHeld {
        /// Whether this viewer currently sees the Pending stage.
        moderation_visible: bool,
    },
}

/// Reducer maintaining the queue partitions.
#[derive(Clone, Copy, Debug, Default)]
pub struct QueueReducer;

impl QueueReducer {
    /// Creates a new `QueueReducer`.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn handle_event(state: &mut QueueState, event: LifecycleEvent) {
        let ids: HashSet<TicketId> = event.tickets().iter().map(|ticket| ticket.id).collect();
        // Whatever the event says about these tickets supersedes any copy
        // still waiting in the holding area.
        state.drop_held(&ids);

        match event {
            // Handled by the caller (needs an effect); never reaches here.
            LifecycleEvent::NewTicket(_) => {},
            LifecycleEvent::Approved(tickets) => {
                state.pending.remove_ids(&ids);
                for ticket in tickets {
                    if !state.is_placed(ticket.id) {
                        state.open.tickets.push(ticket);
                    }
                }
            },
            LifecycleEvent::Assigned(tickets) => {
                state.open.remove_ids(&ids);
                for ticket in tickets {
                    if !state.is_placed(ticket.id) {
                        state.assigned.tickets.push(ticket);
                    }
                }
            },
            LifecycleEvent::Resolved(_) => {
                // Terminal for the view: gone from every partition, and
                // remembered so no stale event can bring the id back.
                state.pending.remove_ids(&ids);
                state.open.remove_ids(&ids);
                state.assigned.remove_ids(&ids);
                state.resolved.extend(ids);
            },
            LifecycleEvent::Requeued(tickets) => {
                state.assigned.remove_ids(&ids);
                // Requeued tickets take priority: prepend, preserving the
                // batch's own order.
                let mut front = Vec::with_capacity(tickets.len());
                for ticket in tickets {
                    let duplicate = front.iter().any(|t: &Ticket| t.id == ticket.id);
                    if !duplicate && !state.is_placed(ticket.id) {
                        front.push(ticket);
                    }
                }
                front.append(&mut state.open.tickets);
                state.open.tickets = front;
            },
            LifecycleEvent::Reopened(tickets) => {
                for id in &ids {
                    state.resolved.remove(id);
                }
                for ticket in tickets {
                    if !state.is_placed(ticket.id) {
                        state.open.tickets.push(ticket);
                    }
                }
            },
        }
    }
}

impl Reducer for QueueReducer {
    type State = QueueState;
    type Action = QueueAction;
    type Environment = QueueEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Effects<Self::Action> {
        match action {
            QueueAction::LoadPartition { status } => {
                let Some(partition) = state.partition_mut(status) else {
                    return smallvec![];
                };
                partition.load = LoadState::Loading;

                let source = Arc::clone(&env.source);
                smallvec![Effect::Future(Box::pin(async move {
                    let action = match source.fetch(status).await {
                        Ok(tickets) => QueueAction::PartitionLoaded { status, tickets },
                        Err(error) => QueueAction::PartitionLoadFailed {
                            status,
                            error: error.to_string(),
                        },
                    };
                    Some(action)
                }))]
            },

            QueueAction::PartitionLoaded { status, tickets } => {
                // Events that arrived while the fetch was in flight already
                // placed some of these ids; those placements win.
                let fresh: Vec<Ticket> = tickets
                    .into_iter()
                    .filter(|ticket| !state.is_placed(ticket.id))
                    .collect();
                if let Some(partition) = state.partition_mut(status) {
                    partition.tickets.extend(fresh);
                    partition.load = LoadState::Loaded;
                }
                smallvec![]
            },

            QueueAction::PartitionLoadFailed { status, error } => {
                tracing::warn!(status = %status, %error, "partition load failed");
                if let Some(partition) = state.partition_mut(status) {
                    partition.load = LoadState::Failed(error);
                }
                smallvec![]
            },

            QueueAction::Channel(LifecycleEvent::NewTicket(ticket)) => {
                let already_held = state.holding.iter().any(|held| held.id == ticket.id);
                if already_held || state.is_placed(ticket.id) {
                    return smallvec![];
                }
                state.holding.push(ticket);

                // Whether moderation applies may not be known synchronously;
                // read it now and route when the answer comes back.
                let settings = Arc::clone(&env.settings);
                smallvec![Effect::Future(Box::pin(async move {
                    let moderation_visible = settings.moderation_visible().await;
                    Some(QueueAction::RouteHeld { moderation_visible })
                }))]
            },

            QueueAction::Channel(event) => {
                Self::handle_event(state, event);
                smallvec![]
            },

            QueueAction::RouteHeld { moderation_visible } => {
                let held = std::mem::take(&mut state.holding);
                for ticket in held {
                    if state.is_placed(ticket.id) {
                        // Some event routed it first; the held copy is stale.
                        continue;
                    }
                    if moderation_visible {
                        state.pending.tickets.push(ticket);
                    } else {
                        state.open.tickets.push(ticket);
                    }
                }
                smallvec![]
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use officehours_core::types::{AssignmentId, LocationId, TicketType, UserId};
    use officehours_testing::{assertions, ReducerTest};

    fn ticket(id: i64, status: TicketStatus) -> Ticket {
        Ticket {
            id: TicketId::new(id),
            description: "Confused about pipelining hazards".to_string(),
            ticket_type: TicketType::Conceptual,
            status,
            is_public: true,
            created_at: chrono::Utc::now(),
            helped_at: None,
            resolved_at: None,
            created_by: UserId::new(),
            created_by_name: "Sam Student".to_string(),
            helped_by: None,
            helped_by_name: None,
            assignment_id: AssignmentId::new(2),
            assignment_name: "Lab 2".to_string(),
            location_id: LocationId::new(1),
            location_name: "Cory 111".to_string(),
            location_description: "station 9".to_string(),
            personal_queue_name: None,
        }
    }

    struct EmptySource;

    impl PartitionSource for EmptySource {
        fn fetch(
            &self,
            _status: TicketStatus,
        ) -> Pin<Box<dyn Future<Output = Result<Vec<Ticket>, SourceError>> + Send + '_>> {
            Box::pin(async { Ok(Vec::new()) })
        }
    }

    struct NoModeration;

    impl QueueSettings for NoModeration {
        fn moderation_visible(&self) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
            Box::pin(async { false })
        }
    }

    fn env() -> QueueEnvironment {
        QueueEnvironment::new(Arc::new(EmptySource), Arc::new(NoModeration))
    }

    fn apply(state: &mut QueueState, action: QueueAction) {
        let _ = QueueReducer::new().reduce(state, action, &env());
    }

    fn ids(partition: &Partition) -> Vec<i64> {
        partition.tickets.iter().map(|t| t.id.value()).collect()
    }

    #[test]
    fn new_ticket_goes_to_holding_with_a_settings_read() {
        ReducerTest::new(QueueReducer::new())
            .with_env(env())
            .given_state(QueueState::new())
            .when_action(QueueAction::Channel(LifecycleEvent::NewTicket(ticket(
                1,
                TicketStatus::Open,
            ))))
            .then_state(|state| {
                assert_eq!(state.holding.len(), 1);
                assert!(state.open.tickets.is_empty());
                assert!(state.pending.tickets.is_empty());
            })
            .then_effects(assertions::assert_has_future_effect)
            .run();
    }

    #[test]
    fn route_held_respects_fresh_moderation_value() {
        let mut state = QueueState::new();
        apply(
            &mut state,
            QueueAction::Channel(LifecycleEvent::NewTicket(ticket(1, TicketStatus::Pending))),
        );
        apply(&mut state, QueueAction::RouteHeld { moderation_visible: true });
        assert_eq!(ids(&state.pending), vec![1]);
        assert!(state.holding.is_empty());

        let mut state = QueueState::new();
        apply(
            &mut state,
            QueueAction::Channel(LifecycleEvent::NewTicket(ticket(2, TicketStatus::Open))),
        );
        apply(&mut state, QueueAction::RouteHeld { moderation_visible: false });
        assert_eq!(ids(&state.open), vec![2]);
    }

    #[test]
    fn approved_moves_pending_to_open() {
        let mut state = QueueState::new();
        state.pending.tickets = vec![ticket(1, TicketStatus::Pending), ticket(2, TicketStatus::Pending)];
        apply(
            &mut state,
            QueueAction::Channel(LifecycleEvent::Approved(vec![ticket(1, TicketStatus::Open)])),
        );
        assert_eq!(ids(&state.pending), vec![2]);
        assert_eq!(ids(&state.open), vec![1]);
    }

    #[test]
    fn duplicate_assigned_event_is_idempotent() {
        let mut state = QueueState::new();
        state.open.tickets = vec![ticket(1, TicketStatus::Open)];
        let event = || {
            QueueAction::Channel(LifecycleEvent::Assigned(vec![ticket(
                1,
                TicketStatus::Assigned,
            )]))
        };
        apply(&mut state, event());
        apply(&mut state, event());
        assert!(state.open.tickets.is_empty());
        assert_eq!(ids(&state.assigned), vec![1]);
    }

    #[test]
    fn assigned_before_new_ticket_converges() {
        let mut state = QueueState::new();
        // Status event first: the ticket was never seen, but the payload
        // carries everything needed.
        apply(
            &mut state,
            QueueAction::Channel(LifecycleEvent::Assigned(vec![ticket(
                5,
                TicketStatus::Assigned,
            )])),
        );
        assert_eq!(ids(&state.assigned), vec![5]);

        // The late creation event must not duplicate the ticket.
        apply(
            &mut state,
            QueueAction::Channel(LifecycleEvent::NewTicket(ticket(5, TicketStatus::Open))),
        );
        apply(&mut state, QueueAction::RouteHeld { moderation_visible: false });
        assert_eq!(ids(&state.assigned), vec![5]);
        assert!(state.open.tickets.is_empty());
        assert!(state.pending.tickets.is_empty());
        assert!(state.holding.is_empty());
    }

    #[test]
    fn requeue_prepends_in_batch_order() {
        let mut state = QueueState::new();
        state.open.tickets = vec![ticket(3, TicketStatus::Open)];
        state.assigned.tickets = vec![
            ticket(1, TicketStatus::Assigned),
            ticket(2, TicketStatus::Assigned),
        ];
        apply(
            &mut state,
            QueueAction::Channel(LifecycleEvent::Requeued(vec![
                ticket(1, TicketStatus::Open),
                ticket(2, TicketStatus::Open),
            ])),
        );
        assert_eq!(ids(&state.open), vec![1, 2, 3]);
        assert!(state.assigned.tickets.is_empty());
    }

    #[test]
    fn resolved_leaves_every_partition_and_blocks_resurrection() {
        let mut state = QueueState::new();
        state.assigned.tickets = vec![ticket(1, TicketStatus::Assigned)];
        apply(
            &mut state,
            QueueAction::Channel(LifecycleEvent::Resolved(vec![ticket(
                1,
                TicketStatus::Resolved,
            )])),
        );
        assert!(state.assigned.tickets.is_empty());
        assert!(state.open.tickets.is_empty());
        assert!(state.pending.tickets.is_empty());

        // A stale duplicate of the creation event must not bring it back.
        apply(
            &mut state,
            QueueAction::Channel(LifecycleEvent::NewTicket(ticket(1, TicketStatus::Open))),
        );
        apply(&mut state, QueueAction::RouteHeld { moderation_visible: false });
        assert!(state.open.tickets.is_empty());
    }

    #[test]
    fn reopened_returns_to_open() {
        let mut state = QueueState::new();
        state.resolved.insert(TicketId::new(1));
        apply(
            &mut state,
            QueueAction::Channel(LifecycleEvent::Reopened(vec![ticket(1, TicketStatus::Open)])),
        );
        assert_eq!(ids(&state.open), vec![1]);
        assert!(!state.resolved.contains(&TicketId::new(1)));
    }

    #[test]
    fn bulk_load_defers_to_already_applied_events() {
        let mut state = QueueState::new();
        apply(&mut state, QueueAction::LoadPartition { status: TicketStatus::Open });
        assert_eq!(state.open.load, LoadState::Loading);

        // While the fetch was in flight, an event assigned ticket 1.
        apply(
            &mut state,
            QueueAction::Channel(LifecycleEvent::Assigned(vec![ticket(
                1,
                TicketStatus::Assigned,
            )])),
        );

        // The stale fetch result still lists it as open.
        apply(
            &mut state,
            QueueAction::PartitionLoaded {
                status: TicketStatus::Open,
                tickets: vec![ticket(1, TicketStatus::Open), ticket(2, TicketStatus::Open)],
            },
        );
        assert_eq!(state.open.load, LoadState::Loaded);
        assert_eq!(ids(&state.open), vec![2]);
        assert_eq!(ids(&state.assigned), vec![1]);
    }

    #[test]
    fn load_failure_is_recorded_per_partition() {
        let mut state = QueueState::new();
        apply(
            &mut state,
            QueueAction::PartitionLoadFailed {
                status: TicketStatus::Assigned,
                error: "connection refused".to_string(),
            },
        );
        assert_eq!(
            state.assigned.load,
            LoadState::Failed("connection refused".to_string())
        );
        assert_eq!(state.open.load, LoadState::NotLoaded);
    }
}
