//! Lifecycle engine integration tests: creation rules, batch atomicity,
//! the legal transition edges, and event emission.

#![allow(clippy::unwrap_used, clippy::panic)]

use chrono::{Duration, TimeZone, Utc};
use officehours_core::event::LifecycleEvent;
use officehours_core::types::{
    AssignmentId, LocationId, TicketId, TicketStatus, TicketType, UserId,
};
use officehours_engine::{
    CreateOutcome, CreateRejection, CreateTicket, LifecycleEngine, LifecycleError,
    MemoryTicketStore, StaticSiteSettings, TicketStore,
};
use officehours_testing::{FixedClock, MemoryEventChannel};
use std::sync::Arc;

struct Harness {
    engine: Arc<LifecycleEngine>,
    store: Arc<MemoryTicketStore>,
    channel: Arc<MemoryEventChannel>,
    clock: Arc<FixedClock>,
}

fn harness(settings: StaticSiteSettings) -> Harness {
    let store = Arc::new(MemoryTicketStore::new());
    let channel = Arc::new(MemoryEventChannel::new());
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2024, 3, 1, 13, 0, 0).unwrap(),
    ));
    let engine = Arc::new(LifecycleEngine::new(
        store.clone(),
        channel.clone(),
        Arc::new(settings),
        clock.clone(),
    ));
    Harness {
        engine,
        store,
        channel,
        clock,
    }
}

fn request(creator: UserId, ticket_type: TicketType, is_public: bool) -> CreateTicket {
    CreateTicket {
        description: "Cache miss rate is way higher than expected".to_string(),
        ticket_type,
        is_public,
        created_by: creator,
        created_by_name: "Sam Student".to_string(),
        assignment_id: AssignmentId::new(3),
        assignment_name: "Lab 3".to_string(),
        location_id: LocationId::new(1),
        location_name: "Cory 111".to_string(),
        location_description: "station 12".to_string(),
        personal_queue_name: None,
    }
}

fn created(outcome: CreateOutcome) -> officehours_core::types::Ticket {
    match outcome {
        CreateOutcome::Created(ticket) => ticket,
        CreateOutcome::Rejected(rejection) => panic!("unexpected rejection: {rejection:?}"),
    }
}

fn global_events(channel: &MemoryEventChannel) -> Vec<LifecycleEvent> {
    channel
        .published_to("tickets")
        .iter()
        .filter_map(|message| LifecycleEvent::decode(message).unwrap())
        .collect()
}

#[tokio::test]
async fn conceptual_with_moderation_disabled_starts_open_and_public() {
    let h = harness(StaticSiteSettings {
        moderation_enabled: false,
        public_tickets_enabled: true,
        cooldown_minutes: 0,
    });

    let ticket = created(
        h.engine
            .create(request(UserId::new(), TicketType::Conceptual, true))
            .await
            .unwrap(),
    );
    assert_eq!(ticket.status, TicketStatus::Open);
    assert!(ticket.is_public);

    let events = global_events(&h.channel);
    assert!(matches!(&events[..], [LifecycleEvent::NewTicket(t)] if t.id == ticket.id));
}

#[tokio::test]
async fn debugging_is_never_public() {
    let h = harness(StaticSiteSettings {
        moderation_enabled: false,
        public_tickets_enabled: true,
        cooldown_minutes: 0,
    });

    let ticket = created(
        h.engine
            .create(request(UserId::new(), TicketType::Debugging, true))
            .await
            .unwrap(),
    );
    assert!(!ticket.is_public);
}

#[tokio::test]
async fn moderation_routes_by_ticket_type() {
    let h = harness(StaticSiteSettings {
        moderation_enabled: true,
        public_tickets_enabled: true,
        cooldown_minutes: 0,
    });

    let conceptual = created(
        h.engine
            .create(request(UserId::new(), TicketType::Conceptual, false))
            .await
            .unwrap(),
    );
    assert_eq!(conceptual.status, TicketStatus::Pending);

    // Checkoffs skip the moderation stage.
    let checkoff = created(
        h.engine
            .create(request(UserId::new(), TicketType::Checkoff, false))
            .await
            .unwrap(),
    );
    assert_eq!(checkoff.status, TicketStatus::Open);
}

#[tokio::test]
async fn second_active_ticket_is_rejected_not_errored() {
    let h = harness(StaticSiteSettings::default());
    let creator = UserId::new();

    let first = created(
        h.engine
            .create(request(creator, TicketType::Conceptual, false))
            .await
            .unwrap(),
    );

    let outcome = h
        .engine
        .create(request(creator, TicketType::Debugging, false))
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        CreateOutcome::Rejected(CreateRejection::AlreadyActive { ticket }) if ticket == first.id
    ));

    // Only the first creation was announced.
    assert_eq!(global_events(&h.channel).len(), 1);
}

#[tokio::test]
async fn cooldown_rejects_with_remaining_minutes() {
    let h = harness(StaticSiteSettings {
        moderation_enabled: false,
        public_tickets_enabled: true,
        cooldown_minutes: 10,
    });
    let creator = UserId::new();
    let helper = UserId::new();

    let ticket = created(
        h.engine
            .create(request(creator, TicketType::Conceptual, false))
            .await
            .unwrap(),
    );
    h.engine.assign(&[ticket.id], helper, "Staff").await.unwrap();
    h.engine.resolve(&[ticket.id]).await.unwrap();

    // Four minutes later: six minutes of cooldown left.
    h.clock.advance(Duration::minutes(4));
    let outcome = h
        .engine
        .create(request(creator, TicketType::Conceptual, false))
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        CreateOutcome::Rejected(CreateRejection::Cooldown { remaining_minutes: 6 })
    ));

    // Past the cooldown the creator may file again.
    h.clock.advance(Duration::minutes(7));
    let outcome = h
        .engine
        .create(request(creator, TicketType::Conceptual, false))
        .await
        .unwrap();
    assert!(matches!(outcome, CreateOutcome::Created(_)));
}

#[tokio::test]
async fn placeholder_description_is_invalid() {
    let h = harness(StaticSiteSettings::default());
    let mut req = request(UserId::new(), TicketType::Debugging, false);
    req.description = "Encountering a bug when running [this test]".to_string();

    let result = h.engine.create(req).await;
    assert!(matches!(result, Err(LifecycleError::InvalidDescription(_))));
}

#[tokio::test]
async fn only_legal_edges_are_accepted() {
    let h = harness(StaticSiteSettings::default());
    let helper = UserId::new();

    let ticket = created(
        h.engine
            .create(request(UserId::new(), TicketType::Conceptual, false))
            .await
            .unwrap(),
    );
    // Open: approve, resolve, requeue, reopen all refused.
    assert!(matches!(
        h.engine.approve(&[ticket.id]).await,
        Err(LifecycleError::InvalidTransition { expected: TicketStatus::Pending, .. })
    ));
    assert!(matches!(
        h.engine.resolve(&[ticket.id]).await,
        Err(LifecycleError::InvalidTransition { expected: TicketStatus::Assigned, .. })
    ));
    assert!(matches!(
        h.engine.requeue(&[ticket.id]).await,
        Err(LifecycleError::InvalidTransition { expected: TicketStatus::Assigned, .. })
    ));
    assert!(matches!(
        h.engine.reopen(&[ticket.id]).await,
        Err(LifecycleError::InvalidTransition { expected: TicketStatus::Resolved, .. })
    ));

    h.engine.assign(&[ticket.id], helper, "Staff").await.unwrap();
    assert!(matches!(
        h.engine.assign(&[ticket.id], helper, "Staff").await,
        Err(LifecycleError::InvalidTransition { expected: TicketStatus::Open, .. })
    ));
}

#[tokio::test]
async fn mixed_batch_applies_nothing_and_emits_nothing() {
    let h = harness(StaticSiteSettings {
        moderation_enabled: true,
        public_tickets_enabled: true,
        cooldown_minutes: 0,
    });
    let helper = UserId::new();

    // Checkoff lands in Open, conceptual in Pending.
    let open = created(
        h.engine
            .create(request(UserId::new(), TicketType::Checkoff, false))
            .await
            .unwrap(),
    );
    let pending = created(
        h.engine
            .create(request(UserId::new(), TicketType::Conceptual, false))
            .await
            .unwrap(),
    );

    let events_before = h.channel.published().len();
    let result = h.engine.assign(&[open.id, pending.id], helper, "Staff").await;
    assert!(matches!(
        result,
        Err(LifecycleError::InvalidTransition { expected: TicketStatus::Open, ref ids })
            if ids == &vec![pending.id]
    ));

    // Zero store changes for both, zero new events.
    let open_after = h.store.get(open.id).await.unwrap().unwrap();
    assert_eq!(open_after.status, TicketStatus::Open);
    assert!(open_after.helped_by.is_none());
    let pending_after = h.store.get(pending.id).await.unwrap().unwrap();
    assert_eq!(pending_after.status, TicketStatus::Pending);
    assert_eq!(h.channel.published().len(), events_before);
}

#[tokio::test]
async fn timestamps_follow_the_lifecycle() {
    let h = harness(StaticSiteSettings::default());
    let helper = UserId::new();

    let ticket = created(
        h.engine
            .create(request(UserId::new(), TicketType::Conceptual, false))
            .await
            .unwrap(),
    );

    h.clock.advance(Duration::minutes(2));
    let assigned = h.engine.assign(&[ticket.id], helper, "Staff").await.unwrap();
    let first_helped_at = assigned[0].helped_at.unwrap();
    assert_eq!(assigned[0].helped_by, Some(helper));

    // Requeue clears the helper but keeps the first help time.
    let requeued = h.engine.requeue(&[ticket.id]).await.unwrap();
    assert!(requeued[0].helped_by.is_none());
    assert_eq!(requeued[0].helped_at, Some(first_helped_at));

    // A later assignment does not rewrite helped_at.
    h.clock.advance(Duration::minutes(5));
    let other_helper = UserId::new();
    let reassigned = h
        .engine
        .assign(&[ticket.id], other_helper, "Other Staff")
        .await
        .unwrap();
    assert_eq!(reassigned[0].helped_at, Some(first_helped_at));
    assert_eq!(reassigned[0].helped_by, Some(other_helper));

    h.clock.advance(Duration::minutes(1));
    let resolved = h.engine.resolve(&[ticket.id]).await.unwrap();
    let resolved_at = resolved[0].resolved_at.unwrap();

    // A duplicate resolve fails the precondition and leaves the timestamp.
    h.clock.advance(Duration::minutes(1));
    assert!(h.engine.resolve(&[ticket.id]).await.is_err());
    let after = h.store.get(ticket.id).await.unwrap().unwrap();
    assert_eq!(after.resolved_at, Some(resolved_at));

    // Reopen clears it; a second resolution stamps a fresh time.
    let reopened = h.engine.reopen(&[ticket.id]).await.unwrap();
    assert!(reopened[0].resolved_at.is_none());
    h.engine.assign(&[ticket.id], helper, "Staff").await.unwrap();
    h.clock.advance(Duration::minutes(1));
    let resolved_again = h.engine.resolve(&[ticket.id]).await.unwrap();
    assert!(resolved_again[0].resolved_at.unwrap() > resolved_at);
}

#[tokio::test]
async fn concurrent_assigns_yield_one_winner() {
    let h = harness(StaticSiteSettings::default());

    let ticket = created(
        h.engine
            .create(request(UserId::new(), TicketType::Conceptual, false))
            .await
            .unwrap(),
    );

    let engine_a = h.engine.clone();
    let engine_b = h.engine.clone();
    let id = ticket.id;
    let task_a =
        tokio::spawn(async move { engine_a.assign(&[id], UserId::new(), "Helper A").await });
    let task_b =
        tokio::spawn(async move { engine_b.assign(&[id], UserId::new(), "Helper B").await });

    let results = [task_a.await.unwrap(), task_b.await.unwrap()];
    let successes = results.iter().filter(|r| r.is_ok()).count();
    let invalid = results
        .iter()
        .filter(|r| matches!(r, Err(LifecycleError::InvalidTransition { .. })))
        .count();
    assert_eq!(successes, 1);
    assert_eq!(invalid, 1);
}

#[tokio::test]
async fn batch_transitions_emit_list_events_and_per_ticket_signals() {
    let h = harness(StaticSiteSettings {
        moderation_enabled: true,
        public_tickets_enabled: true,
        cooldown_minutes: 0,
    });

    let a = created(
        h.engine
            .create(request(UserId::new(), TicketType::Conceptual, false))
            .await
            .unwrap(),
    );
    let b = created(
        h.engine
            .create(request(UserId::new(), TicketType::Debugging, false))
            .await
            .unwrap(),
    );

    h.engine.approve(&[a.id, b.id]).await.unwrap();

    let approved_ids: Vec<Vec<TicketId>> = global_events(&h.channel)
        .into_iter()
        .filter_map(|event| match event {
            LifecycleEvent::Approved(tickets) => {
                Some(tickets.iter().map(|t| t.id).collect())
            },
            _ => None,
        })
        .collect();
    assert_eq!(approved_ids, vec![vec![a.id, b.id]]);

    for id in [a.id, b.id] {
        let signals = h.channel.published_to(&format!("ticket-{id}"));
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].name, "ticket-approved");
        assert!(signals[0].payload.is_null());
    }
}

#[tokio::test]
async fn empty_batch_is_a_quiet_no_op() {
    let h = harness(StaticSiteSettings::default());
    let updated = h.engine.approve(&[]).await.unwrap();
    assert!(updated.is_empty());
    assert!(h.channel.published().is_empty());
}
