//! In-memory ticket store.
//!
//! Backs tests and single-process deployments. The whole map sits behind
//! one mutex; a batch transition validates every target and applies the
//! changes inside a single critical section, which gives the conditional
//! update contract directly.

use crate::store::{NewTicketRecord, StoreError, StoreFuture, TicketStore, Transition};
use chrono::{DateTime, Utc};
use officehours_core::types::{Ticket, TicketId, TicketStatus, UserId};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

/// Mutex-guarded ticket map with a monotonically increasing id sequence.
#[derive(Debug, Default)]
pub struct MemoryTicketStore {
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    tickets: BTreeMap<i64, Ticket>,
    next_id: i64,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            tickets: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl MemoryTicketStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A poisoned lock only means another thread panicked mid-operation;
        // the map itself is still structurally valid.
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl TicketStore for MemoryTicketStore {
    fn create(&self, record: NewTicketRecord) -> StoreFuture<'_, Ticket> {
        Box::pin(async move {
            let mut inner = self.lock();
            let id = TicketId::new(inner.next_id);
            inner.next_id += 1;

            let ticket = Ticket {
                id,
                description: record.description,
                ticket_type: record.ticket_type,
                status: record.status,
                is_public: record.is_public,
                created_at: record.created_at,
                helped_at: None,
                resolved_at: None,
                created_by: record.created_by,
                created_by_name: record.created_by_name,
                helped_by: None,
                helped_by_name: None,
                assignment_id: record.assignment_id,
                assignment_name: record.assignment_name,
                location_id: record.location_id,
                location_name: record.location_name,
                location_description: record.location_description,
                personal_queue_name: record.personal_queue_name,
            };
            inner.tickets.insert(id.value(), ticket.clone());
            Ok(ticket)
        })
    }

    fn get(&self, id: TicketId) -> StoreFuture<'_, Option<Ticket>> {
        Box::pin(async move { Ok(self.lock().tickets.get(&id.value()).cloned()) })
    }

    fn list_by_status(&self, status: TicketStatus) -> StoreFuture<'_, Vec<Ticket>> {
        Box::pin(async move {
            // BTreeMap iteration is id order, which is creation order here.
            Ok(self
                .lock()
                .tickets
                .values()
                .filter(|ticket| ticket.status == status)
                .cloned()
                .collect())
        })
    }

    fn active_ticket_for(&self, creator: UserId) -> StoreFuture<'_, Option<Ticket>> {
        Box::pin(async move {
            Ok(self
                .lock()
                .tickets
                .values()
                .find(|ticket| ticket.created_by == creator && ticket.is_active())
                .cloned())
        })
    }

    fn last_resolved_at(&self, creator: UserId) -> StoreFuture<'_, Option<DateTime<Utc>>> {
        Box::pin(async move {
            Ok(self
                .lock()
                .tickets
                .values()
                .filter(|ticket| ticket.created_by == creator)
                .filter_map(|ticket| ticket.resolved_at)
                .max())
        })
    }

    fn transition(&self, ids: &[TicketId], transition: Transition) -> StoreFuture<'_, Vec<Ticket>> {
        let mut unique: Vec<TicketId> = Vec::with_capacity(ids.len());
        for id in ids {
            if !unique.contains(id) {
                unique.push(*id);
            }
        }

        Box::pin(async move {
            let mut inner = self.lock();
            let expected = transition.expected();

            // Validate the whole batch before touching anything.
            let mut mismatched = Vec::new();
            for id in &unique {
                match inner.tickets.get(&id.value()) {
                    None => return Err(StoreError::NotFound(*id)),
                    Some(ticket) if ticket.status != expected => mismatched.push(*id),
                    Some(_) => {},
                }
            }
            if !mismatched.is_empty() {
                return Err(StoreError::PreconditionFailed {
                    expected,
                    ids: mismatched,
                });
            }

            let mut updated = Vec::with_capacity(unique.len());
            for id in &unique {
                if let Some(ticket) = inner.tickets.get_mut(&id.value()) {
                    transition.apply(ticket);
                    updated.push(ticket.clone());
                }
            }
            Ok(updated)
        })
    }
}
