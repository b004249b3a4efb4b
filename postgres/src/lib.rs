//! # Office Hours Postgres
//!
//! `PostgreSQL`-backed [`TicketStore`] for the office-hours queue.
//!
//! The store's one interesting obligation is the conditional batch
//! transition: the status check and the write are a single
//! `UPDATE … WHERE id = ANY($ids) AND status = $expected` inside a
//! transaction. If the row count comes back short, some ticket was missing
//! or already past the precondition — the transaction rolls back and the
//! offending ids are reported, leaving the batch untouched.

use chrono::{DateTime, Utc};
use officehours_core::types::{
    AssignmentId, LocationId, Ticket, TicketId, TicketStatus, TicketType, UserId,
};
use officehours_engine::store::{
    NewTicketRecord, StoreError, StoreFuture, TicketStore, Transition,
};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use uuid::Uuid;

/// Schema applied by [`PostgresTicketStore::ensure_schema`].
const SCHEMA: &str = include_str!("../migrations/0001_tickets.sql");

/// Columns selected whenever a full ticket row is needed.
const TICKET_COLUMNS: &str = "id, description, ticket_type, status, is_public, created_at, \
     helped_at, resolved_at, created_by, created_by_name, helped_by, helped_by_name, \
     assignment_id, assignment_name, location_id, location_name, location_description, \
     personal_queue_name";

/// `PostgreSQL` ticket store.
#[derive(Clone)]
pub struct PostgresTicketStore {
    pool: PgPool,
}

impl PostgresTicketStore {
    /// Connect to the database.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the connection cannot be
    /// established.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await
            .map_err(backend)?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Access the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the ticket schema if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if a statement fails.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(backend)?;
        }
        Ok(())
    }
}

fn backend(error: sqlx::Error) -> StoreError {
    StoreError::Backend(error.to_string())
}

fn status_str(status: TicketStatus) -> &'static str {
    match status {
        TicketStatus::Pending => "PENDING",
        TicketStatus::Open => "OPEN",
        TicketStatus::Assigned => "ASSIGNED",
        TicketStatus::Resolved => "RESOLVED",
    }
}

fn status_from(raw: &str) -> Result<TicketStatus, StoreError> {
    match raw {
        "PENDING" => Ok(TicketStatus::Pending),
        "OPEN" => Ok(TicketStatus::Open),
        "ASSIGNED" => Ok(TicketStatus::Assigned),
        "RESOLVED" => Ok(TicketStatus::Resolved),
        other => Err(StoreError::Backend(format!("unknown status '{other}'"))),
    }
}

fn type_str(ticket_type: TicketType) -> &'static str {
    match ticket_type {
        TicketType::Debugging => "DEBUGGING",
        TicketType::Conceptual => "CONCEPTUAL",
        TicketType::Checkoff => "CHECKOFF",
    }
}

fn type_from(raw: &str) -> Result<TicketType, StoreError> {
    match raw {
        "DEBUGGING" => Ok(TicketType::Debugging),
        "CONCEPTUAL" => Ok(TicketType::Conceptual),
        "CHECKOFF" => Ok(TicketType::Checkoff),
        other => Err(StoreError::Backend(format!("unknown ticket type '{other}'"))),
    }
}

fn ticket_from_row(row: &PgRow) -> Result<Ticket, StoreError> {
    let status: String = row.try_get("status").map_err(backend)?;
    let ticket_type: String = row.try_get("ticket_type").map_err(backend)?;
    let created_by: Uuid = row.try_get("created_by").map_err(backend)?;
    let helped_by: Option<Uuid> = row.try_get("helped_by").map_err(backend)?;

    Ok(Ticket {
        id: TicketId::new(row.try_get::<i64, _>("id").map_err(backend)?),
        description: row.try_get("description").map_err(backend)?,
        ticket_type: type_from(&ticket_type)?,
        status: status_from(&status)?,
        is_public: row.try_get("is_public").map_err(backend)?,
        created_at: row.try_get("created_at").map_err(backend)?,
        helped_at: row.try_get("helped_at").map_err(backend)?,
        resolved_at: row.try_get("resolved_at").map_err(backend)?,
        created_by: UserId::from_uuid(created_by),
        created_by_name: row.try_get("created_by_name").map_err(backend)?,
        helped_by: helped_by.map(UserId::from_uuid),
        helped_by_name: row.try_get("helped_by_name").map_err(backend)?,
        assignment_id: AssignmentId::new(row.try_get::<i64, _>("assignment_id").map_err(backend)?),
        assignment_name: row.try_get("assignment_name").map_err(backend)?,
        location_id: LocationId::new(row.try_get::<i64, _>("location_id").map_err(backend)?),
        location_name: row.try_get("location_name").map_err(backend)?,
        location_description: row.try_get("location_description").map_err(backend)?,
        personal_queue_name: row.try_get("personal_queue_name").map_err(backend)?,
    })
}

impl TicketStore for PostgresTicketStore {
    fn create(&self, record: NewTicketRecord) -> StoreFuture<'_, Ticket> {
        Box::pin(async move {
            let sql = format!(
                "INSERT INTO tickets (description, ticket_type, status, is_public, created_at, \
                 created_by, created_by_name, assignment_id, assignment_name, location_id, \
                 location_name, location_description, personal_queue_name) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
                 RETURNING {TICKET_COLUMNS}"
            );
            let row = sqlx::query(&sql)
                .bind(&record.description)
                .bind(type_str(record.ticket_type))
                .bind(status_str(record.status))
                .bind(record.is_public)
                .bind(record.created_at)
                .bind(record.created_by.as_uuid())
                .bind(&record.created_by_name)
                .bind(record.assignment_id.value())
                .bind(&record.assignment_name)
                .bind(record.location_id.value())
                .bind(&record.location_name)
                .bind(&record.location_description)
                .bind(&record.personal_queue_name)
                .fetch_one(&self.pool)
                .await
                .map_err(backend)?;
            ticket_from_row(&row)
        })
    }

    fn get(&self, id: TicketId) -> StoreFuture<'_, Option<Ticket>> {
        Box::pin(async move {
            let sql = format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE id = $1");
            let row = sqlx::query(&sql)
                .bind(id.value())
                .fetch_optional(&self.pool)
                .await
                .map_err(backend)?;
            row.as_ref().map(ticket_from_row).transpose()
        })
    }

    fn list_by_status(&self, status: TicketStatus) -> StoreFuture<'_, Vec<Ticket>> {
        Box::pin(async move {
            let sql = format!(
                "SELECT {TICKET_COLUMNS} FROM tickets WHERE status = $1 ORDER BY id"
            );
            let rows = sqlx::query(&sql)
                .bind(status_str(status))
                .fetch_all(&self.pool)
                .await
                .map_err(backend)?;
            rows.iter().map(ticket_from_row).collect()
        })
    }

    fn active_ticket_for(&self, creator: UserId) -> StoreFuture<'_, Option<Ticket>> {
        Box::pin(async move {
            let sql = format!(
                "SELECT {TICKET_COLUMNS} FROM tickets \
                 WHERE created_by = $1 AND status <> 'RESOLVED' \
                 ORDER BY id LIMIT 1"
            );
            let row = sqlx::query(&sql)
                .bind(creator.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(backend)?;
            row.as_ref().map(ticket_from_row).transpose()
        })
    }

    fn last_resolved_at(&self, creator: UserId) -> StoreFuture<'_, Option<DateTime<Utc>>> {
        Box::pin(async move {
            let row = sqlx::query(
                "SELECT MAX(resolved_at) AS last_resolved FROM tickets WHERE created_by = $1",
            )
            .bind(creator.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?;
            row.try_get::<Option<DateTime<Utc>>, _>("last_resolved")
                .map_err(backend)
        })
    }

    fn transition(&self, ids: &[TicketId], transition: Transition) -> StoreFuture<'_, Vec<Ticket>> {
        let mut unique: Vec<i64> = Vec::with_capacity(ids.len());
        for id in ids {
            if !unique.contains(&id.value()) {
                unique.push(id.value());
            }
        }

        Box::pin(async move {
            let expected = transition.expected();
            let mut tx = self.pool.begin().await.map_err(backend)?;

            // One conditional update covers the whole batch; the row count
            // tells us whether every target satisfied the precondition.
            let update = match &transition {
                Transition::Approve => sqlx::query(
                    "UPDATE tickets SET status = 'OPEN' \
                     WHERE id = ANY($1) AND status = 'PENDING'",
                )
                .bind(&unique),
                Transition::Assign {
                    helper,
                    helper_name,
                    at,
                } => sqlx::query(
                    "UPDATE tickets SET status = 'ASSIGNED', helped_by = $2, \
                     helped_by_name = $3, helped_at = COALESCE(helped_at, $4) \
                     WHERE id = ANY($1) AND status = 'OPEN'",
                )
                .bind(&unique)
                .bind(helper.as_uuid())
                .bind(helper_name)
                .bind(at),
                Transition::Resolve { at } => sqlx::query(
                    "UPDATE tickets SET status = 'RESOLVED', resolved_at = $2 \
                     WHERE id = ANY($1) AND status = 'ASSIGNED'",
                )
                .bind(&unique)
                .bind(at),
                Transition::Requeue => sqlx::query(
                    "UPDATE tickets SET status = 'OPEN', helped_by = NULL, \
                     helped_by_name = NULL \
                     WHERE id = ANY($1) AND status = 'ASSIGNED'",
                )
                .bind(&unique),
                Transition::Reopen => sqlx::query(
                    "UPDATE tickets SET status = 'OPEN', resolved_at = NULL \
                     WHERE id = ANY($1) AND status = 'RESOLVED'",
                )
                .bind(&unique),
            };

            let affected = update.execute(&mut *tx).await.map_err(backend)?.rows_affected();

            #[allow(clippy::cast_possible_truncation)]
            if affected as usize != unique.len() {
                tx.rollback().await.map_err(backend)?;
                return Err(self.diagnose_failure(&unique, expected).await);
            }

            let sql = format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE id = ANY($1)");
            let rows = sqlx::query(&sql)
                .bind(&unique)
                .fetch_all(&mut *tx)
                .await
                .map_err(backend)?;
            tx.commit().await.map_err(backend)?;

            let mut fetched = rows
                .iter()
                .map(ticket_from_row)
                .collect::<Result<Vec<_>, _>>()?;

            // Return in the order the ids were given.
            let mut ordered = Vec::with_capacity(unique.len());
            for id in &unique {
                if let Some(pos) = fetched.iter().position(|t| t.id.value() == *id) {
                    ordered.push(fetched.swap_remove(pos));
                }
            }
            Ok(ordered)
        })
    }
}

impl PostgresTicketStore {
    /// Work out why a conditional batch update fell short: a missing id
    /// beats a status mismatch in the report, matching the in-memory store.
    async fn diagnose_failure(&self, ids: &[i64], expected: TicketStatus) -> StoreError {
        let rows = match sqlx::query("SELECT id, status FROM tickets WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await
        {
            Ok(rows) => rows,
            Err(error) => return backend(error),
        };

        let mut found = Vec::with_capacity(rows.len());
        let mut mismatched = Vec::new();
        for row in &rows {
            let id: i64 = match row.try_get("id") {
                Ok(id) => id,
                Err(error) => return backend(error),
            };
            let status: String = match row.try_get("status") {
                Ok(status) => status,
                Err(error) => return backend(error),
            };
            found.push(id);
            if status != status_str(expected) {
                mismatched.push(TicketId::new(id));
            }
        }

        for id in ids {
            if !found.contains(id) {
                return StoreError::NotFound(TicketId::new(*id));
            }
        }

        StoreError::PreconditionFailed {
            expected,
            ids: mismatched,
        }
    }
}
