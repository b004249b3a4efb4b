//! Single-ticket detail watcher.
//!
//! Per-ticket topics carry payload-less [`TicketSignal`]s: each one is a
//! hint that the ticket's detail changed and should be re-fetched, not a
//! patch to apply. The watcher holds the latest fetched snapshot and
//! refreshes it whenever a signal arrives.

use crate::view::SourceError;
use futures::StreamExt;
use officehours_core::channel::{ChannelError, EventChannel};
use officehours_core::event::{ticket_topic, TicketSignal};
use officehours_core::types::{Ticket, TicketId};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// Fetches one ticket's full detail — in production, `GET /api/tickets/:id`.
pub trait TicketDetailSource: Send + Sync {
    /// Fetch the current detail for a ticket.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Fetch`] when the query fails.
    fn fetch(
        &self,
        id: TicketId,
    ) -> Pin<Box<dyn Future<Output = Result<Ticket, SourceError>> + Send + '_>>;
}

/// Watches one ticket's signal topic and keeps its latest detail.
pub struct TicketWatcher {
    latest: Arc<RwLock<Option<Ticket>>>,
    task: JoinHandle<()>,
}

impl TicketWatcher {
    /// Subscribe to the ticket's topic and fetch the initial detail.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError`] if the subscription cannot be established.
    pub async fn start(
        id: TicketId,
        source: Arc<dyn TicketDetailSource>,
        channel: Arc<dyn EventChannel>,
    ) -> Result<Self, ChannelError> {
        let topic = ticket_topic(id);
        let mut stream = channel.subscribe(&[topic.as_str()]).await?;

        let latest = Arc::new(RwLock::new(None));
        let shared = Arc::clone(&latest);

        // Initial fetch; signals only tell us something changed.
        match source.fetch(id).await {
            Ok(ticket) => *shared.write().await = Some(ticket),
            Err(error) => tracing::warn!(%id, %error, "initial detail fetch failed"),
        }

        let task = tokio::spawn(async move {
            while let Some(item) = stream.next().await {
                match item {
                    Ok(message) => {
                        if TicketSignal::decode(&message).is_none() {
                            tracing::debug!(name = %message.name, "ignoring unknown signal");
                            continue;
                        }
                        match source.fetch(id).await {
                            Ok(ticket) => *shared.write().await = Some(ticket),
                            Err(error) => {
                                tracing::warn!(%id, %error, "detail re-fetch failed");
                            },
                        }
                    },
                    Err(error) => tracing::warn!(%error, "signal stream error"),
                }
            }
        });

        Ok(Self { latest, task })
    }

    /// The most recently fetched detail, if any fetch has succeeded.
    pub async fn latest(&self) -> Option<Ticket> {
        self.latest.read().await.clone()
    }

    /// Stop watching.
    pub fn shutdown(self) {
        self.task.abort();
    }
}
