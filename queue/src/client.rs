//! Queue client: wires the reconciliation reducer to a live event channel.
//!
//! The client owns a [`Store`] running [`QueueReducer`], a consumer task
//! that decodes global-topic messages into actions, and the initial bulk
//! loads. Rendering code polls [`QueueClient::snapshot`].

use crate::view::{
    PartitionSource, QueueAction, QueueEnvironment, QueueReducer, QueueSettings, QueueState,
};
use futures::StreamExt;
use officehours_core::channel::{ChannelError, EventChannel};
use officehours_core::event::{LifecycleEvent, GLOBAL_TOPIC};
use officehours_core::types::TicketStatus;
use officehours_runtime::Store;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// The store type driving the queue view.
pub type QueueStore = Store<QueueState, QueueAction, QueueEnvironment, QueueReducer>;

/// A running queue view bound to an event channel.
pub struct QueueClient {
    store: QueueStore,
    consumer: JoinHandle<()>,
}

impl QueueClient {
    /// Subscribe to the global topic and seed the visible partitions.
    ///
    /// Subscribes before the bulk loads start, so an event that lands while
    /// a fetch is in flight is never missed — at worst it is applied first
    /// and the stale fetch row is dropped by the reducer.
    ///
    /// `track_pending` controls whether the Pending partition is loaded
    /// (staff viewers with the moderation stage enabled).
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError`] if the subscription cannot be established.
    pub async fn start(
        source: Arc<dyn PartitionSource>,
        settings: Arc<dyn QueueSettings>,
        channel: Arc<dyn EventChannel>,
        track_pending: bool,
    ) -> Result<Self, ChannelError> {
        let store = Store::new(
            QueueState::new(),
            QueueReducer::new(),
            QueueEnvironment::new(source, settings),
        );

        let mut stream = channel.subscribe(&[GLOBAL_TOPIC]).await?;
        let consumer_store = store.clone();
        let consumer = tokio::spawn(async move {
            while let Some(item) = stream.next().await {
                match item {
                    Ok(message) => match LifecycleEvent::decode(&message) {
                        Ok(Some(event)) => {
                            consumer_store.send(QueueAction::Channel(event)).await;
                        },
                        // Unknown names are future event types; skip them.
                        Ok(None) => {
                            tracing::debug!(name = %message.name, "ignoring unknown event");
                        },
                        Err(error) => {
                            tracing::warn!(%error, "dropping malformed event");
                        },
                    },
                    Err(error) => {
                        tracing::warn!(%error, "event stream error");
                    },
                }
            }
            tracing::debug!("event stream ended");
        });

        store
            .send(QueueAction::LoadPartition {
                status: TicketStatus::Open,
            })
            .await;
        store
            .send(QueueAction::LoadPartition {
                status: TicketStatus::Assigned,
            })
            .await;
        if track_pending {
            store
                .send(QueueAction::LoadPartition {
                    status: TicketStatus::Pending,
                })
                .await;
        }

        Ok(Self { store, consumer })
    }

    /// A copy of the current view state.
    pub async fn snapshot(&self) -> QueueState {
        self.store.state(Clone::clone).await
    }

    /// The underlying store, for tests that need to settle effects.
    #[must_use]
    pub const fn store(&self) -> &QueueStore {
        &self.store
    }

    /// Stop the consumer task.
    pub fn shutdown(self) {
        self.consumer.abort();
    }
}
