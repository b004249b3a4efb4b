//! Event channel abstraction for push updates.
//!
//! The queue relays lifecycle changes through a named-topic publish/subscribe
//! transport. The transport itself is an external collaborator; this module
//! only fixes the contract implementations must satisfy:
//!
//! - **At-least-once delivery**: a message may arrive more than once, so
//!   consumers must be idempotent.
//! - **Per-topic ordering**: messages on one topic arrive in publish order.
//! - **No cross-topic ordering**: nothing relates the global `tickets` topic
//!   to the per-ticket topics; consumers must converge regardless of
//!   interleaving.
//!
//! # Implementations
//!
//! - `officehours-testing`'s `MemoryEventChannel` — in-process broadcast for
//!   tests and local runs.
//! - `officehours-redis`'s `RedisEventChannel` — Redis pub/sub for
//!   deployments.

use crate::event::ChannelMessage;
use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during event channel operations.
#[derive(Error, Debug, Clone)]
pub enum ChannelError {
    /// Failed to connect to the channel backend.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Failed to publish a message to a topic.
    #[error("publish failed for topic '{topic}': {reason}")]
    PublishFailed {
        /// The topic that failed.
        topic: String,
        /// The reason for failure.
        reason: String,
    },

    /// Failed to subscribe to topics.
    #[error("subscription failed for topics {topics:?}: {reason}")]
    SubscriptionFailed {
        /// The topics that failed to subscribe.
        topics: Vec<String>,
        /// The reason for failure.
        reason: String,
    },

    /// A received message could not be deserialized.
    #[error("deserialization failed: {0}")]
    DeserializationFailed(String),

    /// Network or transport error.
    #[error("transport error: {0}")]
    TransportError(String),
}

/// Stream of messages from a subscription.
///
/// Each item is a `Result` so transport hiccups surface in-band without
/// tearing down the stream.
pub type MessageStream = Pin<Box<dyn Stream<Item = Result<ChannelMessage, ChannelError>> + Send>>;

/// Trait for event channel implementations.
///
/// Uses explicit `Pin<Box<dyn Future>>` returns instead of `async fn` so the
/// channel can be held as a trait object (`Arc<dyn EventChannel>`) and
/// captured inside effects.
pub trait EventChannel: Send + Sync {
    /// Publish a message to a topic.
    ///
    /// Delivery is at-least-once; subscribers may see the message more than
    /// once and must deduplicate.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::PublishFailed`] if the publish operation
    /// fails.
    fn publish(
        &self,
        topic: &str,
        message: &ChannelMessage,
    ) -> Pin<Box<dyn Future<Output = Result<(), ChannelError>> + Send + '_>>;

    /// Subscribe to one or more topics and receive a merged message stream.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::SubscriptionFailed`] if subscription fails.
    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<MessageStream, ChannelError>> + Send + '_>>;
}
