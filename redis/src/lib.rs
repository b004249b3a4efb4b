//! # Office Hours Redis Channel
//!
//! Redis pub/sub implementation of the [`EventChannel`] trait.
//!
//! Redis pub/sub matches the contract the queue was designed against: a
//! hosted fan-out with at-least-once semantics toward connected
//! subscribers, ordering within a channel, and none across channels.
//! Messages are the JSON encoding of [`ChannelMessage`].
//!
//! Publishing goes through a multiplexed [`ConnectionManager`] (shared,
//! auto-reconnecting); each subscription takes its own pub/sub connection,
//! which is how the redis protocol requires it.
//!
//! # Example
//!
//! ```no_run
//! use officehours_redis::RedisEventChannel;
//! use officehours_core::channel::EventChannel;
//! use officehours_core::event::ChannelMessage;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let channel = RedisEventChannel::connect("redis://localhost:6379").await?;
//! let message = ChannelMessage::new("new-ticket", serde_json::json!({}));
//! channel.publish("tickets", &message).await?;
//! # Ok(())
//! # }
//! ```

use futures::StreamExt;
use officehours_core::channel::{ChannelError, EventChannel, MessageStream};
use officehours_core::event::ChannelMessage;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::future::Future;
use std::pin::Pin;

/// Redis pub/sub event channel.
#[derive(Clone)]
pub struct RedisEventChannel {
    client: redis::Client,
    publisher: ConnectionManager,
}

impl RedisEventChannel {
    /// Connect to a Redis server.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::ConnectionFailed`] if the URL is invalid or
    /// the server is unreachable.
    pub async fn connect(url: &str) -> Result<Self, ChannelError> {
        let client = redis::Client::open(url)
            .map_err(|e| ChannelError::ConnectionFailed(e.to_string()))?;
        let publisher = ConnectionManager::new(client.clone())
            .await
            .map_err(|e| ChannelError::ConnectionFailed(e.to_string()))?;
        Ok(Self { client, publisher })
    }
}

impl EventChannel for RedisEventChannel {
    fn publish(
        &self,
        topic: &str,
        message: &ChannelMessage,
    ) -> Pin<Box<dyn Future<Output = Result<(), ChannelError>> + Send + '_>> {
        let topic = topic.to_string();
        let encoded = serde_json::to_string(message);
        let mut connection = self.publisher.clone();

        Box::pin(async move {
            let payload = encoded.map_err(|e| ChannelError::PublishFailed {
                topic: topic.clone(),
                reason: format!("encoding failed: {e}"),
            })?;
            connection
                .publish::<_, _, ()>(&topic, payload)
                .await
                .map_err(|e| ChannelError::PublishFailed {
                    topic: topic.clone(),
                    reason: e.to_string(),
                })
        })
    }

    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<MessageStream, ChannelError>> + Send + '_>> {
        let topics: Vec<String> = topics.iter().map(|t| (*t).to_string()).collect();
        let client = self.client.clone();

        Box::pin(async move {
            let subscription_error = |reason: String| ChannelError::SubscriptionFailed {
                topics: topics.clone(),
                reason,
            };

            let mut pubsub = client
                .get_async_pubsub()
                .await
                .map_err(|e| subscription_error(e.to_string()))?;
            for topic in &topics {
                pubsub
                    .subscribe(topic)
                    .await
                    .map_err(|e| subscription_error(e.to_string()))?;
            }

            let stream = pubsub.into_on_message().map(|message| {
                let payload: String = message
                    .get_payload()
                    .map_err(|e| ChannelError::DeserializationFailed(e.to_string()))?;
                serde_json::from_str::<ChannelMessage>(&payload)
                    .map_err(|e| ChannelError::DeserializationFailed(e.to_string()))
            });

            Ok(Box::pin(stream) as MessageStream)
        })
    }
}
