//! In-memory event channel for tests and single-process runs.
//!
//! Built on a tokio broadcast channel. Matches the delivery contract real
//! backends provide: at-least-once per subscriber, ordered within a topic,
//! nothing guaranteed across topics. A slow subscriber that lags simply
//! misses messages (broadcast semantics), which consumers must already
//! tolerate.

use futures::stream;
use officehours_core::channel::{ChannelError, EventChannel, MessageStream};
use officehours_core::event::ChannelMessage;
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use tokio::sync::broadcast;

/// Default broadcast buffer: large enough that tests never lag.
const DEFAULT_CAPACITY: usize = 256;

/// In-process broadcast event channel.
///
/// Also records everything published, so tests can assert on emissions
/// without subscribing.
pub struct MemoryEventChannel {
    sender: broadcast::Sender<(String, ChannelMessage)>,
    published: Mutex<Vec<(String, ChannelMessage)>>,
}

impl Default for MemoryEventChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEventChannel {
    /// Create a channel with the default buffer capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a channel with a specific buffer capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            published: Mutex::new(Vec::new()),
        }
    }

    /// Everything published so far, in publish order.
    #[must_use]
    pub fn published(&self) -> Vec<(String, ChannelMessage)> {
        self.published
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Messages published to one topic, in publish order.
    #[must_use]
    pub fn published_to(&self, topic: &str) -> Vec<ChannelMessage> {
        self.published()
            .into_iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, message)| message)
            .collect()
    }
}

impl EventChannel for MemoryEventChannel {
    fn publish(
        &self,
        topic: &str,
        message: &ChannelMessage,
    ) -> Pin<Box<dyn Future<Output = Result<(), ChannelError>> + Send + '_>> {
        let entry = (topic.to_string(), message.clone());
        Box::pin(async move {
            self.published
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push(entry.clone());
            // A send error only means there are no subscribers right now.
            let _ = self.sender.send(entry);
            Ok(())
        })
    }

    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<MessageStream, ChannelError>> + Send + '_>> {
        let wanted: HashSet<String> = topics.iter().map(|t| (*t).to_string()).collect();
        let receiver = self.sender.subscribe();
        Box::pin(async move {
            let stream = stream::unfold((receiver, wanted), |(mut receiver, wanted)| async move {
                loop {
                    match receiver.recv().await {
                        Ok((topic, message)) if wanted.contains(&topic) => {
                            return Some((Ok(message), (receiver, wanted)));
                        },
                        // Not a topic we asked for.
                        Ok(_) => {},
                        // Lagged: messages were dropped; keep reading.
                        Err(broadcast::error::RecvError::Lagged(_)) => {},
                        Err(broadcast::error::RecvError::Closed) => return None,
                    }
                }
            });
            Ok(Box::pin(stream) as MessageStream)
        })
    }
}
