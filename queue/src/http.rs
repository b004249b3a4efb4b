//! HTTP-backed implementations of the queue view's environment traits.
//!
//! Production queue clients talk to the ticket API: bulk partition loads go
//! through `GET /api/tickets?status=…`, and the moderation setting is read
//! from `GET /api/settings` at routing time.

use crate::detail::TicketDetailSource;
use crate::view::{PartitionSource, QueueSettings, SourceError};
use officehours_core::types::{Ticket, TicketId, TicketStatus};
use serde::Deserialize;
use std::future::Future;
use std::pin::Pin;

/// Partition source backed by the ticket API.
#[derive(Clone)]
pub struct HttpPartitionSource {
    base_url: String,
    client: reqwest::Client,
}

impl HttpPartitionSource {
    /// Create a source for a server base URL (no trailing slash).
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }
}

impl PartitionSource for HttpPartitionSource {
    fn fetch(
        &self,
        status: TicketStatus,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Ticket>, SourceError>> + Send + '_>> {
        let url = format!("{}/api/tickets?status={}", self.base_url, status.as_str());
        let request = self.client.get(url);
        Box::pin(async move {
            let response = request
                .send()
                .await
                .map_err(|e| SourceError::Fetch(e.to_string()))?
                .error_for_status()
                .map_err(|e| SourceError::Fetch(e.to_string()))?;
            response
                .json::<Vec<Ticket>>()
                .await
                .map_err(|e| SourceError::Fetch(e.to_string()))
        })
    }
}

impl TicketDetailSource for HttpPartitionSource {
    fn fetch(
        &self,
        id: TicketId,
    ) -> Pin<Box<dyn Future<Output = Result<Ticket, SourceError>> + Send + '_>> {
        let url = format!("{}/api/tickets/{}", self.base_url, id.value());
        let request = self.client.get(url);
        Box::pin(async move {
            let response = request
                .send()
                .await
                .map_err(|e| SourceError::Fetch(e.to_string()))?
                .error_for_status()
                .map_err(|e| SourceError::Fetch(e.to_string()))?;
            response
                .json::<Ticket>()
                .await
                .map_err(|e| SourceError::Fetch(e.to_string()))
        })
    }
}

/// The slice of the settings payload the view cares about.
#[derive(Debug, Deserialize)]
struct SettingsDto {
    moderation_enabled: bool,
}

/// Settings reader backed by the ticket API.
///
/// The Pending stage is visible only to staff viewers, and only while the
/// site has moderation enabled; the latter is re-read on every call so a
/// toggle takes effect on the next routed ticket.
#[derive(Clone)]
pub struct HttpQueueSettings {
    base_url: String,
    client: reqwest::Client,
    viewer_is_staff: bool,
}

impl HttpQueueSettings {
    /// Create a settings reader for a server base URL and viewer role.
    #[must_use]
    pub fn new(base_url: impl Into<String>, viewer_is_staff: bool) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
            viewer_is_staff,
        }
    }
}

impl QueueSettings for HttpQueueSettings {
    fn moderation_visible(&self) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        if !self.viewer_is_staff {
            return Box::pin(async { false });
        }
        let url = format!("{}/api/settings", self.base_url);
        let request = self.client.get(url);
        Box::pin(async move {
            let settings = match request.send().await {
                Ok(response) => response.json::<SettingsDto>().await,
                Err(error) => Err(error),
            };
            match settings {
                Ok(dto) => dto.moderation_enabled,
                Err(error) => {
                    // Fall back to the student view; Open is always safe.
                    tracing::warn!(%error, "settings read failed, routing to open");
                    false
                },
            }
        })
    }
}
