//! Shared application state for request handlers.

use crate::config::QueueConfig;
use officehours_engine::LifecycleEngine;
use std::sync::Arc;

/// State shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The lifecycle engine; sole writer to the ticket store.
    pub engine: Arc<LifecycleEngine>,
    /// Queue policy, echoed to clients via the settings endpoint.
    pub queue: QueueConfig,
}

impl AppState {
    /// Creates a new `AppState`.
    #[must_use]
    pub fn new(engine: Arc<LifecycleEngine>, queue: QueueConfig) -> Self {
        Self { engine, queue }
    }
}
