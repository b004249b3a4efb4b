//! Dependency injection traits shared across the workspace.

use chrono::{DateTime, Utc};

/// Clock trait — abstracts time so reducers and engines are testable with
/// a fixed clock.
pub trait Clock: Send + Sync {
    /// Get the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
