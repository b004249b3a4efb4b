//! Site settings the lifecycle engine consults.
//!
//! Settings are an external collaborator (the original stores them in an
//! admin table); the engine only needs three reads, exposed through a
//! dyn-compatible async trait so implementations may hit a database, a
//! cache, or plain configuration.

use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors raised while reading site settings.
#[derive(Error, Debug, Clone)]
pub enum SettingsError {
    /// The settings backend could not be reached.
    #[error("settings unavailable: {0}")]
    Unavailable(String),
}

/// Boxed future alias for dyn-compatible trait methods.
pub type SettingsFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, SettingsError>> + Send + 'a>>;

/// Read access to the queue's site settings.
pub trait SiteSettings: Send + Sync {
    /// Whether new tickets pass through the Pending moderation stage.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Unavailable`] when the backend is down.
    fn moderation_enabled(&self) -> SettingsFuture<'_, bool>;

    /// Whether tickets may be marked public at all.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Unavailable`] when the backend is down.
    fn public_tickets_enabled(&self) -> SettingsFuture<'_, bool>;

    /// Minimum wait after a creator's last resolved ticket, in minutes.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Unavailable`] when the backend is down.
    fn cooldown_minutes(&self) -> SettingsFuture<'_, u64>;
}

/// Settings fixed at construction time.
///
/// Used by the server (values from configuration) and by tests.
#[derive(Clone, Copy, Debug)]
pub struct StaticSiteSettings {
    /// Whether the moderation stage is enabled.
    pub moderation_enabled: bool,
    /// Whether public tickets are enabled.
    pub public_tickets_enabled: bool,
    /// Cooldown between a resolution and the next ticket, in minutes.
    pub cooldown_minutes: u64,
}

impl Default for StaticSiteSettings {
    fn default() -> Self {
        Self {
            moderation_enabled: false,
            public_tickets_enabled: true,
            cooldown_minutes: 0,
        }
    }
}

impl SiteSettings for StaticSiteSettings {
    fn moderation_enabled(&self) -> SettingsFuture<'_, bool> {
        let value = self.moderation_enabled;
        Box::pin(async move { Ok(value) })
    }

    fn public_tickets_enabled(&self) -> SettingsFuture<'_, bool> {
        let value = self.public_tickets_enabled;
        Box::pin(async move { Ok(value) })
    }

    fn cooldown_minutes(&self) -> SettingsFuture<'_, u64> {
        let value = self.cooldown_minutes;
        Box::pin(async move { Ok(value) })
    }
}
