//! # Office Hours Core
//!
//! Domain types and core traits for the office-hours help queue.
//!
//! This crate holds everything the rest of the workspace agrees on:
//!
//! - **Types**: the [`types::Ticket`] entity, its identifiers, statuses and
//!   categories.
//! - **Events**: the [`event::LifecycleEvent`] union and its JSON wire
//!   codec, plus per-ticket [`event::TicketSignal`]s.
//! - **Channel**: the [`channel::EventChannel`] publish/subscribe contract.
//! - **Reducer**: the [`reducer::Reducer`] trait and [`reducer::Effect`]
//!   descriptions used by the client-side queue view.
//! - **Environment**: injected dependencies ([`environment::Clock`]).
//!
//! ## Architecture principles
//!
//! - Functional core, imperative shell
//! - Explicit effects (no hidden I/O)
//! - Dependency injection via environment traits

pub mod channel;
pub mod environment;
pub mod event;
pub mod reducer;
pub mod types;

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use smallvec::{SmallVec, smallvec};
