//! # Office Hours Queue View
//!
//! The client-side queue reconciliation view: three ticket partitions
//! (Pending / Open / Assigned) seeded by one bulk fetch each and kept
//! current from the global lifecycle event stream, with no re-fetching on
//! events.
//!
//! The view is a single reducer ([`view::QueueReducer`]) so partition
//! membership changes atomically, plus a thin client
//! ([`client::QueueClient`]) that binds it to an event channel.

pub mod client;
pub mod detail;
pub mod http;
pub mod view;

pub use client::{QueueClient, QueueStore};
pub use detail::{TicketDetailSource, TicketWatcher};
pub use http::{HttpPartitionSource, HttpQueueSettings};
pub use view::{
    LoadState, Partition, PartitionSource, QueueAction, QueueEnvironment, QueueReducer,
    QueueSettings, QueueState, SourceError,
};
