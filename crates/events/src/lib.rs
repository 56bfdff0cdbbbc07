//! Broadcast transport for lock coordination.
//!
//! - [`Transport`]: topic-scoped, best-effort publish/subscribe trait.
//! - [`LocalHub`]: in-process implementation backed by per-subscriber
//!   channels, with partition injection for exercising failure paths.

pub mod hub;
pub mod transport;

pub use hub::{LocalHub, TopicSummary};
pub use transport::{
    SubscriberId, Subscription, SubscriptionHandle, Transport, TransportError, TransportEvent,
};
