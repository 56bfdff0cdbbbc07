//! The broadcast transport abstraction used by lock coordinators.
//!
//! A transport is a thin, unreliable fan-out: publishing never waits for
//! delivery, gives no ordering guarantee across publishers, and may fail
//! silently. The lock protocol above it heals through TTL expiry and the
//! join-time handshake instead of relying on the transport.

use std::fmt;

use async_trait::async_trait;
use pagelock_core::{CoreError, LockMessage, Topic};
use tokio::sync::mpsc;

/// Opaque identity of one subscription on one topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(uuid::Uuid);

impl SubscriberId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Handle returned by [`Transport::subscribe`], passed back to `publish`
/// and `unsubscribe`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    pub id: SubscriberId,
    pub topic: Topic,
}

/// Something delivered to a subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A message published by another subscriber on the same topic.
    Message(LockMessage),
    /// The underlying connection dropped and has been re-established.
    /// Anything published in between may have been lost.
    Reconnected,
}

/// A live subscription: the handle plus the inbound delivery channel.
#[derive(Debug)]
pub struct Subscription {
    pub handle: SubscriptionHandle,
    pub inbound: mpsc::UnboundedReceiver<TransportEvent>,
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The handle is not (or no longer) subscribed.
    #[error("Subscription {0} is closed")]
    Closed(SubscriberId),

    /// The subscriber is cut off from its peers.
    #[error("Subscriber {0} is partitioned from the topic")]
    Partitioned(SubscriberId),

    /// Failed to establish the underlying connection.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A protocol-level error on an established connection.
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    Codec(#[from] CoreError),
}

/// Topic-scoped, best-effort publish/subscribe.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Join `topic`. Messages published by this subscription are never
    /// delivered back to it.
    async fn subscribe(&self, topic: &Topic) -> Result<Subscription, TransportError>;

    /// Send `message` to every other subscriber of the handle's topic.
    ///
    /// Returns as soon as the message is handed off; there is no
    /// acknowledgement and no retry.
    async fn publish(
        &self,
        handle: &SubscriptionHandle,
        message: LockMessage,
    ) -> Result<(), TransportError>;

    /// Leave the topic. No further deliveries reach the subscription.
    async fn unsubscribe(&self, handle: &SubscriptionHandle);
}
