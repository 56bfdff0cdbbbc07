//! In-process, topic-scoped fan-out hub.
//!
//! [`LocalHub`] is the reference [`Transport`]: every subscription gets an
//! unbounded channel, and `publish` pushes a copy of the message into every
//! other subscriber's channel on the same topic. It is designed to be
//! shared via `Arc<LocalHub>`; the relay server uses one instance for all
//! documents.
//!
//! Subscribers can be partitioned to simulate a network split: their
//! publishes fail with [`TransportError::Partitioned`] and nothing is
//! delivered to them until the partition is lifted.

use std::collections::HashMap;

use async_trait::async_trait;
use pagelock_core::{LockMessage, Timestamp, Topic};
use tokio::sync::{mpsc, RwLock};

use crate::transport::{
    SubscriberId, Subscription, SubscriptionHandle, Transport, TransportError, TransportEvent,
};

/// Bookkeeping for one subscription.
struct HubSubscriber {
    sender: mpsc::UnboundedSender<TransportEvent>,
    partitioned: bool,
    /// When the subscription was created. Reported by [`LocalHub::topics`].
    subscribed_at: Timestamp,
}

/// Summary of one topic for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSummary {
    pub topic: Topic,
    pub subscribers: usize,
    pub oldest_subscription: Option<Timestamp>,
}

#[derive(Default)]
pub struct LocalHub {
    topics: RwLock<HashMap<Topic, HashMap<SubscriberId, HubSubscriber>>>,
}

impl LocalHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cut a subscriber off from (or reconnect it to) its topic.
    ///
    /// Returns `false` if the handle is not subscribed.
    pub async fn set_partitioned(&self, handle: &SubscriptionHandle, partitioned: bool) -> bool {
        let mut topics = self.topics.write().await;
        let Some(sub) = topics
            .get_mut(&handle.topic)
            .and_then(|subs| subs.get_mut(&handle.id))
        else {
            return false;
        };
        sub.partitioned = partitioned;
        tracing::debug!(topic = %handle.topic, subscriber = %handle.id, partitioned, "Partition state changed");
        true
    }

    /// Number of subscribers currently on `topic`.
    pub async fn subscriber_count(&self, topic: &Topic) -> usize {
        self.topics
            .read()
            .await
            .get(topic)
            .map_or(0, HashMap::len)
    }

    /// Per-topic summary, sorted by topic name.
    pub async fn topics(&self) -> Vec<TopicSummary> {
        let topics = self.topics.read().await;
        let mut summaries: Vec<TopicSummary> = topics
            .iter()
            .map(|(topic, subs)| TopicSummary {
                topic: topic.clone(),
                subscribers: subs.len(),
                oldest_subscription: subs.values().map(|s| s.subscribed_at).min(),
            })
            .collect();
        summaries.sort_by(|a, b| a.topic.as_str().cmp(b.topic.as_str()));
        summaries
    }
}

#[async_trait]
impl Transport for LocalHub {
    async fn subscribe(&self, topic: &Topic) -> Result<Subscription, TransportError> {
        let (sender, inbound) = mpsc::unbounded_channel();
        let handle = SubscriptionHandle {
            id: SubscriberId::new(),
            topic: topic.clone(),
        };

        self.topics
            .write()
            .await
            .entry(topic.clone())
            .or_default()
            .insert(
                handle.id,
                HubSubscriber {
                    sender,
                    partitioned: false,
                    subscribed_at: chrono::Utc::now(),
                },
            );

        tracing::debug!(topic = %topic, subscriber = %handle.id, "Subscribed");
        Ok(Subscription { handle, inbound })
    }

    async fn publish(
        &self,
        handle: &SubscriptionHandle,
        message: LockMessage,
    ) -> Result<(), TransportError> {
        let topics = self.topics.read().await;
        let subs = topics
            .get(&handle.topic)
            .ok_or(TransportError::Closed(handle.id))?;
        let publisher = subs.get(&handle.id).ok_or(TransportError::Closed(handle.id))?;
        if publisher.partitioned {
            return Err(TransportError::Partitioned(handle.id));
        }

        // Closed receivers are skipped; they are removed on unsubscribe.
        for (id, sub) in subs {
            if *id == handle.id || sub.partitioned {
                continue;
            }
            let _ = sub.sender.send(TransportEvent::Message(message.clone()));
        }
        Ok(())
    }

    async fn unsubscribe(&self, handle: &SubscriptionHandle) {
        let mut topics = self.topics.write().await;
        if let Some(subs) = topics.get_mut(&handle.topic) {
            subs.remove(&handle.id);
            if subs.is_empty() {
                topics.remove(&handle.topic);
            }
        }
        tracing::debug!(topic = %handle.topic, subscriber = %handle.id, "Unsubscribed");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
