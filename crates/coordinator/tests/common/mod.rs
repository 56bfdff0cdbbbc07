//! Shared fixtures for coordinator integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pagelock_coordinator::{CoordinatorConfig, CoordinatorHandle, LockCoordinator, LockEvent};
use pagelock_core::{LockMessage, NodeId, SessionInfo, Topic, UserId};
use pagelock_events::{
    LocalHub, SubscriberId, Subscription, SubscriptionHandle, Transport, TransportError,
    TransportEvent,
};
use tokio::sync::{broadcast, mpsc};

pub const DOC: &str = "landing";
pub const TTL: Duration = Duration::from_secs(30);

pub fn node(id: &str) -> NodeId {
    NodeId::from(id)
}

pub fn user(id: &str) -> UserId {
    UserId::from(id)
}

pub fn topic() -> Topic {
    Topic::for_document(&DOC.into())
}

/// Spawn a coordinator for `user_id` on the shared hub with default config.
pub async fn join(hub: &Arc<LocalHub>, user_id: &str) -> CoordinatorHandle {
    join_with(hub, user_id, CoordinatorConfig::default()).await
}

pub async fn join_with(
    hub: &Arc<LocalHub>,
    user_id: &str,
    config: CoordinatorConfig,
) -> CoordinatorHandle {
    let transport: Arc<dyn Transport> = hub.clone();
    LockCoordinator::spawn(&SessionInfo::new(user_id, DOC), transport, config)
        .await
        .expect("coordinator should start")
}

/// Let every in-flight message and command be processed.
///
/// With the clock paused, the runtime only auto-advances time once all
/// tasks are idle, so this sleep completes after the system has settled.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// Collect every event currently buffered on `rx`.
pub fn drain(rx: &mut broadcast::Receiver<LockEvent>) -> Vec<LockEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Collect every lock message currently buffered on a raw subscription.
pub fn drain_messages(sub: &mut Subscription) -> Vec<LockMessage> {
    let mut messages = Vec::new();
    while let Ok(event) = sub.inbound.try_recv() {
        if let TransportEvent::Message(message) = event {
            messages.push(message);
        }
    }
    messages
}

pub fn acquired(node_id: &str, owner_id: &str) -> LockMessage {
    LockMessage::LockAcquired {
        node_id: node(node_id),
        owner_id: user(owner_id),
        ts: chrono::Utc::now(),
    }
}

pub fn released(node_id: &str, owner_id: &str) -> LockMessage {
    LockMessage::LockReleased {
        node_id: node(node_id),
        owner_id: user(owner_id),
    }
}

/// Transport that records publishes and lets the test inject deliveries.
#[derive(Default)]
pub struct ScriptedTransport {
    published: Mutex<Vec<LockMessage>>,
    inbound: Mutex<Option<mpsc::UnboundedSender<TransportEvent>>>,
    failing: AtomicBool,
}

impl ScriptedTransport {
    pub fn published(&self) -> Vec<LockMessage> {
        self.published.lock().unwrap().clone()
    }

    pub fn clear_published(&self) {
        self.published.lock().unwrap().clear();
    }

    pub fn inject(&self, event: TransportEvent) {
        let inbound = self.inbound.lock().unwrap();
        inbound
            .as_ref()
            .expect("subscribe must be called first")
            .send(event)
            .expect("coordinator should be listening");
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn is_subscribed(&self) -> bool {
        self.inbound.lock().unwrap().is_some()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn subscribe(&self, topic: &Topic) -> Result<Subscription, TransportError> {
        let (tx, inbound) = mpsc::unbounded_channel();
        *self.inbound.lock().unwrap() = Some(tx);
        Ok(Subscription {
            handle: SubscriptionHandle {
                id: SubscriberId::new(),
                topic: topic.clone(),
            },
            inbound,
        })
    }

    async fn publish(
        &self,
        _handle: &SubscriptionHandle,
        message: LockMessage,
    ) -> Result<(), TransportError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TransportError::Connection("scripted failure".into()));
        }
        self.published.lock().unwrap().push(message);
        Ok(())
    }

    async fn unsubscribe(&self, _handle: &SubscriptionHandle) {
        self.inbound.lock().unwrap().take();
    }
}

pub async fn join_scripted(
    transport: &Arc<ScriptedTransport>,
    user_id: &str,
    config: CoordinatorConfig,
) -> CoordinatorHandle {
    let dyn_transport: Arc<dyn Transport> = transport.clone();
    LockCoordinator::spawn(&SessionInfo::new(user_id, DOC), dyn_transport, config)
        .await
        .expect("coordinator should start")
}
