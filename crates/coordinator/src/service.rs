use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use pagelock_core::{
    EditorSession, LockEntry, LockMessage, LockTable, NodeId, PresenceTracker, UserId,
};
use pagelock_events::{Subscription, SubscriptionHandle, Transport, TransportEvent};
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tokio_util::time::{delay_queue, DelayQueue};

use crate::commands::CoordinatorCmd;
use crate::config::CoordinatorConfig;
use crate::error::CoordinatorError;
use crate::events::LockEvent;
use crate::handle::CoordinatorHandle;

/// The lock coordinator actor.
///
/// Sole owner of the lock table, the presence tracker, and the TTL timer
/// queue for one user on one document. Everything that touches that state
/// (handle commands, deliveries from peers, timer firings) is serialized
/// through [`LockCoordinator::run`].
pub struct LockCoordinator {
    user_id: UserId,
    config: CoordinatorConfig,
    table: LockTable,
    presence: PresenceTracker,
    /// One entry per lock currently held by this coordinator.
    timers: DelayQueue<NodeId>,
    timer_keys: HashMap<NodeId, delay_queue::Key>,
    transport: Arc<dyn Transport>,
    subscription: SubscriptionHandle,
    events: broadcast::Sender<LockEvent>,
}

impl LockCoordinator {
    /// Join the session's lock topic, start the reconciliation handshake,
    /// and spawn the coordinator task.
    pub async fn spawn(
        session: &impl EditorSession,
        transport: Arc<dyn Transport>,
        config: CoordinatorConfig,
    ) -> Result<CoordinatorHandle, CoordinatorError> {
        config.validate()?;

        let user_id = session.current_user_id();
        let document_id = session.current_document_id();
        let topic = session.lock_topic();

        let Subscription { handle, inbound } = transport.subscribe(&topic).await?;
        let (tx, rx) = mpsc::channel(config.command_buffer);
        let (events, _) = broadcast::channel(config.event_buffer);

        let mut presence = PresenceTracker::new(config.presence_throttle);
        presence.join(user_id.clone());

        let coordinator = Self {
            user_id: user_id.clone(),
            config,
            table: LockTable::new(),
            presence,
            timers: DelayQueue::new(),
            timer_keys: HashMap::new(),
            transport,
            subscription: handle,
            events: events.clone(),
        };

        tracing::info!(user_id = %user_id, topic = %topic, "Lock coordinator joined topic");
        coordinator
            .publish(LockMessage::RequestLocks {
                requester_id: user_id.clone(),
            })
            .await;

        tokio::spawn(coordinator.run(rx, inbound));

        Ok(CoordinatorHandle::new(tx, events, user_id, document_id))
    }

    async fn run(
        mut self,
        mut rx: mpsc::Receiver<CoordinatorCmd>,
        mut inbound: mpsc::UnboundedReceiver<TransportEvent>,
    ) {
        let mut inbound_open = true;

        loop {
            tokio::select! {
                // Deliveries already received are applied before answering
                // local commands, so queries reflect everything heard so far.
                biased;

                event = inbound.recv(), if inbound_open => {
                    match event {
                        Some(event) => self.handle_transport_event(event).await,
                        None => {
                            tracing::warn!(user_id = %self.user_id, "Transport subscription closed");
                            inbound_open = false;
                        }
                    }
                }
                Some(expired) = self.timers.next(), if !self.timers.is_empty() => {
                    self.handle_expiry(expired.into_inner()).await;
                }
                cmd = rx.recv() => {
                    let Some(cmd) = cmd else {
                        break;
                    };
                    if let CoordinatorCmd::Shutdown { reply } = cmd {
                        self.teardown().await;
                        let _ = reply.send(());
                        return;
                    }
                    self.handle_command(cmd).await;
                }
            }
        }

        // Every handle was dropped.
        self.teardown().await;
    }

    async fn handle_command(&mut self, cmd: CoordinatorCmd) {
        match cmd {
            CoordinatorCmd::Acquire { node_id, reply } => {
                let _ = reply.send(self.acquire(node_id).await);
            }
            CoordinatorCmd::Release { node_id, reply } => {
                let _ = reply.send(self.release(&node_id).await);
            }
            CoordinatorCmd::ReleaseAll { reply } => {
                let _ = reply.send(self.release_all_owned_by_self().await);
            }
            CoordinatorCmd::LockOwner { node_id, reply } => {
                let owner = self.table.get(&node_id).map(|lock| lock.owner_id);
                let _ = reply.send(owner);
            }
            CoordinatorCmd::RequestRelease { node_id, reply } => {
                let _ = reply.send(self.request_release(node_id).await);
            }
            CoordinatorCmd::Touch { reply } => {
                let _ = reply.send(self.touch().await);
            }
            CoordinatorCmd::SetSelection { node_id, reply } => {
                self.presence.set_selection(&self.user_id, node_id);
                let _ = reply.send(());
            }
            CoordinatorCmd::Presence { reply } => {
                self.refresh_presence();
                let _ = reply.send(self.presence.records());
            }
            CoordinatorCmd::Locks { reply } => {
                let _ = reply.send(self.table.snapshot_at(Instant::now()));
            }
            // Handled in `run` because it ends the loop.
            CoordinatorCmd::Shutdown { reply } => {
                let _ = reply.send(());
            }
        }
    }

    // ---- local operations ----

    async fn acquire(&mut self, node_id: NodeId) -> bool {
        // Always re-read the table: a peer's broadcast may have landed since
        // the caller last looked.
        match self.table.get(&node_id) {
            Some(lock) if lock.owner_id != self.user_id => {
                tracing::debug!(
                    node_id = %node_id,
                    owner_id = %lock.owner_id,
                    "Lock acquisition denied",
                );
                false
            }
            Some(_) => {
                self.take(node_id.clone());
                tracing::debug!(node_id = %node_id, "Lock renewed");
                self.broadcast_acquired(node_id).await;
                true
            }
            None => {
                self.take(node_id.clone());
                self.presence
                    .set_locked(&self.user_id, Some(node_id.clone()));
                tracing::info!(node_id = %node_id, user_id = %self.user_id, "Lock acquired");
                self.emit(LockEvent::Acquired {
                    node_id: node_id.clone(),
                    owner_id: self.user_id.clone(),
                });
                self.broadcast_acquired(node_id).await;
                true
            }
        }
    }

    async fn release(&mut self, node_id: &NodeId) -> bool {
        let owned = self
            .table
            .peek(node_id)
            .is_some_and(|lock| lock.owner_id == self.user_id);
        if !owned {
            return false;
        }

        self.drop_own(node_id);
        tracing::info!(node_id = %node_id, user_id = %self.user_id, "Lock released");
        self.emit(LockEvent::Released {
            node_id: node_id.clone(),
            owner_id: self.user_id.clone(),
        });
        self.publish(LockMessage::LockReleased {
            node_id: node_id.clone(),
            owner_id: self.user_id.clone(),
        })
        .await;
        true
    }

    async fn release_all_owned_by_self(&mut self) -> usize {
        let owned = self.table.all_owned_by(&self.user_id);
        let mut released = 0;
        for lock in owned {
            if self.release(&lock.node_id).await {
                released += 1;
            }
        }
        released
    }

    async fn request_release(&mut self, node_id: NodeId) -> bool {
        let Some(lock) = self.table.get(&node_id) else {
            return false;
        };
        if lock.owner_id == self.user_id {
            return false;
        }

        tracing::debug!(node_id = %node_id, owner_id = %lock.owner_id, "Requesting release");
        self.publish(LockMessage::ReleaseRequested {
            node_id,
            owner_id: lock.owner_id,
            requester_id: self.user_id.clone(),
        })
        .await
    }

    async fn touch(&mut self) -> bool {
        if !self.presence.touch(&self.user_id) {
            return false;
        }
        if self.config.renew_on_activity {
            self.renew_aging_locks().await;
        }
        true
    }

    /// Renew every self-held lock that has used up half of its TTL.
    async fn renew_aging_locks(&mut self) {
        let now = Instant::now();
        let half = self.config.lock_ttl / 2;
        let aging: Vec<NodeId> = self
            .table
            .all_owned_by_at(&self.user_id, now)
            .into_iter()
            .filter(|lock| lock.remaining_at(now) <= half)
            .map(|lock| lock.node_id)
            .collect();

        for node_id in aging {
            self.take(node_id.clone());
            tracing::debug!(node_id = %node_id, "Lock renewed on activity");
            self.broadcast_acquired(node_id).await;
        }
    }

    // ---- timers ----

    async fn handle_expiry(&mut self, node_id: NodeId) {
        self.timer_keys.remove(&node_id);

        // Auto-release only while the table still says we own it. A lazily
        // evicted entry (no record at all) was ours too: the timer is
        // cancelled whenever ownership moves elsewhere.
        let still_ours = self
            .table
            .peek(&node_id)
            .map_or(true, |lock| lock.owner_id == self.user_id);
        if !still_ours {
            return;
        }

        self.table.remove(&node_id);
        self.presence.clear_locked_if(&self.user_id, &node_id);
        tracing::info!(node_id = %node_id, user_id = %self.user_id, "Lock expired, auto-releasing");
        self.emit(LockEvent::Expired {
            node_id: node_id.clone(),
        });
        self.publish(LockMessage::LockReleased {
            node_id,
            owner_id: self.user_id.clone(),
        })
        .await;
    }

    /// Write a self-owned entry and (re)arm its timer.
    fn take(&mut self, node_id: NodeId) {
        let ttl = self.config.lock_ttl;
        self.table.put(node_id.clone(), self.user_id.clone(), ttl);
        match self.timer_keys.get(&node_id) {
            Some(key) => self.timers.reset(key, ttl),
            None => {
                let key = self.timers.insert(node_id.clone(), ttl);
                self.timer_keys.insert(node_id, key);
            }
        }
    }

    /// Forget a self-owned entry and disarm its timer.
    fn drop_own(&mut self, node_id: &NodeId) {
        self.cancel_timer(node_id);
        self.table.remove(node_id);
        self.presence.clear_locked_if(&self.user_id, node_id);
    }

    fn cancel_timer(&mut self, node_id: &NodeId) {
        if let Some(key) = self.timer_keys.remove(node_id) {
            self.timers.remove(&key);
        }
    }

    // ---- remote events ----

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Message(message) => {
                if message.originator() == &self.user_id {
                    tracing::trace!(kind = message.kind(), "Ignoring self-originated message");
                    return;
                }
                self.presence.seen(message.originator());
                self.apply_remote(message).await;
            }
            TransportEvent::Reconnected => self.resync().await,
        }
    }

    async fn apply_remote(&mut self, message: LockMessage) {
        match message {
            LockMessage::LockAcquired {
                node_id, owner_id, ..
            } => self.apply_remote_acquired(node_id, owner_id),

            LockMessage::LockReleased { node_id, owner_id } => {
                // A release for an older generation must not remove a newer
                // lock that overtook it.
                let matches = self
                    .table
                    .peek(&node_id)
                    .is_some_and(|lock| lock.owner_id == owner_id);
                if !matches {
                    tracing::debug!(node_id = %node_id, owner_id = %owner_id, "Ignoring stale release");
                    return;
                }
                self.table.remove(&node_id);
                self.presence.clear_locked_if(&owner_id, &node_id);
                self.emit(LockEvent::Released { node_id, owner_id });
            }

            LockMessage::RequestLocks { requester_id } => {
                let locks: Vec<LockEntry> = self
                    .table
                    .all_owned_by(&self.user_id)
                    .into_iter()
                    .map(|lock| LockEntry {
                        node_id: lock.node_id,
                        owner_id: lock.owner_id,
                    })
                    .collect();
                if locks.is_empty() {
                    return;
                }
                tracing::debug!(requester_id = %requester_id, count = locks.len(), "Answering lock request");
                self.publish(LockMessage::LocksResponse {
                    responder_id: self.user_id.clone(),
                    locks,
                })
                .await;
            }

            LockMessage::LocksResponse {
                responder_id,
                locks,
            } => {
                tracing::debug!(responder_id = %responder_id, count = locks.len(), "Merging lock response");
                for entry in locks {
                    if entry.owner_id == self.user_id {
                        continue;
                    }
                    let held_by_self = self
                        .table
                        .get(&entry.node_id)
                        .is_some_and(|lock| lock.owner_id == self.user_id);
                    if held_by_self {
                        continue;
                    }
                    self.mirror(entry.node_id, entry.owner_id);
                }
            }

            LockMessage::ReleaseRequested {
                node_id,
                owner_id,
                requester_id,
            } => {
                if owner_id != self.user_id {
                    return;
                }
                let held = self
                    .table
                    .get(&node_id)
                    .is_some_and(|lock| lock.owner_id == self.user_id);
                if held {
                    tracing::info!(node_id = %node_id, requester_id = %requester_id, "Release requested by peer");
                    self.emit(LockEvent::ReleaseRequested {
                        node_id,
                        requester_id,
                    });
                }
            }

            LockMessage::PeerLeft { user_id } => {
                tracing::debug!(user_id = %user_id, "Peer left");
                self.presence.leave(&user_id);
            }
        }
    }

    fn apply_remote_acquired(&mut self, node_id: NodeId, owner_id: UserId) {
        let overridden = self
            .table
            .peek(&node_id)
            .is_some_and(|lock| lock.owner_id == self.user_id);
        if overridden {
            self.drop_own(&node_id);
            tracing::warn!(
                node_id = %node_id,
                new_owner = %owner_id,
                "Held lock overridden by peer",
            );
            self.emit(LockEvent::Overridden {
                node_id: node_id.clone(),
                new_owner: owner_id.clone(),
            });
        }
        self.mirror(node_id, owner_id);
    }

    /// Record a peer's lock in the local table.
    fn mirror(&mut self, node_id: NodeId, owner_id: UserId) {
        let renewed = self
            .table
            .get(&node_id)
            .is_some_and(|lock| lock.owner_id == owner_id);
        self.table
            .put(node_id.clone(), owner_id.clone(), self.config.lock_ttl);
        self.presence.join(owner_id.clone());
        self.presence
            .set_locked(&owner_id, Some(node_id.clone()));
        if !renewed {
            self.emit(LockEvent::Acquired { node_id, owner_id });
        }
    }

    /// Drop peers gone quiet and lock pointers whose lock has expired or
    /// moved to someone else.
    fn refresh_presence(&mut self) {
        let now = Instant::now();
        let evicted = self.presence.evict_stale_at(
            now,
            self.config.presence_stale_timeout,
            &self.user_id,
        );
        if !evicted.is_empty() {
            tracing::debug!(count = evicted.len(), "Evicted stale presence records");
        }

        let table = &mut self.table;
        self.presence.retain_locked(|user_id, node_id| {
            table
                .get_at(node_id, now)
                .is_some_and(|lock| &lock.owner_id == user_id)
        });
    }

    /// Re-run the handshake and re-announce our locks after a reconnect.
    async fn resync(&mut self) {
        tracing::info!(user_id = %self.user_id, "Transport reconnected, resynchronizing locks");
        self.publish(LockMessage::RequestLocks {
            requester_id: self.user_id.clone(),
        })
        .await;
        for lock in self.table.all_owned_by(&self.user_id) {
            self.broadcast_acquired(lock.node_id).await;
        }
    }

    // ---- teardown ----

    async fn teardown(&mut self) {
        let released = self.release_all_owned_by_self().await;
        self.timers.clear();
        self.timer_keys.clear();
        self.presence.leave(&self.user_id);
        self.publish(LockMessage::PeerLeft {
            user_id: self.user_id.clone(),
        })
        .await;
        self.transport.unsubscribe(&self.subscription).await;
        tracing::info!(user_id = %self.user_id, released, "Lock coordinator stopped");
    }

    // ---- helpers ----

    async fn broadcast_acquired(&self, node_id: NodeId) {
        self.publish(LockMessage::LockAcquired {
            node_id,
            owner_id: self.user_id.clone(),
            ts: chrono::Utc::now(),
        })
        .await;
    }

    /// Fire-and-forget publish. Failures are logged; local state stays valid
    /// and peers fall back on TTL expiry.
    async fn publish(&self, message: LockMessage) -> bool {
        let kind = message.kind();
        match self.transport.publish(&self.subscription, message).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    topic = %self.subscription.topic,
                    kind,
                    error = %e,
                    "Publish failed; continuing with local state",
                );
                false
            }
        }
    }

    fn emit(&self, event: LockEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }
}
