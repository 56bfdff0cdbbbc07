use async_trait::async_trait;
use pagelock_core::{DocumentId, EditGate, Lock, NodeId, PresenceRecord, UserId};
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::commands::CoordinatorCmd;
use crate::error::CoordinatorError;
use crate::events::LockEvent;

/// Cheaply cloneable handle to a running lock coordinator.
///
/// Every call is forwarded to the coordinator task and answered from its
/// local lock table; none of them wait on the network.
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::Sender<CoordinatorCmd>,
    events: broadcast::Sender<LockEvent>,
    user_id: UserId,
    document_id: DocumentId,
}

impl CoordinatorHandle {
    pub(crate) fn new(
        tx: mpsc::Sender<CoordinatorCmd>,
        events: broadcast::Sender<LockEvent>,
        user_id: UserId,
        document_id: DocumentId,
    ) -> Self {
        Self {
            tx,
            events,
            user_id,
            document_id,
        }
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn document_id(&self) -> &DocumentId {
        &self.document_id
    }

    /// Try to lock `node_id` for the local user.
    ///
    /// Returns `true` if the lock is now held (including when it already
    /// was, in which case the TTL is renewed) and `false` if another user
    /// holds a live lock on the node.
    pub async fn acquire(&self, node_id: impl Into<NodeId>) -> Result<bool, CoordinatorError> {
        let node_id = node_id.into();
        self.request(|reply| CoordinatorCmd::Acquire { node_id, reply })
            .await
    }

    /// Release a lock held by the local user. Returns `false` if the local
    /// user did not hold it.
    pub async fn release(&self, node_id: impl Into<NodeId>) -> Result<bool, CoordinatorError> {
        let node_id = node_id.into();
        self.request(|reply| CoordinatorCmd::Release { node_id, reply })
            .await
    }

    /// Release every lock held by the local user. Returns how many were released.
    pub async fn release_all_owned_by_self(&self) -> Result<usize, CoordinatorError> {
        self.request(|reply| CoordinatorCmd::ReleaseAll { reply })
            .await
    }

    pub async fn lock_owner(
        &self,
        node_id: impl Into<NodeId>,
    ) -> Result<Option<UserId>, CoordinatorError> {
        let node_id = node_id.into();
        self.request(|reply| CoordinatorCmd::LockOwner { node_id, reply })
            .await
    }

    pub async fn is_locked(&self, node_id: impl Into<NodeId>) -> Result<bool, CoordinatorError> {
        Ok(self.lock_owner(node_id).await?.is_some())
    }

    /// `true` when the node is unlocked or locked by the local user.
    pub async fn can_edit(&self, node_id: impl Into<NodeId>) -> Result<bool, CoordinatorError> {
        let owner = self.lock_owner(node_id).await?;
        Ok(owner.map_or(true, |owner| owner == self.user_id))
    }

    /// Send an advisory "please release" to the current owner of `node_id`.
    ///
    /// Returns `false` when the node is unlocked or held by the local user,
    /// or when the request could not be published.
    pub async fn request_release(
        &self,
        node_id: impl Into<NodeId>,
    ) -> Result<bool, CoordinatorError> {
        let node_id = node_id.into();
        self.request(|reply| CoordinatorCmd::RequestRelease { node_id, reply })
            .await
    }

    /// Record activity for the local user. Returns `false` when throttled.
    pub async fn touch(&self) -> Result<bool, CoordinatorError> {
        self.request(|reply| CoordinatorCmd::Touch { reply }).await
    }

    pub async fn set_selection(&self, node_id: Option<NodeId>) -> Result<(), CoordinatorError> {
        self.request(|reply| CoordinatorCmd::SetSelection { node_id, reply })
            .await
    }

    pub async fn presence(&self) -> Result<Vec<PresenceRecord>, CoordinatorError> {
        self.request(|reply| CoordinatorCmd::Presence { reply })
            .await
    }

    /// Every live lock in the local view, sorted by node.
    pub async fn locks(&self) -> Result<Vec<Lock>, CoordinatorError> {
        self.request(|reply| CoordinatorCmd::Locks { reply }).await
    }

    /// Subscribe to lock state notifications.
    pub fn subscribe_events(&self) -> broadcast::Receiver<LockEvent> {
        self.events.subscribe()
    }

    /// Release all locks, leave the topic, and stop the coordinator.
    ///
    /// Idempotent: calling it on an already stopped coordinator is a no-op.
    pub async fn shutdown(&self) {
        if self
            .request(|reply| CoordinatorCmd::Shutdown { reply })
            .await
            .is_err()
        {
            tracing::debug!(user_id = %self.user_id, "Coordinator already stopped");
        }
    }

    async fn request<R>(
        &self,
        make: impl FnOnce(oneshot::Sender<R>) -> CoordinatorCmd,
    ) -> Result<R, CoordinatorError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| CoordinatorError::Stopped)?;
        rx.await.map_err(|_| CoordinatorError::Stopped)
    }
}

#[async_trait]
impl EditGate for CoordinatorHandle {
    /// A stopped coordinator denies every edit.
    async fn can_edit(&self, node_id: &NodeId) -> bool {
        CoordinatorHandle::can_edit(self, node_id.clone())
            .await
            .unwrap_or(false)
    }
}
