use pagelock_core::{Lock, NodeId, PresenceRecord, UserId};
use tokio::sync::oneshot;

/// Commands for the coordinator actor.
#[derive(Debug)]
pub enum CoordinatorCmd {
    /// Try to take (or renew) the lock on a node.
    Acquire {
        node_id: NodeId,
        reply: oneshot::Sender<bool>,
    },
    /// Release a lock held by this coordinator.
    Release {
        node_id: NodeId,
        reply: oneshot::Sender<bool>,
    },
    /// Release every lock held by this coordinator.
    ReleaseAll { reply: oneshot::Sender<usize> },
    /// Current live owner of a node, if any.
    LockOwner {
        node_id: NodeId,
        reply: oneshot::Sender<Option<UserId>>,
    },
    /// Ask the current owner of a node to let go of it.
    RequestRelease {
        node_id: NodeId,
        reply: oneshot::Sender<bool>,
    },
    /// Record local user activity.
    Touch { reply: oneshot::Sender<bool> },
    /// Record the node the local user has selected.
    SetSelection {
        node_id: Option<NodeId>,
        reply: oneshot::Sender<()>,
    },
    /// Snapshot of known presence records.
    Presence {
        reply: oneshot::Sender<Vec<PresenceRecord>>,
    },
    /// Snapshot of every live lock in the local table.
    Locks { reply: oneshot::Sender<Vec<Lock>> },
    /// Release everything, leave the topic, and stop.
    Shutdown { reply: oneshot::Sender<()> },
}
