//! Notifications the coordinator emits for the editing UI.

use pagelock_core::{NodeId, UserId};

/// A change in the local view of lock state.
///
/// Delivered over a `tokio::sync::broadcast` channel; slow receivers may
/// observe `RecvError::Lagged` and should re-query the handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockEvent {
    /// A lock was taken, locally or by a peer.
    Acquired { node_id: NodeId, owner_id: UserId },

    /// A lock was explicitly released, locally or by a peer.
    Released { node_id: NodeId, owner_id: UserId },

    /// A lock held by this coordinator reached its TTL and was auto-released.
    Expired { node_id: NodeId },

    /// A peer's `lock_acquired` replaced a lock this coordinator held.
    Overridden { node_id: NodeId, new_owner: UserId },

    /// A peer asked this coordinator to release one of its locks.
    ReleaseRequested {
        node_id: NodeId,
        requester_id: UserId,
    },
}
