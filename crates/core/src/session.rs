//! Seams to the surrounding editor: who is editing which document, and the
//! gate the editing UI consults before mutating a node.

use async_trait::async_trait;

use crate::protocol::Topic;
use crate::types::{DocumentId, NodeId, UserId};

/// Identity provided by the content-tree/document layer.
pub trait EditorSession {
    fn current_user_id(&self) -> UserId;
    fn current_document_id(&self) -> DocumentId;

    /// Lock topic for the current document.
    fn lock_topic(&self) -> Topic {
        Topic::for_document(&self.current_document_id())
    }
}

/// Plain-data [`EditorSession`] for callers that already know both ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub user_id: UserId,
    pub document_id: DocumentId,
}

impl SessionInfo {
    pub fn new(user_id: impl Into<UserId>, document_id: impl Into<DocumentId>) -> Self {
        Self {
            user_id: user_id.into(),
            document_id: document_id.into(),
        }
    }
}

impl EditorSession for SessionInfo {
    fn current_user_id(&self) -> UserId {
        self.user_id.clone()
    }

    fn current_document_id(&self) -> DocumentId {
        self.document_id.clone()
    }
}

/// Mutation gate for the editing UI.
///
/// Every structural or content change to a node must be preceded by a
/// `can_edit` check. The answer is advisory: it reflects the local view of
/// the lock table at the time of the call.
#[async_trait]
pub trait EditGate: Send + Sync {
    async fn can_edit(&self, node_id: &NodeId) -> bool;
}
