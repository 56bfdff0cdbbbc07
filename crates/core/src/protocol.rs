//! Layer-lock constants, topic naming, and the broadcast message protocol.
//!
//! This module lives in `core` (no runtime tasks) so that the coordinator,
//! the relay server, and the WebSocket client transport all agree on the
//! same TTL bounds, topic names, and wire envelope.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{DocumentId, NodeId, Timestamp, UserId};

// ---------------------------------------------------------------------------
// Lock TTL constants
// ---------------------------------------------------------------------------

/// Default lock time-to-live in seconds.
pub const DEFAULT_LOCK_TTL_SECS: u64 = 30;

/// Minimum accepted lock TTL in seconds.
pub const MIN_LOCK_TTL_SECS: u64 = 1;

/// Maximum accepted lock TTL in seconds (1 hour).
pub const MAX_LOCK_TTL_SECS: u64 = 3600;

// ---------------------------------------------------------------------------
// Presence constants
// ---------------------------------------------------------------------------

/// Minimum spacing between two applied activity touches for one user.
pub const PRESENCE_THROTTLE_MS: u64 = 1000;

/// Remote presence records not refreshed for this many seconds are dropped.
pub const PRESENCE_STALE_TIMEOUT_SECS: u64 = 120;

// ---------------------------------------------------------------------------
// Topics
// ---------------------------------------------------------------------------

const TOPIC_PREFIX: &str = "doc:";
const TOPIC_SUFFIX: &str = ":locks";

/// Name of the publish/subscribe channel scoped to one document.
///
/// Formatted as `doc:<document_id>:locks`, so collaborators on different
/// documents never share a topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topic(String);

impl Topic {
    /// Build the lock topic for a document.
    pub fn for_document(document_id: &DocumentId) -> Self {
        Self(format!("{TOPIC_PREFIX}{document_id}{TOPIC_SUFFIX}"))
    }

    /// Parse a topic name back into a [`Topic`], validating its shape.
    pub fn parse(name: &str) -> Result<Self, CoreError> {
        let topic = Self(name.to_string());
        topic.document_id()?;
        Ok(topic)
    }

    /// Recover the document id embedded in the topic name.
    pub fn document_id(&self) -> Result<DocumentId, CoreError> {
        let id = self
            .0
            .strip_prefix(TOPIC_PREFIX)
            .and_then(|rest| rest.strip_suffix(TOPIC_SUFFIX))
            .filter(|id| !id.is_empty())
            .ok_or_else(|| CoreError::InvalidTopic(self.0.clone()))?;
        Ok(DocumentId::from(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Broadcast message protocol
// ---------------------------------------------------------------------------

/// A `(node, owner)` pair reported during reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockEntry {
    pub node_id: NodeId,
    pub owner_id: UserId,
}

/// Messages exchanged on a document's lock topic.
///
/// Serialized as `{"type": "<kind>", "payload": {...}}` so that clients in
/// other languages can route by type string, while Rust code matches the
/// closed set of variants exhaustively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum LockMessage {
    /// A peer acquired (or renewed) a lock.
    LockAcquired {
        node_id: NodeId,
        owner_id: UserId,
        ts: Timestamp,
    },

    /// A peer released a lock it held.
    LockReleased { node_id: NodeId, owner_id: UserId },

    /// A newly joined peer asks everyone for their currently held locks.
    RequestLocks { requester_id: UserId },

    /// Reply to `request_locks` listing the responder's own locks.
    LocksResponse {
        responder_id: UserId,
        locks: Vec<LockEntry>,
    },

    /// Advisory request that `owner_id` give up its lock on `node_id`.
    ReleaseRequested {
        node_id: NodeId,
        owner_id: UserId,
        requester_id: UserId,
    },

    /// A peer is leaving the document. Sent after its releases.
    PeerLeft { user_id: UserId },
}

impl LockMessage {
    /// The user that published this message.
    ///
    /// Receivers drop messages whose originator is themselves.
    pub fn originator(&self) -> &UserId {
        match self {
            Self::LockAcquired { owner_id, .. } | Self::LockReleased { owner_id, .. } => owner_id,
            Self::RequestLocks { requester_id } => requester_id,
            Self::LocksResponse { responder_id, .. } => responder_id,
            Self::ReleaseRequested { requester_id, .. } => requester_id,
            Self::PeerLeft { user_id } => user_id,
        }
    }

    /// Wire name of the variant, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::LockAcquired { .. } => "lock_acquired",
            Self::LockReleased { .. } => "lock_released",
            Self::RequestLocks { .. } => "request_locks",
            Self::LocksResponse { .. } => "locks_response",
            Self::ReleaseRequested { .. } => "release_requested",
            Self::PeerLeft { .. } => "peer_left",
        }
    }

    /// Encode to the JSON wire envelope.
    pub fn to_json(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Parse a wire envelope into a typed message.
///
/// Returns `Err` for malformed JSON or unknown `type` values. Callers
/// should log and drop such frames.
pub fn parse_message(text: &str) -> Result<LockMessage, CoreError> {
    Ok(serde_json::from_str(text)?)
}

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

/// Validate a lock TTL in seconds.
pub fn validate_lock_ttl(secs: u64) -> Result<(), CoreError> {
    if secs < MIN_LOCK_TTL_SECS {
        return Err(CoreError::Validation(format!(
            "Lock TTL must be at least {MIN_LOCK_TTL_SECS} second(s), got {secs}"
        )));
    }
    if secs > MAX_LOCK_TTL_SECS {
        return Err(CoreError::Validation(format!(
            "Lock TTL must be at most {MAX_LOCK_TTL_SECS} seconds, got {secs}"
        )));
    }
    Ok(())
}

/// Validate an identifier taken from an untrusted source (URL path, env).
///
/// Identifiers must be non-empty and must not contain `:` (which would make
/// topic names ambiguous) or whitespace.
pub fn validate_identifier(kind: &str, value: &str) -> Result<(), CoreError> {
    if value.is_empty() {
        return Err(CoreError::Validation(format!("{kind} must not be empty")));
    }
    if value.contains(':') || value.chars().any(char::is_whitespace) {
        return Err(CoreError::Validation(format!(
            "{kind} '{value}' must not contain ':' or whitespace"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
