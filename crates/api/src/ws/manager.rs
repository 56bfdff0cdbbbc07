use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::ws::Message;
use pagelock_core::{DocumentId, Timestamp};
use tokio::sync::{mpsc, RwLock};

/// Channel sender half for pushing control frames to a WebSocket connection.
pub type WsSender = mpsc::UnboundedSender<Message>;

/// Metadata for a single relay connection.
pub struct WsConnection {
    /// Document whose lock topic this connection is bridged onto.
    pub document_id: DocumentId,
    pub sender: WsSender,
    pub connected_at: Timestamp,
}

/// Tracks every open relay connection.
///
/// Lock traffic flows through the hub, not through here; the manager only
/// carries control frames (pings, close) and answers bookkeeping queries.
/// Designed to be wrapped in `Arc` and shared across the application.
pub struct WsManager {
    connections: RwLock<HashMap<String, WsConnection>>,
}

impl WsManager {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new connection.
    ///
    /// Returns the receiver half of the control channel so the caller can
    /// forward frames to the WebSocket sink. Re-using an id replaces the
    /// previous entry.
    pub async fn add(
        &self,
        conn_id: String,
        document_id: DocumentId,
    ) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = WsConnection {
            document_id,
            sender: tx,
            connected_at: chrono::Utc::now(),
        };
        self.connections.write().await.insert(conn_id, conn);
        rx
    }

    pub async fn remove(&self, conn_id: &str) {
        self.connections.write().await.remove(conn_id);
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Number of connections bridged onto `document_id`.
    pub async fn count_for_document(&self, document_id: &DocumentId) -> usize {
        self.connections
            .read()
            .await
            .values()
            .filter(|conn| &conn.document_id == document_id)
            .count()
    }

    /// Send a Close frame to every connection, then clear the map.
    pub async fn shutdown_all(&self) {
        let mut conns = self.connections.write().await;
        let count = conns.len();
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Close(None));
        }
        conns.clear();
        tracing::info!(count, "Closed all relay connections");
    }

    /// Send a Ping frame to every connection.
    pub async fn ping_all(&self) {
        let conns = self.connections.read().await;
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Ping(Bytes::new()));
        }
    }
}

impl Default for WsManager {
    fn default() -> Self {
        Self::new()
    }
}
