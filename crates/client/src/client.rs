//! Connection setup for the lock relay.
//!
//! [`RelayClient`] holds the relay base URL. Call
//! [`RelayClient::connect`] to open a live [`RelayConnection`] bridged onto
//! one document's lock topic.

use pagelock_core::DocumentId;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

pub type RelayStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Configuration handle for one relay server.
#[derive(Debug, Clone)]
pub struct RelayClient {
    base_url: String,
}

/// A live WebSocket connection to the relay for one document.
pub struct RelayConnection {
    pub document_id: DocumentId,
    pub ws_stream: RelayStream,
}

impl RelayClient {
    /// `base_url` is the relay's WebSocket root, e.g. `ws://host:3000`.
    /// A trailing slash is ignored.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Endpoint for `document_id`'s lock topic.
    pub fn document_url(&self, document_id: &DocumentId) -> String {
        format!("{}/ws/documents/{}", self.base_url, document_id)
    }

    pub async fn connect(&self, document_id: &DocumentId) -> Result<RelayConnection, ClientError> {
        let url = self.document_url(document_id);

        let (ws_stream, _response) = connect_async(url.as_str())
            .await
            .map_err(|e| ClientError::Connection(format!("Failed to connect to relay at {url}: {e}")))?;

        tracing::info!(document_id = %document_id, url = %url, "Connected to lock relay");

        Ok(RelayConnection {
            document_id: document_id.clone(),
            ws_stream,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Failed to establish the WebSocket connection.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A protocol-level error on an established connection.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_url_joins_base_and_id() {
        let client = RelayClient::new("ws://relay.test:3000/");
        assert_eq!(
            client.document_url(&DocumentId::from("landing")),
            "ws://relay.test:3000/ws/documents/landing"
        );
    }

    #[tokio::test]
    async fn connect_to_closed_port_fails() {
        let client = RelayClient::new("ws://127.0.0.1:1");
        let result = client.connect(&DocumentId::from("landing")).await;
        assert!(matches!(result, Err(ClientError::Connection(_))));
    }
}
