//! [`Transport`] over relay WebSockets.
//!
//! Each subscription owns one connection, driven by a pump task that writes
//! queued outbound messages and forwards inbound frames. When the socket
//! drops, the pump reconnects with backoff and reports
//! [`TransportEvent::Reconnected`]; outbound messages queued meanwhile are
//! sent once the new connection is up.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use pagelock_core::protocol::parse_message;
use pagelock_core::{DocumentId, LockMessage, Topic};
use pagelock_events::{
    SubscriberId, Subscription, SubscriptionHandle, Transport, TransportError, TransportEvent,
};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::client::{ClientError, RelayClient, RelayStream};
use crate::reconnect::{reestablish, ReconnectConfig};

struct Pump {
    outbound: mpsc::UnboundedSender<LockMessage>,
    cancel: CancellationToken,
}

/// WebSocket transport to a lock relay.
pub struct WsTransport {
    client: RelayClient,
    reconnect: ReconnectConfig,
    pumps: Mutex<HashMap<SubscriberId, Pump>>,
}

impl WsTransport {
    pub fn new(base_url: impl Into<String>, reconnect: ReconnectConfig) -> Self {
        Self {
            client: RelayClient::new(base_url),
            reconnect,
            pumps: Mutex::new(HashMap::new()),
        }
    }

    /// Number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.pumps.lock().map_or(0, |pumps| pumps.len())
    }

    fn pumps(&self) -> Result<std::sync::MutexGuard<'_, HashMap<SubscriberId, Pump>>, TransportError> {
        self.pumps
            .lock()
            .map_err(|_| TransportError::Protocol("subscription table poisoned".into()))
    }
}

impl From<ClientError> for TransportError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Connection(msg) => TransportError::Connection(msg),
            ClientError::Protocol(msg) => TransportError::Protocol(msg),
        }
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn subscribe(&self, topic: &Topic) -> Result<Subscription, TransportError> {
        let document_id = topic.document_id()?;
        let conn = self.client.connect(&document_id).await?;

        let handle = SubscriptionHandle {
            id: SubscriberId::new(),
            topic: topic.clone(),
        };
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        tokio::spawn(run_pump(PumpTask {
            client: self.client.clone(),
            reconnect: self.reconnect.clone(),
            document_id,
            stream: conn.ws_stream,
            outbound: outbound_rx,
            inbound: inbound_tx,
            cancel: cancel.clone(),
        }));

        self.pumps()?.insert(
            handle.id,
            Pump {
                outbound: outbound_tx,
                cancel,
            },
        );
        tracing::debug!(topic = %topic, subscriber = %handle.id, "Relay subscription opened");

        Ok(Subscription { handle, inbound })
    }

    async fn publish(
        &self,
        handle: &SubscriptionHandle,
        message: LockMessage,
    ) -> Result<(), TransportError> {
        let pumps = self.pumps()?;
        let pump = pumps.get(&handle.id).ok_or(TransportError::Closed(handle.id))?;
        pump.outbound
            .send(message)
            .map_err(|_| TransportError::Closed(handle.id))
    }

    async fn unsubscribe(&self, handle: &SubscriptionHandle) {
        let removed = match self.pumps() {
            Ok(mut pumps) => pumps.remove(&handle.id),
            Err(e) => {
                tracing::warn!(subscriber = %handle.id, error = %e, "Unsubscribe failed");
                None
            }
        };
        if let Some(pump) = removed {
            pump.cancel.cancel();
            tracing::debug!(topic = %handle.topic, subscriber = %handle.id, "Relay subscription closed");
        }
    }
}

struct PumpTask {
    client: RelayClient,
    reconnect: ReconnectConfig,
    document_id: DocumentId,
    stream: RelayStream,
    outbound: mpsc::UnboundedReceiver<LockMessage>,
    inbound: mpsc::UnboundedSender<TransportEvent>,
    cancel: CancellationToken,
}

enum PumpExit {
    /// Unsubscribed, or the subscriber dropped its receiver.
    Stopped,
    /// The socket closed or failed; reconnect.
    Disconnected,
}

async fn run_pump(mut task: PumpTask) {
    loop {
        match drive(&mut task).await {
            PumpExit::Stopped => {
                let _ = task.stream.close(None).await;
                return;
            }
            PumpExit::Disconnected => {
                tracing::warn!(document_id = %task.document_id, "Relay connection lost");
            }
        }

        let Some(conn) =
            reestablish(&task.client, &task.document_id, &task.reconnect, &task.cancel).await
        else {
            return;
        };
        task.stream = conn.ws_stream;
        if task.inbound.send(TransportEvent::Reconnected).is_err() {
            let _ = task.stream.close(None).await;
            return;
        }
    }
}

async fn drive(task: &mut PumpTask) -> PumpExit {
    loop {
        tokio::select! {
            _ = task.cancel.cancelled() => return PumpExit::Stopped,

            message = task.outbound.recv() => {
                let Some(message) = message else {
                    return PumpExit::Stopped;
                };
                let text = match message.to_json() {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(kind = message.kind(), error = %e, "Failed to encode lock message");
                        continue;
                    }
                };
                if let Err(e) = task.stream.send(Message::Text(text)).await {
                    tracing::warn!(document_id = %task.document_id, error = %e, "Relay send failed");
                    return PumpExit::Disconnected;
                }
            }

            frame = task.stream.next() => match frame {
                Some(Ok(Message::Text(text))) => match parse_message(&text) {
                    Ok(message) => {
                        if task.inbound.send(TransportEvent::Message(message)).is_err() {
                            return PumpExit::Stopped;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(document_id = %task.document_id, error = %e, "Dropping malformed frame");
                    }
                },
                Some(Ok(Message::Close(_))) | None => return PumpExit::Disconnected,
                // Pings are answered by tungstenite.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    let err = ClientError::Protocol(e.to_string());
                    tracing::warn!(document_id = %task.document_id, error = %err, "Relay receive failed");
                    return PumpExit::Disconnected;
                }
            },
        }
    }
}
