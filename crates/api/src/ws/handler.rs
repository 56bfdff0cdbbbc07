use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use pagelock_core::protocol::{parse_message, validate_identifier};
use pagelock_core::{DocumentId, Topic};
use pagelock_events::{Subscription, Transport, TransportEvent};

use crate::error::AppResult;
use crate::state::AppState;

/// GET /ws/documents/{document_id} -- bridge an editor onto the document's
/// lock topic.
///
/// The document id is validated before the upgrade so a bad id gets a
/// plain 400 instead of a socket that closes immediately.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(document_id): Path<String>,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    validate_identifier("document_id", &document_id)?;
    let document_id = DocumentId::from(document_id);

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, document_id)))
}

/// Relay one connection until either side closes.
///
///   1. Subscribes to the document topic on the shared hub.
///   2. Spawns a sender task that writes hub deliveries (as JSON text) and
///      manager control frames (ping, close) to the socket.
///   3. Parses inbound text frames and publishes them on the hub.
///   4. Unsubscribes and deregisters on disconnect.
async fn handle_socket(socket: WebSocket, state: AppState, document_id: DocumentId) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    let topic = Topic::for_document(&document_id);

    let Subscription {
        handle,
        mut inbound,
    } = match state.hub.subscribe(&topic).await {
        Ok(subscription) => subscription,
        Err(e) => {
            tracing::warn!(conn_id = %conn_id, topic = %topic, error = %e, "Hub subscription failed");
            return;
        }
    };
    let mut control = state.ws_manager.add(conn_id.clone(), document_id).await;
    tracing::info!(conn_id = %conn_id, topic = %topic, "Relay connection opened");

    let (mut sink, mut stream) = socket.split();

    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        loop {
            let frame = tokio::select! {
                msg = control.recv() => match msg {
                    Some(msg) => msg,
                    None => break,
                },
                event = inbound.recv() => match event {
                    Some(TransportEvent::Message(message)) => match message.to_json() {
                        Ok(text) => Message::Text(text.into()),
                        Err(e) => {
                            tracing::warn!(conn_id = %sender_conn_id, error = %e, "Failed to encode lock message");
                            continue;
                        }
                    },
                    // The hub never reconnects.
                    Some(TransportEvent::Reconnected) => continue,
                    None => break,
                },
            };
            let closing = matches!(frame, Message::Close(_));
            if sink.send(frame).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
            if closing {
                break;
            }
        }
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(text)) => match parse_message(text.as_str()) {
                Ok(message) => {
                    tracing::trace!(conn_id = %conn_id, kind = message.kind(), "Relaying lock message");
                    if let Err(e) = state.hub.publish(&handle, message).await {
                        tracing::warn!(conn_id = %conn_id, error = %e, "Hub publish failed");
                    }
                }
                Err(e) => {
                    tracing::warn!(conn_id = %conn_id, error = %e, "Dropping malformed frame");
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    state.hub.unsubscribe(&handle).await;
    state.ws_manager.remove(&conn_id).await;
    send_task.abort();
    tracing::info!(conn_id = %conn_id, topic = %topic, "Relay connection closed");
}
