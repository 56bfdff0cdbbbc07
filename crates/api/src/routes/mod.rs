pub mod documents;
pub mod health;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the relay route tree.
///
/// ```text
/// /health                          service health
/// /documents                       active lock topics
/// /documents/{document_id}         one topic's subscribers
/// /ws/documents/{document_id}      WebSocket bridge onto the lock topic
/// ```
pub fn relay_routes() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(documents::router())
        .route("/ws/documents/{document_id}", get(ws::ws_handler))
}
