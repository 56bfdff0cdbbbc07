//! WebSocket client transport for the lock relay.
//!
//! [`WsTransport`] implements the broadcast [`Transport`](pagelock_events::Transport)
//! over one relay connection per subscribed topic, reconnecting with
//! exponential backoff and signalling [`TransportEvent::Reconnected`](pagelock_events::TransportEvent)
//! so the coordinator can resynchronize.

pub mod client;
pub mod reconnect;
pub mod transport;

pub use client::{ClientError, RelayClient, RelayConnection};
pub use reconnect::ReconnectConfig;
pub use transport::WsTransport;
