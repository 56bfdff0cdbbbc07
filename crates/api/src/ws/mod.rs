//! WebSocket relay: connection bookkeeping, heartbeat pings, and the
//! upgrade handler that bridges editors onto hub topics.

mod handler;
mod heartbeat;
pub mod manager;

pub use handler::ws_handler;
pub use heartbeat::start_heartbeat;
pub use manager::WsManager;
