use std::sync::Arc;

use pagelock_events::LocalHub;

use crate::config::ServerConfig;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: everything is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Open WebSocket connections, for pings and shutdown.
    pub ws_manager: Arc<WsManager>,
    /// Topic fan-out shared by every connected editor.
    pub hub: Arc<LocalHub>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config: Arc::new(config),
            ws_manager: Arc::new(WsManager::new()),
            hub: Arc::new(LocalHub::new()),
        }
    }
}
