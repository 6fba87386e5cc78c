mod routes;
mod websocket;

pub use routes::{ApiError, api_routes};
pub use websocket::{Connection, ConnectionRegistry, WsConfig, ws_handler};

use crate::session::SessionManager;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub session_manager: Arc<SessionManager>,
    pub connections: ConnectionRegistry,
    pub ws_config: Arc<WsConfig>,
}

impl AppState {
    pub fn new(session_manager: Arc<SessionManager>) -> Self {
        Self {
            session_manager,
            connections: Arc::new(RwLock::new(HashMap::new())),
            ws_config: Arc::new(WsConfig::default()),
        }
    }

    pub fn with_ws_config(mut self, ws_config: WsConfig) -> Self {
        self.ws_config = Arc::new(ws_config);
        self
    }

    /// (active sessions, open WebSocket connections)
    pub async fn get_stats(&self) -> (usize, usize) {
        let sessions = self.session_manager.session_count();
        let connections = self.connections.read().await.len();
        (sessions, connections)
    }
}
