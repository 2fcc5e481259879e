use std::sync::Arc;

use ksu_bridge_core::HostRuntime;
use ksu_bridge_events::EventBus;

use crate::config::ServerConfig;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (read by the auth extractor).
    pub config: Arc<ServerConfig>,
    /// Command-execution backend.
    pub host: Arc<dyn HostRuntime>,
    /// WebSocket connection manager for presentation events.
    pub ws_manager: Arc<WsManager>,
    /// Bus carrying full-screen and toast events to the web clients.
    pub event_bus: Arc<EventBus>,
}
