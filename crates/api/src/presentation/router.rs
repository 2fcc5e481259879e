//! Event-to-socket routing.

use std::sync::Arc;

use axum::extract::ws::Message;
use ksu_bridge_events::HostEvent;
use tokio::sync::broadcast;

use crate::ws::WsManager;

/// Forwards bus events to every presentation WebSocket.
pub struct PresentationRouter {
    ws_manager: Arc<WsManager>,
}

impl PresentationRouter {
    pub fn new(ws_manager: Arc<WsManager>) -> Self {
        Self { ws_manager }
    }

    /// Run the main routing loop.
    ///
    /// The loop exits when the channel is closed (i.e. the
    /// [`EventBus`](ksu_bridge_events::EventBus) is dropped).
    pub async fn run(self, mut receiver: broadcast::Receiver<HostEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => self.route_event(&event).await,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Presentation router lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, presentation router shutting down");
                    break;
                }
            }
        }
    }

    async fn route_event(&self, event: &HostEvent) {
        let json = match serde_json::to_string(event) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, event_type = event.event_type(), "Failed to serialize event");
                return;
            }
        };
        let delivered = self.ws_manager.broadcast(Message::Text(json.into())).await;
        tracing::debug!(event_type = event.event_type(), delivered, "Presentation event routed");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
