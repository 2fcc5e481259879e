//! Streaming `spawn` over a WebSocket.
//!
//! Protocol: the client sends one [`SpawnRequest`] text frame; the server
//! answers with one [`StreamFrame`] per process event, ends with exactly one
//! `exit` or `error` frame, then closes the socket.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use ksu_bridge_core::{HostRuntime, OutputChannel, ProcessEvent, SpawnOptions};
use serde::{Deserialize, Serialize};

use crate::handlers::host::validate_command;
use crate::middleware::auth::RequireToken;
use crate::state::AppState;

/// First (and only) frame a client sends on the spawn socket.
#[derive(Debug, Deserialize)]
pub struct SpawnRequest {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub options: SpawnOptions,
}

/// Frame pushed to the client for each process event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StreamFrame {
    Data { channel: OutputChannel, data: String },
    Exit { code: i32 },
    Error { message: String },
}

impl StreamFrame {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Data { .. })
    }
}

impl From<ProcessEvent> for StreamFrame {
    fn from(event: ProcessEvent) -> Self {
        match event {
            ProcessEvent::Data { channel, data } => Self::Data { channel, data },
            ProcessEvent::Exit { code } => Self::Exit { code },
            ProcessEvent::Error { cause } => Self::Error {
                message: cause.to_string(),
            },
        }
    }
}

/// GET /api/v1/spawn
pub async fn spawn_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    _auth: RequireToken,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_spawn(socket, state.host))
}

async fn handle_spawn(mut socket: WebSocket, host: Arc<dyn HostRuntime>) {
    let request = match read_request(&mut socket).await {
        Some(Ok(request)) => request,
        Some(Err(message)) => {
            tracing::debug!(error = %message, "Rejected spawn request");
            let _ = send_frame(&mut socket, &StreamFrame::Error { message }).await;
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
        // Client left before asking for anything.
        None => return,
    };

    tracing::info!(command = %request.command, args = ?request.args, "Spawning process for client");
    let mut child = host.spawn(&request.command, &request.args, request.options);
    let pid = child.pid();

    let mut client_open = true;
    loop {
        tokio::select! {
            event = child.next_event() => {
                let Some(event) = event else { break };
                let frame = StreamFrame::from(event);
                let terminal = frame.is_terminal();
                if client_open && send_frame(&mut socket, &frame).await.is_err() {
                    tracing::debug!(?pid, "Spawn client went away, draining process output");
                    client_open = false;
                }
                if terminal {
                    tracing::debug!(?pid, ?frame, "Process finished");
                    break;
                }
            }
            inbound = socket.recv(), if client_open => {
                match inbound {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => {
                        // No cancellation: the process keeps running, we
                        // just stop forwarding.
                        tracing::debug!(?pid, "Spawn client closed the socket");
                        client_open = false;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    if client_open {
        let _ = socket.send(Message::Close(None)).await;
    }
}

/// Wait for the request frame. `None` means the socket closed first.
async fn read_request(socket: &mut WebSocket) -> Option<Result<SpawnRequest, String>> {
    while let Some(message) = socket.recv().await {
        match message {
            Ok(Message::Text(text)) => return Some(parse_request(text.as_str())),
            Ok(Message::Binary(bytes)) => {
                return Some(match std::str::from_utf8(&bytes) {
                    Ok(text) => parse_request(text),
                    Err(_) => Err("spawn request must be UTF-8 JSON".to_string()),
                })
            }
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
        }
    }
    None
}

fn parse_request(raw: &str) -> Result<SpawnRequest, String> {
    let request: SpawnRequest =
        serde_json::from_str(raw).map_err(|e| format!("invalid spawn request: {e}"))?;
    validate_command(&request.command).map_err(|e| e.to_string())?;
    Ok(request)
}

async fn send_frame(socket: &mut WebSocket, frame: &StreamFrame) -> Result<(), axum::Error> {
    let json = serde_json::to_string(frame).map_err(axum::Error::new)?;
    socket.send(Message::Text(json.into())).await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
