//! WebSocket infrastructure.
//!
//! Provides connection management and heartbeat monitoring for the
//! presentation-event socket, plus the per-process streaming socket used by
//! `spawn`.

mod handler;
mod heartbeat;
pub mod manager;
pub mod spawn;

pub use handler::ws_handler;
pub use heartbeat::start_heartbeat;
pub use manager::WsManager;
pub use spawn::{spawn_handler, StreamFrame};
