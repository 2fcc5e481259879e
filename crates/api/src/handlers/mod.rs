//! Request handlers for the host capability surface.
//!
//! Handlers delegate to the [`HostRuntime`](ksu_bridge_core::HostRuntime)
//! held in [`AppState`](crate::state::AppState) and map request errors via
//! [`AppError`](crate::error::AppError).

pub mod host;
