//! Presentation event bus for the host bridge.
//!
//! - [`EventBus`] — in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`. It implements
//!   [`PresentationSink`](ksu_bridge_core::PresentationSink), so a
//!   [`LocalHost`](ksu_bridge_core::LocalHost) can publish full-screen and
//!   toast requests straight onto it.
//! - [`HostEvent`] — the event envelope pushed to connected web clients.

pub mod bus;

pub use bus::{EventBus, HostEvent, HostEventKind};
