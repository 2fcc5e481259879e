//! Delivery of presentation events to web clients.
//!
//! The [`PresentationRouter`] subscribes to the event bus and pushes every
//! full-screen and toast event to all connected presentation sockets.

pub mod router;

pub use router::PresentationRouter;
