//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the central publish/subscribe hub for [`HostEvent`]s.
//! It is designed to be shared via `Arc<EventBus>` across the application.

use chrono::{DateTime, Utc};
use ksu_bridge_core::PresentationSink;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// HostEvent
// ---------------------------------------------------------------------------

/// What the host asked the front end to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostEventKind {
    /// Enter (`true`) or leave (`false`) full-screen presentation.
    FullScreen { enabled: bool },
    /// Show a transient notification.
    Toast { message: String },
}

/// A presentation request published on the bus.
///
/// Serializes flat, e.g.
/// `{"type": "toast", "message": "Saved", "timestamp": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostEvent {
    #[serde(flatten)]
    pub kind: HostEventKind,

    /// When the event was created (UTC).
    pub timestamp: DateTime<Utc>,
}

impl HostEvent {
    pub fn new(kind: HostEventKind) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
        }
    }

    pub fn full_screen(enabled: bool) -> Self {
        Self::new(HostEventKind::FullScreen { enabled })
    }

    pub fn toast(message: impl Into<String>) -> Self {
        Self::new(HostEventKind::Toast {
            message: message.into(),
        })
    }

    /// Short name used in logs (`"full_screen"` / `"toast"`).
    pub fn event_type(&self) -> &'static str {
        match self.kind {
            HostEventKind::FullScreen { .. } => "full_screen",
            HostEventKind::Toast { .. } => "toast",
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

/// In-process fan-out event bus.
///
/// Wraps a [`broadcast::Sender`] so that any number of subscribers can
/// independently receive every published [`HostEvent`].
///
/// # Usage
///
/// ```rust
/// use ksu_bridge_events::bus::{EventBus, HostEvent};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(HostEvent::toast("Saved"));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<HostEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped.
    pub fn publish(&self, event: HostEvent) {
        tracing::debug!(event_type = event.event_type(), "Publishing host event");
        // Ignore the SendError — it only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<HostEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl PresentationSink for EventBus {
    fn full_screen(&self, enabled: bool) {
        self.publish(HostEvent::full_screen(enabled));
    }

    fn toast(&self, message: &str) {
        self.publish(HostEvent::toast(message));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assert_matches::assert_matches;
    use ksu_bridge_core::{HostConfig, HostRuntime, LocalHost};

    use super::*;

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(HostEvent::toast("Saved"));

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(
            received.kind,
            HostEventKind::Toast {
                message: "Saved".into()
            }
        );
        assert_eq!(received.event_type(), "toast");
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(HostEvent::full_screen(true));

        let e1 = rx1.recv().await.expect("subscriber 1 should receive");
        let e2 = rx2.recv().await.expect("subscriber 2 should receive");

        assert_eq!(e1.kind, HostEventKind::FullScreen { enabled: true });
        assert_eq!(e2.kind, e1.kind);
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        // No subscribers — this must not panic.
        bus.publish(HostEvent::toast("nobody listening"));
        PresentationSink::full_screen(&bus, false);
    }

    #[test]
    fn event_serializes_flat() {
        let json = serde_json::to_value(HostEvent::toast("Saved")).expect("serialize");
        assert_eq!(json["type"], "toast");
        assert_eq!(json["message"], "Saved");
        assert!(json["timestamp"].is_string());

        let json = serde_json::to_value(HostEvent::full_screen(false)).expect("serialize");
        assert_eq!(json["type"], "full_screen");
        assert_eq!(json["enabled"], false);
    }

    #[test]
    fn event_round_trips_through_json() {
        let raw = r#"{"type":"full_screen","enabled":true,"timestamp":"2026-01-01T00:00:00Z"}"#;
        let event: HostEvent = serde_json::from_str(raw).expect("parse");
        assert_eq!(event.kind, HostEventKind::FullScreen { enabled: true });
    }

    #[tokio::test]
    async fn local_host_publishes_presentation_requests() {
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();
        let host = LocalHost::new(HostConfig::default(), Arc::clone(&bus));

        host.toast("Saved");
        host.full_screen(true);

        assert_matches!(
            rx.recv().await.expect("toast").kind,
            HostEventKind::Toast { message } if message == "Saved"
        );
        assert_matches!(
            rx.recv().await.expect("full screen").kind,
            HostEventKind::FullScreen { enabled: true }
        );
        assert!(host.is_full_screen());
    }
}
