//! Panel notifications for host code.
//!
//! Controllers broadcast [`PanelEvent`]s so the host can re-layout the grid,
//! re-run widgets inside freshly loaded content, or log transitions.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Notification emitted by a panel or its tabs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum PanelEvent {
    /// Open transition started
    Opening { entity: String, record_id: i64 },
    /// Open transition finished
    Opened { entity: String, record_id: i64 },
    /// Close transition started
    Closing { entity: String, record_id: i64 },
    /// Close transition finished
    Closed { entity: String },
    /// Dependent layout (grid column visibility) should be recomputed
    LayoutChanged { panel_open: bool },
    /// Detail payload applied to the region
    DataLoaded { entity: String, record_id: i64 },
    /// Detail fetch failed (not sent for cancellations)
    FetchFailed {
        entity: String,
        record_id: i64,
        message: String,
    },
    /// A tab became active
    TabActivated { tab: String },
    /// A deferred tab finished loading
    TabLoaded { tab: String },
    /// A deferred tab failed to load
    TabLoadFailed { tab: String, message: String },
}

impl PanelEvent {
    /// Get the event type name.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Opening { .. } => "opening",
            Self::Opened { .. } => "opened",
            Self::Closing { .. } => "closing",
            Self::Closed { .. } => "closed",
            Self::LayoutChanged { .. } => "layout_changed",
            Self::DataLoaded { .. } => "data_loaded",
            Self::FetchFailed { .. } => "fetch_failed",
            Self::TabActivated { .. } => "tab_activated",
            Self::TabLoaded { .. } => "tab_loaded",
            Self::TabLoadFailed { .. } => "tab_load_failed",
        }
    }
}

/// Broadcast channel for panel events.
#[derive(Debug, Clone)]
pub struct PanelEvents {
    sender: broadcast::Sender<PanelEvent>,
}

impl PanelEvents {
    /// Create a channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to panel events.
    pub fn subscribe(&self) -> broadcast::Receiver<PanelEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Send an event; having no subscribers is not an error.
    pub fn emit(&self, event: PanelEvent) {
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_shape() {
        let json = serde_json::to_value(PanelEvent::TabLoaded {
            tab: "history".into(),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"type": "tab_loaded", "data": {"tab": "history"}}));
    }

    #[tokio::test]
    async fn test_emit_and_subscribe() {
        let events = PanelEvents::new(8);
        events.emit(PanelEvent::LayoutChanged { panel_open: true });

        let mut rx = events.subscribe();
        assert_eq!(events.subscriber_count(), 1);
        events.emit(PanelEvent::Closed {
            entity: "widget".into(),
        });
        let event = rx.recv().await.unwrap();
        assert_eq!(event.type_name(), "closed");
    }
}
