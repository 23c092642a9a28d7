//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is shared via `Arc<EventBus>`; publishers never block and
//! never fail when nobody is listening.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Event names published by the service.
pub mod event_types {
    pub const RULE_UPDATED: &str = "rule.updated";
    pub const CALCULATION_CREATED: &str = "calculation.created";
    pub const CALCULATION_STATUS_CHANGED: &str = "calculation.status_changed";
    pub const CALCULATION_ACTUAL_RECORDED: &str = "calculation.actual_recorded";
    pub const VALIDATION_COMPLETED: &str = "validation.completed";
}

// ---------------------------------------------------------------------------
// PlatformEvent
// ---------------------------------------------------------------------------

/// A domain event, built with [`PlatformEvent::new`] and the `with_*`
/// builder methods.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformEvent {
    /// Dot-separated event name, e.g. `"validation.completed"`.
    pub event_type: String,

    /// Source entity kind (e.g. `"rebate_calculation"`).
    pub source_entity_type: Option<String>,

    pub source_entity_id: Option<String>,

    /// Identifier of the actor that triggered the event.
    pub actor: Option<String>,

    pub payload: serde_json::Value,

    pub timestamp: DateTime<Utc>,
}

impl PlatformEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            source_entity_type: None,
            source_entity_id: None,
            actor: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    pub fn with_source(
        mut self,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
    ) -> Self {
        self.source_entity_type = Some(entity_type.into());
        self.source_entity_id = Some(entity_id.into());
        self
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

pub struct EventBus {
    sender: broadcast::Sender<PlatformEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity. Slow receivers that
    /// fall more than `capacity` events behind observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, event: PlatformEvent) {
        // SendError only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlatformEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(
            PlatformEvent::new(event_types::CALCULATION_STATUS_CHANGED)
                .with_source("rebate_calculation", "calc-001")
                .with_actor("analyst-1")
                .with_payload(serde_json::json!({ "from": "calculated", "to": "paid" })),
        );

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(received.event_type, "calculation.status_changed");
        assert_eq!(received.source_entity_type.as_deref(), Some("rebate_calculation"));
        assert_eq!(received.source_entity_id.as_deref(), Some("calc-001"));
        assert_eq!(received.actor.as_deref(), Some("analyst-1"));
        assert_eq!(received.payload["to"], "paid");
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(PlatformEvent::new(event_types::RULE_UPDATED));

        assert_eq!(rx1.recv().await.unwrap().event_type, "rule.updated");
        assert_eq!(rx2.recv().await.unwrap().event_type, "rule.updated");
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        EventBus::default().publish(PlatformEvent::new("orphan.event"));
    }

    #[test]
    fn bare_event_has_empty_optional_fields() {
        let event = PlatformEvent::new("bare.event");
        assert!(event.source_entity_type.is_none());
        assert!(event.source_entity_id.is_none());
        assert!(event.actor.is_none());
        assert!(event.payload.is_object());
    }
}
