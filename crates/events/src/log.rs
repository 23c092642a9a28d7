//! Event sink for deployments without a database.

use tokio::sync::broadcast;

use crate::bus::PlatformEvent;

/// Background task that records every event as a structured log line.
pub struct EventLog;

impl EventLog {
    /// Run until the bus closes. Returns the number of events logged.
    pub async fn run(mut receiver: broadcast::Receiver<PlatformEvent>) -> u64 {
        let mut logged = 0;
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    tracing::info!(
                        event_type = %event.event_type,
                        source_entity_type = event.source_entity_type.as_deref().unwrap_or("-"),
                        source_entity_id = event.source_entity_id.as_deref().unwrap_or("-"),
                        actor = event.actor.as_deref().unwrap_or("-"),
                        payload = %event.payload,
                        "Platform event"
                    );
                    logged += 1;
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Event log lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        logged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventBus;

    #[tokio::test]
    async fn logs_until_bus_is_dropped() {
        let bus = EventBus::default();
        let handle = tokio::spawn(EventLog::run(bus.subscribe()));

        bus.publish(PlatformEvent::new("a.one"));
        bus.publish(PlatformEvent::new("a.two"));
        drop(bus);

        assert_eq!(handle.await.unwrap(), 2);
    }
}
