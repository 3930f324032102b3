//! Publishes domain events to NATS when a connection is configured.

use crate::domain::events::DomainEvent;

#[derive(Clone, Default)]
pub struct EventPublisher {
    nats: Option<async_nats::Client>,
}

impl EventPublisher {
    pub fn new(nats: Option<async_nats::Client>) -> Self { Self { nats } }

    /// Delivery is best effort: failures are logged and never fail the request.
    pub async fn publish(&self, events: Vec<DomainEvent>) {
        let Some(client) = &self.nats else {
            for event in &events { tracing::debug!(subject = event.subject(), "event not published, NATS disabled"); }
            return;
        };
        for event in events {
            let payload = match serde_json::to_vec(&event) {
                Ok(p) => p,
                Err(e) => { tracing::warn!(error = %e, "failed to encode event"); continue; }
            };
            if let Err(e) = client.publish(event.subject().to_string(), payload.into()).await {
                tracing::warn!(subject = event.subject(), error = %e, "failed to publish event");
            }
        }
    }
}
