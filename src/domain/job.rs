use {
    super::event_type::WebhookEventType,
    super::id::{ExternalEventId, IntegrationId, WebhookEventId},
    super::priority::{Priority, classify},
    super::webhook_event::WebhookEvent,
    derive_more::Display,
    serde::Serialize,
};

/// Queue-assigned job identifier, unique per queue instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Serialize)]
pub struct JobId(pub u64);

/// Unit of work handed to the worker pool.
#[derive(Debug, Clone)]
pub struct WebhookJob {
    pub event_id: WebhookEventId,
    pub integration_id: IntegrationId,
    pub external_event_id: ExternalEventId,
    pub event_type: WebhookEventType,
    pub priority: Priority,
    pub data: serde_json::Value,
}

impl WebhookJob {
    pub fn from_event(event: &WebhookEvent) -> Self {
        Self {
            event_id: event.id,
            integration_id: event.integration_id,
            external_event_id: event.external_event_id.clone(),
            event_type: event.event_type,
            // Reclassify so a changed table applies to replays too.
            priority: classify(event.event_type),
            data: event.payload.clone(),
        }
    }
}
