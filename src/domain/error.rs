use {crate::domain::id::IntegrationId, crate::domain::id::WebhookEventId, thiserror::Error};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("invalid webhook signature")]
    InvalidSignature,

    #[error("stale or invalid event timestamp: {0}")]
    StaleOrInvalidTimestamp(String),

    #[error("integration not found: {0}")]
    IntegrationNotFound(IntegrationId),

    #[error("integration inactive: {0}")]
    IntegrationInactive(IntegrationId),

    #[error("webhook event not found: {0}")]
    EventNotFound(WebhookEventId),

    #[error("webhook event {event_id} exhausted {max_retries} retries")]
    MaxRetriesExceeded {
        event_id: WebhookEventId,
        max_retries: u32,
    },

    #[error("handler timed out after {0}s")]
    HandlerTimeout(u64),

    #[error("queue: {0}")]
    Queue(String),

    #[error("database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PipelineError {
    /// Errors caused by the inbound request rather than by this service.
    /// They are returned to the caller and never retried.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::InvalidSignature
                | Self::StaleOrInvalidTimestamp(_)
                | Self::IntegrationNotFound(_)
                | Self::IntegrationInactive(_)
        )
    }
}
