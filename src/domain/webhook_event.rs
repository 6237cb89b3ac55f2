use {
    super::error::PipelineError,
    super::event_type::WebhookEventType,
    super::id::{ExternalEventId, IntegrationId, WebhookEventId},
    super::integration::Integration,
    super::priority::Priority,
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    std::fmt,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WebhookStatus {
    Received,
    Queued,
    Processing,
    Completed,
    Failed,
    Retrying,
}

impl WebhookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "RECEIVED",
            Self::Queued => "QUEUED",
            Self::Processing => "PROCESSING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Retrying => "RETRYING",
        }
    }

    /// No automatic transition leaves a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for WebhookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for WebhookStatus {
    type Error = PipelineError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.to_ascii_uppercase().as_str() {
            "RECEIVED" => Ok(Self::Received),
            "QUEUED" => Ok(Self::Queued),
            "PROCESSING" => Ok(Self::Processing),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            "RETRYING" => Ok(Self::Retrying),
            other => Err(PipelineError::Validation(format!(
                "unknown webhook status: {other}"
            ))),
        }
    }
}

/// One inbound delivery and its processing lifecycle.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookEvent {
    pub id: WebhookEventId,
    pub integration_id: IntegrationId,
    pub event_type: WebhookEventType,
    pub external_event_id: ExternalEventId,
    pub status: WebhookStatus,
    pub priority: Priority,
    pub retry_count: u32,
    pub last_retry_at: Option<DateTime<Utc>>,
    pub received_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    /// The `event.data` object, kept so the job can be rebuilt for retries.
    pub payload: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

pub struct NewWebhookEventParams {
    pub integration_id: IntegrationId,
    pub event_type: WebhookEventType,
    pub external_event_id: ExternalEventId,
    pub priority: Priority,
    pub payload: serde_json::Value,
}

/// For INSERT. The id is generated in Rust via Uuid::now_v7().
#[derive(Debug, Clone)]
pub struct NewWebhookEvent {
    id: WebhookEventId,
    integration_id: IntegrationId,
    event_type: WebhookEventType,
    external_event_id: ExternalEventId,
    priority: Priority,
    payload: serde_json::Value,
    received_at: DateTime<Utc>,
}

impl NewWebhookEvent {
    pub fn new(p: NewWebhookEventParams) -> Self {
        Self {
            id: WebhookEventId::generate(),
            integration_id: p.integration_id,
            event_type: p.event_type,
            external_event_id: p.external_event_id,
            priority: p.priority,
            payload: p.payload,
            received_at: Utc::now(),
        }
    }

    pub fn id(&self) -> WebhookEventId {
        self.id
    }

    pub fn integration_id(&self) -> IntegrationId {
        self.integration_id
    }

    pub fn event_type(&self) -> WebhookEventType {
        self.event_type
    }

    pub fn external_event_id(&self) -> &ExternalEventId {
        &self.external_event_id
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    /// The row as it looks right after insertion.
    pub fn into_event(self) -> WebhookEvent {
        WebhookEvent {
            id: self.id,
            integration_id: self.integration_id,
            event_type: self.event_type,
            external_event_id: self.external_event_id,
            status: WebhookStatus::Received,
            priority: self.priority,
            retry_count: 0,
            last_retry_at: None,
            received_at: self.received_at,
            processed_at: None,
            error: None,
            payload: self.payload,
            updated_at: self.received_at,
        }
    }
}

/// Outcome of a failed attempt, decided by the persistence layer so the
/// increment and the status change land together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Attempt recorded; another will be scheduled.
    Retrying { retry_count: u32 },
    /// Retry budget exhausted; the event is terminal.
    Failed { retry_count: u32 },
}

impl FailureOutcome {
    pub fn decide(retry_count_after: u32, max_retries: u32) -> Self {
        if retry_count_after < max_retries {
            Self::Retrying {
                retry_count: retry_count_after,
            }
        } else {
            Self::Failed {
                retry_count: retry_count_after.min(max_retries),
            }
        }
    }

    pub fn status(&self) -> WebhookStatus {
        match self {
            Self::Retrying { .. } => WebhookStatus::Retrying,
            Self::Failed { .. } => WebhookStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IntegrationSummary {
    pub id: IntegrationId,
    pub organization_id: String,
    pub active: bool,
}

/// Read model returned to operators and support tooling.
#[derive(Debug, Clone, Serialize)]
pub struct EventStatusView {
    pub id: WebhookEventId,
    pub event_type: WebhookEventType,
    pub status: WebhookStatus,
    pub received_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub retry_count: u32,
    pub error: Option<String>,
    pub integration: Option<IntegrationSummary>,
}

impl EventStatusView {
    pub fn new(event: &WebhookEvent, integration: Option<&Integration>) -> Self {
        Self {
            id: event.id,
            event_type: event.event_type,
            status: event.status,
            received_at: event.received_at,
            processed_at: event.processed_at,
            retry_count: event.retry_count,
            error: event.error.clone(),
            integration: integration.map(|i| IntegrationSummary {
                id: i.id,
                organization_id: i.organization_id.clone(),
                active: i.active,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_outcome_respects_budget() {
        assert_eq!(
            FailureOutcome::decide(1, 5),
            FailureOutcome::Retrying { retry_count: 1 }
        );
        assert_eq!(
            FailureOutcome::decide(4, 5),
            FailureOutcome::Retrying { retry_count: 4 }
        );
        assert_eq!(
            FailureOutcome::decide(5, 5),
            FailureOutcome::Failed { retry_count: 5 }
        );
        assert_eq!(
            FailureOutcome::decide(9, 5),
            FailureOutcome::Failed { retry_count: 5 }
        );
    }

    #[test]
    fn status_roundtrip_and_terminal() {
        for s in [
            WebhookStatus::Received,
            WebhookStatus::Queued,
            WebhookStatus::Processing,
            WebhookStatus::Completed,
            WebhookStatus::Failed,
            WebhookStatus::Retrying,
        ] {
            assert_eq!(WebhookStatus::try_from(s.as_str()).unwrap(), s);
        }
        assert!(WebhookStatus::Completed.is_terminal());
        assert!(WebhookStatus::Failed.is_terminal());
        assert!(!WebhookStatus::Retrying.is_terminal());
    }
}
