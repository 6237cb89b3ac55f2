use {
    super::error::PipelineError,
    serde::{Deserialize, Serialize},
    std::fmt,
};

/// Event types delivered by SoftPro 360.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WebhookEventType {
    TransactionCreated,
    TransactionUpdated,
    TransactionStatusChanged,
    DocumentUploaded,
    DocumentUpdated,
    DocumentDeleted,
    ContactCreated,
    ContactUpdated,
    ContactDeleted,
    TaskCreated,
    TaskCompleted,
    ClosingScheduled,
    ClosingCompleted,
}

impl WebhookEventType {
    pub const ALL: [Self; 13] = [
        Self::TransactionCreated,
        Self::TransactionUpdated,
        Self::TransactionStatusChanged,
        Self::DocumentUploaded,
        Self::DocumentUpdated,
        Self::DocumentDeleted,
        Self::ContactCreated,
        Self::ContactUpdated,
        Self::ContactDeleted,
        Self::TaskCreated,
        Self::TaskCompleted,
        Self::ClosingScheduled,
        Self::ClosingCompleted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TransactionCreated => "TRANSACTION_CREATED",
            Self::TransactionUpdated => "TRANSACTION_UPDATED",
            Self::TransactionStatusChanged => "TRANSACTION_STATUS_CHANGED",
            Self::DocumentUploaded => "DOCUMENT_UPLOADED",
            Self::DocumentUpdated => "DOCUMENT_UPDATED",
            Self::DocumentDeleted => "DOCUMENT_DELETED",
            Self::ContactCreated => "CONTACT_CREATED",
            Self::ContactUpdated => "CONTACT_UPDATED",
            Self::ContactDeleted => "CONTACT_DELETED",
            Self::TaskCreated => "TASK_CREATED",
            Self::TaskCompleted => "TASK_COMPLETED",
            Self::ClosingScheduled => "CLOSING_SCHEDULED",
            Self::ClosingCompleted => "CLOSING_COMPLETED",
        }
    }
}

impl fmt::Display for WebhookEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for WebhookEventType {
    type Error = PipelineError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| PipelineError::Validation(format!("unknown event type: {s}")))
    }
}
