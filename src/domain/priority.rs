use {
    super::{error::PipelineError, event_type::WebhookEventType},
    serde::{Deserialize, Serialize},
    std::fmt,
};

/// Dispatch priority. Lower value is served first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Priority {
    Critical = 1,
    High = 2,
    Normal = 3,
    Low = 4,
}

impl Priority {
    pub fn value(self) -> u8 {
        self as u8
    }
}

impl From<Priority> for u8 {
    fn from(p: Priority) -> u8 {
        p.value()
    }
}

impl TryFrom<u8> for Priority {
    type Error = PipelineError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            1 => Ok(Self::Critical),
            2 => Ok(Self::High),
            3 => Ok(Self::Normal),
            4 => Ok(Self::Low),
            other => Err(PipelineError::Validation(format!(
                "priority must be 1..=4, got: {other}"
            ))),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

pub fn classify(event_type: WebhookEventType) -> Priority {
    use WebhookEventType::*;
    match event_type {
        TransactionStatusChanged => Priority::Critical,
        TransactionCreated | TransactionUpdated | ClosingScheduled | ClosingCompleted => {
            Priority::High
        }
        DocumentUploaded | DocumentUpdated | DocumentDeleted | TaskCreated | TaskCompleted => {
            Priority::Normal
        }
        ContactCreated | ContactUpdated | ContactDeleted => Priority::Low,
    }
}
