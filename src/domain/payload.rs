use {
    super::error::PipelineError,
    super::event_type::WebhookEventType,
    chrono::{DateTime, NaiveDate, Utc},
    serde::{Deserialize, Serialize, de::DeserializeOwned},
    serde_json::{Map, Value},
};

/// Delivery envelope: `{ event: { id, type, timestamp, data }, delivery_id, signature }`.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEnvelope {
    pub event: EnvelopeEvent,
    #[serde(default)]
    pub delivery_id: Option<String>,
    /// Some deliveries repeat the signature in the body; the header is authoritative.
    #[serde(default)]
    pub signature: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnvelopeEvent {
    pub id: String,
    #[serde(rename = "type", default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub data: Value,
}

impl WebhookEnvelope {
    pub fn parse(body: &[u8]) -> Result<Self, PipelineError> {
        serde_json::from_slice(body)
            .map_err(|e| PipelineError::Validation(format!("malformed payload: {e}")))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionData {
    pub id: String,
    #[serde(default)]
    pub file_number: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub property_address: Option<String>,
    #[serde(default)]
    pub closing_date: Option<NaiveDate>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChangeData {
    pub transaction_id: String,
    #[serde(default)]
    pub old_status: Option<String>,
    pub new_status: String,
    #[serde(default)]
    pub changed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub changed_by: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentData {
    pub id: String,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub document_type: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactData {
    pub id: String,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskData {
    pub id: String,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosingData {
    pub transaction_id: String,
    #[serde(default)]
    pub closing_date: Option<NaiveDate>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `event.data`, typed by event type. Adding an event type means adding a
/// variant here, and the compiler points at every dispatch site.
#[derive(Debug, Clone)]
pub enum EventPayload {
    TransactionCreated(TransactionData),
    TransactionUpdated(TransactionData),
    TransactionStatusChanged(StatusChangeData),
    DocumentUploaded(DocumentData),
    DocumentUpdated(DocumentData),
    DocumentDeleted(DocumentData),
    ContactCreated(ContactData),
    ContactUpdated(ContactData),
    ContactDeleted(ContactData),
    TaskCreated(TaskData),
    TaskCompleted(TaskData),
    ClosingScheduled(ClosingData),
    ClosingCompleted(ClosingData),
}

impl EventPayload {
    pub fn parse(event_type: WebhookEventType, data: &Value) -> Result<Self, PipelineError> {
        use WebhookEventType as T;

        if !data.is_object() {
            return Err(PipelineError::Validation(format!(
                "{event_type}: event.data must be an object"
            )));
        }

        let data = &canonical_keys(data, key_aliases(event_type));
        let payload = match event_type {
            T::TransactionCreated => Self::TransactionCreated(decode(event_type, data)?),
            T::TransactionUpdated => Self::TransactionUpdated(decode(event_type, data)?),
            T::TransactionStatusChanged => {
                Self::TransactionStatusChanged(decode(event_type, data)?)
            }
            T::DocumentUploaded => Self::DocumentUploaded(decode(event_type, data)?),
            T::DocumentUpdated => Self::DocumentUpdated(decode(event_type, data)?),
            T::DocumentDeleted => Self::DocumentDeleted(decode(event_type, data)?),
            T::ContactCreated => Self::ContactCreated(decode(event_type, data)?),
            T::ContactUpdated => Self::ContactUpdated(decode(event_type, data)?),
            T::ContactDeleted => Self::ContactDeleted(decode(event_type, data)?),
            T::TaskCreated => Self::TaskCreated(decode(event_type, data)?),
            T::TaskCompleted => Self::TaskCompleted(decode(event_type, data)?),
            T::ClosingScheduled => Self::ClosingScheduled(decode(event_type, data)?),
            T::ClosingCompleted => Self::ClosingCompleted(decode(event_type, data)?),
        };

        payload.check_required()?;
        Ok(payload)
    }

    pub fn event_type(&self) -> WebhookEventType {
        use WebhookEventType as T;
        match self {
            Self::TransactionCreated(_) => T::TransactionCreated,
            Self::TransactionUpdated(_) => T::TransactionUpdated,
            Self::TransactionStatusChanged(_) => T::TransactionStatusChanged,
            Self::DocumentUploaded(_) => T::DocumentUploaded,
            Self::DocumentUpdated(_) => T::DocumentUpdated,
            Self::DocumentDeleted(_) => T::DocumentDeleted,
            Self::ContactCreated(_) => T::ContactCreated,
            Self::ContactUpdated(_) => T::ContactUpdated,
            Self::ContactDeleted(_) => T::ContactDeleted,
            Self::TaskCreated(_) => T::TaskCreated,
            Self::TaskCompleted(_) => T::TaskCompleted,
            Self::ClosingScheduled(_) => T::ClosingScheduled,
            Self::ClosingCompleted(_) => T::ClosingCompleted,
        }
    }

    fn check_required(&self) -> Result<(), PipelineError> {
        let (field, value) = match self {
            Self::TransactionCreated(d) | Self::TransactionUpdated(d) => ("id", &d.id),
            Self::TransactionStatusChanged(d) => {
                not_blank(self.event_type(), "new_status", &d.new_status)?;
                ("transaction_id", &d.transaction_id)
            }
            Self::DocumentUploaded(d) | Self::DocumentUpdated(d) | Self::DocumentDeleted(d) => {
                ("id", &d.id)
            }
            Self::ContactCreated(d) | Self::ContactUpdated(d) | Self::ContactDeleted(d) => {
                ("id", &d.id)
            }
            Self::TaskCreated(d) | Self::TaskCompleted(d) => ("id", &d.id),
            Self::ClosingScheduled(d) | Self::ClosingCompleted(d) => {
                ("transaction_id", &d.transaction_id)
            }
        };
        not_blank(self.event_type(), field, value)
    }
}

/// Provider spellings of canonical keys, `(alias, canonical)`.
fn key_aliases(event_type: WebhookEventType) -> &'static [(&'static str, &'static str)] {
    use WebhookEventType as T;
    match event_type {
        T::TransactionCreated | T::TransactionUpdated => &[("transaction_id", "id")],
        T::DocumentUploaded | T::DocumentUpdated | T::DocumentDeleted => {
            &[("document_id", "id"), ("file_name", "name")]
        }
        T::ContactCreated | T::ContactUpdated | T::ContactDeleted => &[("contact_id", "id")],
        T::TaskCreated | T::TaskCompleted => &[("task_id", "id")],
        T::TransactionStatusChanged | T::ClosingScheduled | T::ClosingCompleted => &[],
    }
}

/// Fold aliased keys into their canonical key. The canonical key wins when
/// both are present.
fn canonical_keys(data: &Value, aliases: &[(&str, &str)]) -> Value {
    let mut data = data.clone();
    if let Value::Object(map) = &mut data {
        for (alias, canonical) in aliases {
            if let Some(value) = map.remove(*alias) {
                map.entry(*canonical).or_insert(value);
            }
        }
    }
    data
}

fn decode<D: DeserializeOwned>(event_type: WebhookEventType, data: &Value) -> Result<D, PipelineError> {
    D::deserialize(data)
        .map_err(|e| PipelineError::Validation(format!("{event_type}: invalid data: {e}")))
}

fn not_blank(event_type: WebhookEventType, field: &str, value: &str) -> Result<(), PipelineError> {
    if value.trim().is_empty() {
        return Err(PipelineError::Validation(format!(
            "{event_type}: {field} must not be empty"
        )));
    }
    Ok(())
}
