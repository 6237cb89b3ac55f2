//! Domain records written by the event handlers. Every write is keyed by
//! `(integration_id, external_id)` and safe to apply more than once.

use {
    super::id::IntegrationId,
    chrono::{DateTime, NaiveDate, Utc},
    serde::Serialize,
    uuid::Uuid,
};

/// Upsert of a transaction (escrow file). `None` fields keep the stored value.
#[derive(Debug, Clone)]
pub struct TransactionUpsert {
    pub integration_id: IntegrationId,
    pub external_id: String,
    pub file_number: Option<String>,
    pub status: Option<String>,
    pub property_address: Option<String>,
    pub closing_date: Option<NaiveDate>,
    pub metadata: serde_json::Value,
}

/// Status transition: updates the transaction and appends a log row as one unit.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub integration_id: IntegrationId,
    pub transaction_external_id: String,
    pub old_status: Option<String>,
    pub new_status: String,
    pub changed_at: DateTime<Utc>,
    pub changed_by: Option<String>,
    /// Provider event id; the log holds at most one row per event.
    pub source_event_id: String,
}

#[derive(Debug, Clone)]
pub struct DocumentUpsert {
    pub integration_id: IntegrationId,
    pub external_id: String,
    pub transaction_external_id: Option<String>,
    pub name: Option<String>,
    pub document_type: Option<String>,
    pub url: Option<String>,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct ContactUpsert {
    pub integration_id: IntegrationId,
    pub external_id: String,
    pub transaction_external_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Option<String>,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct TaskUpsert {
    pub integration_id: IntegrationId,
    pub external_id: String,
    pub transaction_external_id: Option<String>,
    pub title: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub assigned_to: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub metadata: serde_json::Value,
}

/// Closing scheduled or completed on an existing (or not yet seen) transaction.
#[derive(Debug, Clone)]
pub struct ClosingUpdate {
    pub integration_id: IntegrationId,
    pub transaction_external_id: String,
    pub closing_date: Option<NaiveDate>,
    pub location: Option<String>,
    pub closed_at: Option<DateTime<Utc>>,
}

// ── Stored shapes ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize)]
pub struct Transaction {
    pub file_number: Option<String>,
    pub status: Option<String>,
    pub previous_status: Option<String>,
    pub property_address: Option<String>,
    pub closing_date: Option<NaiveDate>,
    pub closing_location: Option<String>,
    pub closed_at: Option<DateTime<Utc>>,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusChangeLog {
    pub id: Uuid,
    pub integration_id: IntegrationId,
    pub transaction_external_id: String,
    pub old_status: Option<String>,
    pub new_status: String,
    pub changed_at: DateTime<Utc>,
    pub changed_by: Option<String>,
    pub source_event_id: String,
}

impl StatusChangeLog {
    pub fn from_change(change: &StatusChange) -> Self {
        Self {
            id: Uuid::now_v7(),
            integration_id: change.integration_id,
            transaction_external_id: change.transaction_external_id.clone(),
            old_status: change.old_status.clone(),
            new_status: change.new_status.clone(),
            changed_at: change.changed_at,
            changed_by: change.changed_by.clone(),
            source_event_id: change.source_event_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Document {
    pub transaction_external_id: Option<String>,
    pub name: Option<String>,
    pub document_type: Option<String>,
    pub url: Option<String>,
    pub removed_at: Option<DateTime<Utc>>,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Contact {
    pub transaction_external_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Option<String>,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Task {
    pub transaction_external_id: Option<String>,
    pub title: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub assigned_to: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub metadata: serde_json::Value,
}

/// Object-shaped metadata merges key by key; anything else replaces.
pub fn merge_metadata(current: &mut serde_json::Value, incoming: &serde_json::Value) {
    if let (Some(cur), Some(inc)) = (current.as_object_mut(), incoming.as_object()) {
        for (k, v) in inc {
            cur.insert(k.clone(), v.clone());
        }
        return;
    }
    if !incoming.is_null() {
        *current = incoming.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn metadata_merges_objects() {
        let mut cur = json!({"a": 1, "b": 2});
        merge_metadata(&mut cur, &json!({"b": 3, "c": 4}));
        assert_eq!(cur, json!({"a": 1, "b": 3, "c": 4}));
    }

    #[test]
    fn metadata_null_keeps_current() {
        let mut cur = json!({"a": 1});
        merge_metadata(&mut cur, &serde_json::Value::Null);
        assert_eq!(cur, json!({"a": 1}));

        let mut empty = serde_json::Value::Null;
        merge_metadata(&mut empty, &json!({"x": true}));
        assert_eq!(empty, json!({"x": true}));
    }
}
