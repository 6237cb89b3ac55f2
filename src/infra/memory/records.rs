use {
    crate::domain::id::IntegrationId,
    crate::domain::ports::{PipelineFuture, RecordStore},
    crate::domain::records::{
        ClosingUpdate, Contact, ContactUpsert, Document, DocumentUpsert, StatusChange,
        StatusChangeLog, Task, TaskUpsert, Transaction, TransactionUpsert, merge_metadata,
    },
    chrono::{DateTime, Utc},
    std::collections::HashMap,
    tokio::sync::RwLock,
};

type Key = (IntegrationId, String);

fn key(integration_id: IntegrationId, external_id: &str) -> Key {
    (integration_id, external_id.to_string())
}

fn set_if_some<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
    if value.is_some() {
        slot.clone_from(value);
    }
}

#[derive(Default)]
struct Tables {
    transactions: HashMap<Key, Transaction>,
    status_log: Vec<StatusChangeLog>,
    documents: HashMap<Key, Document>,
    contacts: HashMap<Key, Contact>,
    tasks: HashMap<Key, Task>,
}

/// All tables behind one lock, so multi-row writes are atomic.
#[derive(Default)]
pub struct InMemoryRecordStore {
    tables: RwLock<Tables>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn transaction(&self, integration_id: IntegrationId, external_id: &str) -> Option<Transaction> {
        self.tables
            .read()
            .await
            .transactions
            .get(&key(integration_id, external_id))
            .cloned()
    }

    pub async fn status_log(&self, integration_id: IntegrationId, external_id: &str) -> Vec<StatusChangeLog> {
        self.tables
            .read()
            .await
            .status_log
            .iter()
            .filter(|l| l.integration_id == integration_id && l.transaction_external_id == external_id)
            .cloned()
            .collect()
    }

    pub async fn document(&self, integration_id: IntegrationId, external_id: &str) -> Option<Document> {
        self.tables
            .read()
            .await
            .documents
            .get(&key(integration_id, external_id))
            .cloned()
    }

    pub async fn contact(&self, integration_id: IntegrationId, external_id: &str) -> Option<Contact> {
        self.tables
            .read()
            .await
            .contacts
            .get(&key(integration_id, external_id))
            .cloned()
    }

    pub async fn task(&self, integration_id: IntegrationId, external_id: &str) -> Option<Task> {
        self.tables
            .read()
            .await
            .tasks
            .get(&key(integration_id, external_id))
            .cloned()
    }

    pub async fn transaction_count(&self) -> usize {
        self.tables.read().await.transactions.len()
    }

    pub async fn contact_count(&self) -> usize {
        self.tables.read().await.contacts.len()
    }
}

impl RecordStore for InMemoryRecordStore {
    fn upsert_transaction<'a>(&'a self, tx: &'a TransactionUpsert) -> PipelineFuture<'a, ()> {
        Box::pin(async move {
            let mut tables = self.tables.write().await;
            let row = tables
                .transactions
                .entry(key(tx.integration_id, &tx.external_id))
                .or_default();
            set_if_some(&mut row.file_number, &tx.file_number);
            set_if_some(&mut row.status, &tx.status);
            set_if_some(&mut row.property_address, &tx.property_address);
            set_if_some(&mut row.closing_date, &tx.closing_date);
            merge_metadata(&mut row.metadata, &tx.metadata);
            Ok(())
        })
    }

    fn apply_status_change<'a>(&'a self, change: &'a StatusChange) -> PipelineFuture<'a, ()> {
        Box::pin(async move {
            let mut tables = self.tables.write().await;
            let already_logged = tables.status_log.iter().any(|l| {
                l.integration_id == change.integration_id
                    && l.source_event_id == change.source_event_id
            });
            if already_logged {
                return Ok(());
            }
            tables.status_log.push(StatusChangeLog::from_change(change));

            let row = tables
                .transactions
                .entry(key(change.integration_id, &change.transaction_external_id))
                .or_default();
            // Prefer the provider's view of the old status; fall back to ours.
            row.previous_status = change.old_status.clone().or_else(|| row.status.clone());
            row.status = Some(change.new_status.clone());
            Ok(())
        })
    }

    fn update_closing<'a>(&'a self, update: &'a ClosingUpdate) -> PipelineFuture<'a, ()> {
        Box::pin(async move {
            let mut tables = self.tables.write().await;
            let row = tables
                .transactions
                .entry(key(update.integration_id, &update.transaction_external_id))
                .or_default();
            set_if_some(&mut row.closing_date, &update.closing_date);
            set_if_some(&mut row.closing_location, &update.location);
            set_if_some(&mut row.closed_at, &update.closed_at);
            Ok(())
        })
    }

    fn upsert_document<'a>(&'a self, doc: &'a DocumentUpsert) -> PipelineFuture<'a, ()> {
        Box::pin(async move {
            let mut tables = self.tables.write().await;
            let row = tables
                .documents
                .entry(key(doc.integration_id, &doc.external_id))
                .or_default();
            set_if_some(&mut row.transaction_external_id, &doc.transaction_external_id);
            set_if_some(&mut row.name, &doc.name);
            set_if_some(&mut row.document_type, &doc.document_type);
            set_if_some(&mut row.url, &doc.url);
            row.removed_at = None;
            merge_metadata(&mut row.metadata, &doc.metadata);
            Ok(())
        })
    }

    fn mark_document_removed<'a>(
        &'a self,
        integration_id: IntegrationId,
        external_id: &'a str,
        removed_at: DateTime<Utc>,
    ) -> PipelineFuture<'a, ()> {
        Box::pin(async move {
            let mut tables = self.tables.write().await;
            let row = tables
                .documents
                .entry(key(integration_id, external_id))
                .or_default();
            if row.removed_at.is_none() {
                row.removed_at = Some(removed_at);
            }
            Ok(())
        })
    }

    fn upsert_contact<'a>(&'a self, contact: &'a ContactUpsert) -> PipelineFuture<'a, ()> {
        Box::pin(async move {
            let mut tables = self.tables.write().await;
            let row = tables
                .contacts
                .entry(key(contact.integration_id, &contact.external_id))
                .or_default();
            set_if_some(&mut row.transaction_external_id, &contact.transaction_external_id);
            set_if_some(&mut row.first_name, &contact.first_name);
            set_if_some(&mut row.last_name, &contact.last_name);
            set_if_some(&mut row.email, &contact.email);
            set_if_some(&mut row.phone, &contact.phone);
            set_if_some(&mut row.role, &contact.role);
            merge_metadata(&mut row.metadata, &contact.metadata);
            Ok(())
        })
    }

    fn remove_contact<'a>(
        &'a self,
        integration_id: IntegrationId,
        external_id: &'a str,
    ) -> PipelineFuture<'a, ()> {
        Box::pin(async move {
            self.tables
                .write()
                .await
                .contacts
                .remove(&key(integration_id, external_id));
            Ok(())
        })
    }

    fn upsert_task<'a>(&'a self, task: &'a TaskUpsert) -> PipelineFuture<'a, ()> {
        Box::pin(async move {
            let mut tables = self.tables.write().await;
            let row = tables
                .tasks
                .entry(key(task.integration_id, &task.external_id))
                .or_default();
            set_if_some(&mut row.transaction_external_id, &task.transaction_external_id);
            set_if_some(&mut row.title, &task.title);
            set_if_some(&mut row.due_date, &task.due_date);
            set_if_some(&mut row.assigned_to, &task.assigned_to);
            set_if_some(&mut row.completed_at, &task.completed_at);
            merge_metadata(&mut row.metadata, &task.metadata);
            Ok(())
        })
    }
}
