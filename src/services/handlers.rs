use {
    crate::domain::error::PipelineError,
    crate::domain::id::IntegrationId,
    crate::domain::job::WebhookJob,
    crate::domain::payload::{
        ClosingData, ContactData, DocumentData, EventPayload, StatusChangeData, TaskData,
        TransactionData,
    },
    crate::domain::ports::RecordStore,
    crate::domain::records::{
        ClosingUpdate, ContactUpsert, DocumentUpsert, StatusChange, TaskUpsert, TransactionUpsert,
    },
    chrono::Utc,
    serde_json::Value,
    std::sync::Arc,
};

/// Who the write is for and which provider event caused it.
#[derive(Debug, Clone, Copy)]
pub struct HandlerContext<'a> {
    pub integration_id: IntegrationId,
    pub source_event_id: &'a str,
}

/// Applies webhook payloads to domain records. Every failure is returned so
/// the worker can retry the whole event.
pub struct EventHandlers {
    store: Arc<dyn RecordStore>,
}

impl EventHandlers {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub async fn handle(&self, job: &WebhookJob) -> Result<(), PipelineError> {
        let payload = EventPayload::parse(job.event_type, &job.data)?;
        let ctx = HandlerContext {
            integration_id: job.integration_id,
            source_event_id: job.external_event_id.as_str(),
        };
        self.dispatch(ctx, payload).await
    }

    pub async fn dispatch(
        &self,
        ctx: HandlerContext<'_>,
        payload: EventPayload,
    ) -> Result<(), PipelineError> {
        use EventPayload::*;
        match payload {
            TransactionCreated(d) | TransactionUpdated(d) => self.handle_transaction(ctx, d).await,
            TransactionStatusChanged(d) => self.handle_status_changed(ctx, d).await,
            DocumentUploaded(d) | DocumentUpdated(d) => self.handle_document(ctx, d).await,
            DocumentDeleted(d) => self.handle_document_deleted(ctx, d).await,
            ContactCreated(d) | ContactUpdated(d) => self.handle_contact(ctx, d).await,
            ContactDeleted(d) => self.handle_contact_deleted(ctx, d).await,
            TaskCreated(d) => self.handle_task(ctx, d, false).await,
            TaskCompleted(d) => self.handle_task(ctx, d, true).await,
            ClosingScheduled(d) => self.handle_closing(ctx, d, false).await,
            ClosingCompleted(d) => self.handle_closing(ctx, d, true).await,
        }
    }

    async fn handle_transaction(
        &self,
        ctx: HandlerContext<'_>,
        d: TransactionData,
    ) -> Result<(), PipelineError> {
        let upsert = TransactionUpsert {
            integration_id: ctx.integration_id,
            external_id: d.id,
            file_number: d.file_number,
            status: d.status,
            property_address: d.property_address,
            closing_date: d.closing_date,
            metadata: Value::Object(d.extra),
        };
        self.store.upsert_transaction(&upsert).await?;
        tracing::debug!(external_id = %upsert.external_id, "transaction upserted");
        Ok(())
    }

    async fn handle_status_changed(
        &self,
        ctx: HandlerContext<'_>,
        d: StatusChangeData,
    ) -> Result<(), PipelineError> {
        let change = StatusChange {
            integration_id: ctx.integration_id,
            transaction_external_id: d.transaction_id,
            old_status: d.old_status,
            new_status: d.new_status,
            changed_at: d.changed_at.unwrap_or_else(Utc::now),
            changed_by: d.changed_by,
            source_event_id: ctx.source_event_id.to_string(),
        };
        self.store.apply_status_change(&change).await?;
        tracing::info!(
            external_id = %change.transaction_external_id,
            old_status = change.old_status.as_deref().unwrap_or("-"),
            new_status = %change.new_status,
            "transaction status changed"
        );
        Ok(())
    }

    async fn handle_document(
        &self,
        ctx: HandlerContext<'_>,
        d: DocumentData,
    ) -> Result<(), PipelineError> {
        let upsert = DocumentUpsert {
            integration_id: ctx.integration_id,
            external_id: d.id,
            transaction_external_id: d.transaction_id,
            name: d.name,
            document_type: d.document_type,
            url: d.url,
            metadata: Value::Object(d.extra),
        };
        self.store.upsert_document(&upsert).await
    }

    async fn handle_document_deleted(
        &self,
        ctx: HandlerContext<'_>,
        d: DocumentData,
    ) -> Result<(), PipelineError> {
        self.store
            .mark_document_removed(ctx.integration_id, &d.id, Utc::now())
            .await
    }

    async fn handle_contact(
        &self,
        ctx: HandlerContext<'_>,
        d: ContactData,
    ) -> Result<(), PipelineError> {
        let upsert = ContactUpsert {
            integration_id: ctx.integration_id,
            external_id: d.id,
            transaction_external_id: d.transaction_id,
            first_name: d.first_name,
            last_name: d.last_name,
            email: d.email,
            phone: d.phone,
            role: d.role,
            metadata: Value::Object(d.extra),
        };
        self.store.upsert_contact(&upsert).await
    }

    async fn handle_contact_deleted(
        &self,
        ctx: HandlerContext<'_>,
        d: ContactData,
    ) -> Result<(), PipelineError> {
        self.store.remove_contact(ctx.integration_id, &d.id).await
    }

    async fn handle_task(
        &self,
        ctx: HandlerContext<'_>,
        d: TaskData,
        completed: bool,
    ) -> Result<(), PipelineError> {
        let completed_at = match (completed, d.completed_at) {
            (true, at) => Some(at.unwrap_or_else(Utc::now)),
            (false, at) => at,
        };
        let upsert = TaskUpsert {
            integration_id: ctx.integration_id,
            external_id: d.id,
            transaction_external_id: d.transaction_id,
            title: d.title,
            due_date: d.due_date,
            assigned_to: d.assigned_to,
            completed_at,
            metadata: Value::Object(d.extra),
        };
        self.store.upsert_task(&upsert).await
    }

    async fn handle_closing(
        &self,
        ctx: HandlerContext<'_>,
        d: ClosingData,
        completed: bool,
    ) -> Result<(), PipelineError> {
        let closed_at = match (completed, d.completed_at) {
            (true, at) => Some(at.unwrap_or_else(Utc::now)),
            (false, _) => None,
        };
        let update = ClosingUpdate {
            integration_id: ctx.integration_id,
            transaction_external_id: d.transaction_id,
            closing_date: d.closing_date,
            location: d.location,
            closed_at,
        };
        self.store.update_closing(&update).await
    }
}
