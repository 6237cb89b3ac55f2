//! Postgres-backed storage. Each `*_repo` module holds free functions over a
//! `PgPool`; `PgStore` wires them into the storage ports.

pub mod dedup_repo;
pub mod integration_repo;
pub mod record_repo;
pub mod webhook_event_repo;

use {
    crate::domain::error::PipelineError,
    crate::domain::id::{IntegrationId, WebhookEventId},
    crate::domain::integration::Integration,
    crate::domain::ports::{
        DedupStore, IntegrationRepository, PipelineFuture, RecordStore, WebhookEventRepository,
    },
    crate::domain::records::{
        ClosingUpdate, ContactUpsert, DocumentUpsert, StatusChange, TaskUpsert, TransactionUpsert,
    },
    crate::domain::webhook_event::{FailureOutcome, NewWebhookEvent, WebhookEvent, WebhookStatus},
    chrono::{DateTime, Utc},
    sqlx::PgPool,
    std::time::Duration,
};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<(), PipelineError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| PipelineError::Database(e.into()))
    }
}

impl IntegrationRepository for PgStore {
    fn find_integration(&self, id: IntegrationId) -> PipelineFuture<'_, Option<Integration>> {
        Box::pin(integration_repo::find_integration(&self.pool, id))
    }
}

impl WebhookEventRepository for PgStore {
    fn insert_event<'a>(&'a self, event: &'a NewWebhookEvent) -> PipelineFuture<'a, WebhookEvent> {
        Box::pin(webhook_event_repo::insert_event(&self.pool, event))
    }

    fn find_event(&self, id: WebhookEventId) -> PipelineFuture<'_, Option<WebhookEvent>> {
        Box::pin(webhook_event_repo::find_event(&self.pool, id))
    }

    fn set_status(&self, id: WebhookEventId, status: WebhookStatus) -> PipelineFuture<'_, ()> {
        Box::pin(webhook_event_repo::set_status(&self.pool, id, status))
    }

    fn mark_completed(
        &self,
        id: WebhookEventId,
        processed_at: DateTime<Utc>,
    ) -> PipelineFuture<'_, ()> {
        Box::pin(webhook_event_repo::mark_completed(&self.pool, id, processed_at))
    }

    fn record_failure<'a>(
        &'a self,
        id: WebhookEventId,
        error: &'a str,
        max_retries: u32,
    ) -> PipelineFuture<'a, Option<FailureOutcome>> {
        Box::pin(webhook_event_repo::record_failure(
            &self.pool,
            id,
            error,
            max_retries,
        ))
    }

    fn begin_manual_retry(
        &self,
        id: WebhookEventId,
        max_retries: u32,
    ) -> PipelineFuture<'_, WebhookEvent> {
        Box::pin(webhook_event_repo::begin_manual_retry(
            &self.pool,
            id,
            max_retries,
        ))
    }

    fn list_events(
        &self,
        status: Option<WebhookStatus>,
        limit: usize,
    ) -> PipelineFuture<'_, Vec<WebhookEvent>> {
        Box::pin(webhook_event_repo::list_events(&self.pool, status, limit))
    }

    fn list_unfinished(&self) -> PipelineFuture<'_, Vec<WebhookEvent>> {
        Box::pin(webhook_event_repo::list_unfinished(&self.pool))
    }
}

impl DedupStore for PgStore {
    fn is_duplicate<'a>(&'a self, key: &'a str) -> PipelineFuture<'a, bool> {
        Box::pin(dedup_repo::is_duplicate(&self.pool, key))
    }

    fn mark_seen<'a>(&'a self, key: &'a str, ttl: Duration) -> PipelineFuture<'a, bool> {
        Box::pin(dedup_repo::mark_seen(&self.pool, key, ttl))
    }

    fn purge_expired(&self) -> PipelineFuture<'_, u64> {
        Box::pin(dedup_repo::purge_expired(&self.pool))
    }
}

impl RecordStore for PgStore {
    fn upsert_transaction<'a>(&'a self, tx: &'a TransactionUpsert) -> PipelineFuture<'a, ()> {
        Box::pin(record_repo::upsert_transaction(&self.pool, tx))
    }

    fn apply_status_change<'a>(&'a self, change: &'a StatusChange) -> PipelineFuture<'a, ()> {
        Box::pin(record_repo::apply_status_change(&self.pool, change))
    }

    fn update_closing<'a>(&'a self, update: &'a ClosingUpdate) -> PipelineFuture<'a, ()> {
        Box::pin(record_repo::update_closing(&self.pool, update))
    }

    fn upsert_document<'a>(&'a self, doc: &'a DocumentUpsert) -> PipelineFuture<'a, ()> {
        Box::pin(record_repo::upsert_document(&self.pool, doc))
    }

    fn mark_document_removed<'a>(
        &'a self,
        integration_id: IntegrationId,
        external_id: &'a str,
        removed_at: DateTime<Utc>,
    ) -> PipelineFuture<'a, ()> {
        Box::pin(record_repo::mark_document_removed(
            &self.pool,
            integration_id,
            external_id,
            removed_at,
        ))
    }

    fn upsert_contact<'a>(&'a self, contact: &'a ContactUpsert) -> PipelineFuture<'a, ()> {
        Box::pin(record_repo::upsert_contact(&self.pool, contact))
    }

    fn remove_contact<'a>(
        &'a self,
        integration_id: IntegrationId,
        external_id: &'a str,
    ) -> PipelineFuture<'a, ()> {
        Box::pin(record_repo::remove_contact(
            &self.pool,
            integration_id,
            external_id,
        ))
    }

    fn upsert_task<'a>(&'a self, task: &'a TaskUpsert) -> PipelineFuture<'a, ()> {
        Box::pin(record_repo::upsert_task(&self.pool, task))
    }
}
