use {
    super::error::PipelineError,
    super::id::{IntegrationId, WebhookEventId},
    super::integration::Integration,
    super::job::{JobId, WebhookJob},
    super::records::{
        ClosingUpdate, ContactUpsert, DocumentUpsert, StatusChange, TaskUpsert, TransactionUpsert,
    },
    super::webhook_event::{FailureOutcome, NewWebhookEvent, WebhookEvent, WebhookStatus},
    chrono::{DateTime, Utc},
    std::{future::Future, pin::Pin, time::Duration},
};

pub type PipelineFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, PipelineError>> + Send + 'a>>;

pub trait IntegrationRepository: Send + Sync {
    fn find_integration(&self, id: IntegrationId) -> PipelineFuture<'_, Option<Integration>>;
}

/// Durable lifecycle record of every accepted delivery.
pub trait WebhookEventRepository: Send + Sync {
    fn insert_event<'a>(&'a self, event: &'a NewWebhookEvent) -> PipelineFuture<'a, WebhookEvent>;

    fn find_event(&self, id: WebhookEventId) -> PipelineFuture<'_, Option<WebhookEvent>>;

    fn set_status(&self, id: WebhookEventId, status: WebhookStatus) -> PipelineFuture<'_, ()>;

    fn mark_completed(
        &self,
        id: WebhookEventId,
        processed_at: DateTime<Utc>,
    ) -> PipelineFuture<'_, ()>;

    /// Increment `retry_count` and move to RETRYING or FAILED in one write.
    /// Returns `None` when the event does not exist.
    fn record_failure<'a>(
        &'a self,
        id: WebhookEventId,
        error: &'a str,
        max_retries: u32,
    ) -> PipelineFuture<'a, Option<FailureOutcome>>;

    /// Operator-triggered retry. Fails with `EventNotFound` or
    /// `MaxRetriesExceeded` without touching the row; otherwise increments
    /// `retry_count`, sets RETRYING and returns the updated event.
    fn begin_manual_retry(
        &self,
        id: WebhookEventId,
        max_retries: u32,
    ) -> PipelineFuture<'_, WebhookEvent>;

    /// Newest first.
    fn list_events(
        &self,
        status: Option<WebhookStatus>,
        limit: usize,
    ) -> PipelineFuture<'_, Vec<WebhookEvent>>;

    /// Events in a non-terminal status, oldest first.
    fn list_unfinished(&self) -> PipelineFuture<'_, Vec<WebhookEvent>>;
}

/// TTL key/value store remembering accepted deliveries.
pub trait DedupStore: Send + Sync {
    fn is_duplicate<'a>(&'a self, key: &'a str) -> PipelineFuture<'a, bool>;

    /// Set-if-not-exists. Returns `true` when the key was newly recorded.
    fn mark_seen<'a>(&'a self, key: &'a str, ttl: Duration) -> PipelineFuture<'a, bool>;

    /// Drop expired keys. Returns how many were removed.
    fn purge_expired(&self) -> PipelineFuture<'_, u64>;
}

/// Domain-record storage. Every method is an idempotent upsert/update and
/// must return an error on any downstream failure.
pub trait RecordStore: Send + Sync {
    fn upsert_transaction<'a>(&'a self, tx: &'a TransactionUpsert) -> PipelineFuture<'a, ()>;

    /// Transaction status update and log append, committed together.
    fn apply_status_change<'a>(&'a self, change: &'a StatusChange) -> PipelineFuture<'a, ()>;

    fn update_closing<'a>(&'a self, update: &'a ClosingUpdate) -> PipelineFuture<'a, ()>;

    fn upsert_document<'a>(&'a self, doc: &'a DocumentUpsert) -> PipelineFuture<'a, ()>;

    fn mark_document_removed<'a>(
        &'a self,
        integration_id: IntegrationId,
        external_id: &'a str,
        removed_at: DateTime<Utc>,
    ) -> PipelineFuture<'a, ()>;

    fn upsert_contact<'a>(&'a self, contact: &'a ContactUpsert) -> PipelineFuture<'a, ()>;

    fn remove_contact<'a>(
        &'a self,
        integration_id: IntegrationId,
        external_id: &'a str,
    ) -> PipelineFuture<'a, ()>;

    fn upsert_task<'a>(&'a self, task: &'a TaskUpsert) -> PipelineFuture<'a, ()>;
}

/// Priority job queue feeding the worker pool.
pub trait JobQueue: Send + Sync {
    /// Make `job` available after `delay` (zero for immediately).
    fn push(&self, job: WebhookJob, delay: Duration) -> PipelineFuture<'_, JobId>;

    /// Wait for the highest-priority ready job.
    fn pop(&self) -> PipelineFuture<'_, WebhookJob>;

    /// Ready plus delayed jobs.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
