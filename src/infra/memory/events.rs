use {
    crate::domain::error::PipelineError,
    crate::domain::id::WebhookEventId,
    crate::domain::ports::{PipelineFuture, WebhookEventRepository},
    crate::domain::webhook_event::{FailureOutcome, NewWebhookEvent, WebhookEvent, WebhookStatus},
    chrono::{DateTime, Utc},
    std::collections::HashMap,
    tokio::sync::RwLock,
};

#[derive(Default)]
pub struct InMemoryWebhookEvents {
    events: RwLock<HashMap<WebhookEventId, WebhookEvent>>,
}

impl InMemoryWebhookEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.events.read().await.len()
    }

    pub async fn all(&self) -> Vec<WebhookEvent> {
        let mut events: Vec<_> = self.events.read().await.values().cloned().collect();
        events.sort_by_key(|e| e.id.as_uuid());
        events
    }

    async fn update<T>(
        &self,
        id: WebhookEventId,
        f: impl FnOnce(&mut WebhookEvent) -> T,
    ) -> Result<T, PipelineError> {
        let mut events = self.events.write().await;
        let event = events.get_mut(&id).ok_or(PipelineError::EventNotFound(id))?;
        let out = f(event);
        event.updated_at = Utc::now();
        Ok(out)
    }
}

impl WebhookEventRepository for InMemoryWebhookEvents {
    fn insert_event<'a>(&'a self, event: &'a NewWebhookEvent) -> PipelineFuture<'a, WebhookEvent> {
        Box::pin(async move {
            let row = event.clone().into_event();
            self.events.write().await.insert(row.id, row.clone());
            Ok(row)
        })
    }

    fn find_event(&self, id: WebhookEventId) -> PipelineFuture<'_, Option<WebhookEvent>> {
        Box::pin(async move { Ok(self.events.read().await.get(&id).cloned()) })
    }

    fn set_status(&self, id: WebhookEventId, status: WebhookStatus) -> PipelineFuture<'_, ()> {
        Box::pin(async move { self.update(id, |e| e.status = status).await })
    }

    fn mark_completed(
        &self,
        id: WebhookEventId,
        processed_at: DateTime<Utc>,
    ) -> PipelineFuture<'_, ()> {
        Box::pin(async move {
            self.update(id, |e| {
                e.status = WebhookStatus::Completed;
                e.processed_at = Some(processed_at);
                e.error = None;
            })
            .await
        })
    }

    fn record_failure<'a>(
        &'a self,
        id: WebhookEventId,
        error: &'a str,
        max_retries: u32,
    ) -> PipelineFuture<'a, Option<FailureOutcome>> {
        Box::pin(async move {
            let mut events = self.events.write().await;
            let Some(event) = events.get_mut(&id) else {
                return Ok(None);
            };
            let outcome = FailureOutcome::decide(event.retry_count + 1, max_retries);
            let now = Utc::now();
            match outcome {
                FailureOutcome::Retrying { retry_count } => {
                    event.retry_count = retry_count;
                    event.last_retry_at = Some(now);
                }
                FailureOutcome::Failed { retry_count } => {
                    event.retry_count = retry_count;
                }
            }
            event.status = outcome.status();
            event.error = Some(error.to_string());
            event.updated_at = now;
            Ok(Some(outcome))
        })
    }

    fn begin_manual_retry(
        &self,
        id: WebhookEventId,
        max_retries: u32,
    ) -> PipelineFuture<'_, WebhookEvent> {
        Box::pin(async move {
            let mut events = self.events.write().await;
            let event = events.get_mut(&id).ok_or(PipelineError::EventNotFound(id))?;
            if event.retry_count >= max_retries {
                return Err(PipelineError::MaxRetriesExceeded {
                    event_id: id,
                    max_retries,
                });
            }
            let now = Utc::now();
            event.retry_count += 1;
            event.status = WebhookStatus::Retrying;
            event.last_retry_at = Some(now);
            event.updated_at = now;
            Ok(event.clone())
        })
    }

    fn list_events(
        &self,
        status: Option<WebhookStatus>,
        limit: usize,
    ) -> PipelineFuture<'_, Vec<WebhookEvent>> {
        Box::pin(async move {
            let mut events: Vec<_> = self
                .events
                .read()
                .await
                .values()
                .filter(|e| status.is_none_or(|s| e.status == s))
                .cloned()
                .collect();
            // v7 ids sort by creation time.
            events.sort_by_key(|e| std::cmp::Reverse(e.id.as_uuid()));
            events.truncate(limit);
            Ok(events)
        })
    }

    fn list_unfinished(&self) -> PipelineFuture<'_, Vec<WebhookEvent>> {
        Box::pin(async move {
            let mut events: Vec<_> = self
                .events
                .read()
                .await
                .values()
                .filter(|e| !e.status.is_terminal())
                .cloned()
                .collect();
            events.sort_by_key(|e| e.id.as_uuid());
            Ok(events)
        })
    }
}
