use {
    super::handlers::EventHandlers,
    super::queue::QueueDispatcher,
    super::retry::RetryManager,
    super::signature::{SIGNATURE_HEADER, validate_signature},
    super::timestamp::validate_timestamp,
    super::worker::Worker,
    crate::config::PipelineSettings,
    crate::domain::error::PipelineError,
    crate::domain::event_type::WebhookEventType,
    crate::domain::id::{ExternalEventId, IntegrationId, WebhookEventId, dedup_key},
    crate::domain::job::{JobId, WebhookJob},
    crate::domain::payload::{EventPayload, WebhookEnvelope},
    crate::domain::ports::{
        DedupStore, IntegrationRepository, JobQueue, RecordStore, WebhookEventRepository,
    },
    crate::domain::priority::{Priority, classify},
    crate::domain::webhook_event::{
        EventStatusView, NewWebhookEvent, NewWebhookEventParams, WebhookEvent, WebhookStatus,
    },
    std::{collections::HashMap, sync::Arc},
};

/// Request headers, names compared case-insensitively.
pub type WebhookHeaders = HashMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessResult {
    /// Persisted and handed to the worker pool.
    Accepted {
        event_id: WebhookEventId,
        job_id: JobId,
        priority: Priority,
    },
    /// Seen inside the dedup window; nothing was written.
    Duplicate,
}

/// Storage collaborators, injected so tests can swap in fakes.
#[derive(Clone)]
pub struct Stores {
    pub integrations: Arc<dyn IntegrationRepository>,
    pub events: Arc<dyn WebhookEventRepository>,
    pub dedup: Arc<dyn DedupStore>,
    pub records: Arc<dyn RecordStore>,
}

pub struct WebhookService {
    integrations: Arc<dyn IntegrationRepository>,
    events: Arc<dyn WebhookEventRepository>,
    dedup: Arc<dyn DedupStore>,
    records: Arc<dyn RecordStore>,
    dispatcher: QueueDispatcher,
    retry: RetryManager,
    settings: PipelineSettings,
}

impl WebhookService {
    pub fn new(stores: Stores, queue: Arc<dyn JobQueue>, settings: PipelineSettings) -> Self {
        let dispatcher = QueueDispatcher::new(queue, stores.events.clone());
        let retry = RetryManager::new(
            dispatcher.clone(),
            stores.events.clone(),
            settings.retry_policy(),
        );
        Self {
            integrations: stores.integrations,
            events: stores.events,
            dedup: stores.dedup,
            records: stores.records,
            dispatcher,
            retry,
            settings,
        }
    }

    pub fn dedup_store(&self) -> Arc<dyn DedupStore> {
        self.dedup.clone()
    }

    /// Worker sharing this service's queue, event store and retry policy.
    pub fn worker(&self) -> Worker {
        Worker::new(
            self.dispatcher.queue().clone(),
            self.events.clone(),
            Arc::new(EventHandlers::new(self.records.clone())),
            self.retry.clone(),
            self.settings.handler_timeout,
        )
    }

    /// Validate, deduplicate, persist and enqueue one delivery whose event
    /// type is already known.
    pub async fn process_webhook(
        &self,
        integration_id: IntegrationId,
        event_type: WebhookEventType,
        raw_body: &[u8],
        headers: &WebhookHeaders,
    ) -> Result<ProcessResult, PipelineError> {
        self.process_delivery(integration_id, Some(event_type.as_str()), raw_body, headers)
            .await
    }

    /// Validate, deduplicate, persist and enqueue one delivery.
    ///
    /// `declared_type` is the type named outside the body, if any; without
    /// it the envelope's `event.type` is used. The type is only resolved
    /// once the integration and signature checks pass.
    ///
    /// Every rejection happens before anything is written. Once the event
    /// is persisted it is tracked to COMPLETED or FAILED.
    #[tracing::instrument(
        name = "webhook",
        skip_all,
        fields(
            integration_id = %integration_id,
            event_type = tracing::field::Empty,
            external_event_id = tracing::field::Empty,
        )
    )]
    pub async fn process_delivery(
        &self,
        integration_id: IntegrationId,
        declared_type: Option<&str>,
        raw_body: &[u8],
        headers: &WebhookHeaders,
    ) -> Result<ProcessResult, PipelineError> {
        let integration = self
            .integrations
            .find_integration(integration_id)
            .await?
            .ok_or(PipelineError::IntegrationNotFound(integration_id))?;

        if !integration.active {
            tracing::warn!("integration inactive, rejecting webhook");
            return Err(PipelineError::IntegrationInactive(integration_id));
        }

        match integration.webhook_secret() {
            Some(secret) => {
                let sig = header(headers, SIGNATURE_HEADER).unwrap_or_default();
                if !validate_signature(raw_body, sig, secret) {
                    tracing::warn!("signature mismatch, rejecting webhook");
                    return Err(PipelineError::InvalidSignature);
                }
            }
            None => {
                tracing::warn!("no webhook secret configured, skipping signature validation");
            }
        }

        let envelope = WebhookEnvelope::parse(raw_body)?;

        if !validate_timestamp(&envelope.event.timestamp, self.settings.timestamp_max_age_secs) {
            tracing::warn!(timestamp = %envelope.event.timestamp, "timestamp outside window");
            return Err(PipelineError::StaleOrInvalidTimestamp(envelope.event.timestamp));
        }

        let event_type = resolve_event_type(declared_type, envelope.event.event_type.as_deref())?;
        tracing::Span::current().record("event_type", tracing::field::display(event_type));

        let external_event_id = ExternalEventId::new(envelope.event.id)?;
        tracing::Span::current().record(
            "external_event_id",
            tracing::field::display(&external_event_id),
        );

        // Malformed data is rejected here rather than failing in a worker.
        EventPayload::parse(event_type, &envelope.event.data)?;

        let key = dedup_key(integration_id, &external_event_id);
        if self.dedup.is_duplicate(&key).await? {
            tracing::info!("duplicate delivery, already accepted");
            return Ok(ProcessResult::Duplicate);
        }

        let priority = classify(event_type);
        let new_event = NewWebhookEvent::new(NewWebhookEventParams {
            integration_id,
            event_type,
            external_event_id,
            priority,
            payload: envelope.event.data,
        });
        let event = self.events.insert_event(&new_event).await?;

        // The row exists from here on: a failed bookkeeping write is logged
        // and the job is still enqueued so the event is not stranded.
        match self.dedup.mark_seen(&key, self.settings.dedup_ttl).await {
            Ok(true) => {}
            // Lost a race with a concurrent delivery; handlers are idempotent.
            Ok(false) => tracing::warn!(
                event_id = %event.id,
                "dedup key already set by a concurrent delivery"
            ),
            Err(e) => tracing::error!(event_id = %event.id, error = %e, "failed to record dedup key"),
        }

        // QUEUED before the push so a fast worker can't be overwritten.
        if let Err(e) = self.events.set_status(event.id, WebhookStatus::Queued).await {
            tracing::error!(event_id = %event.id, error = %e, "failed to mark event queued");
        }
        let job_id = self
            .dispatcher
            .add_webhook_event(WebhookJob::from_event(&event))
            .await?;

        tracing::info!(event_id = %event.id, %job_id, %priority, "webhook accepted");
        Ok(ProcessResult::Accepted {
            event_id: event.id,
            job_id,
            priority,
        })
    }

    pub async fn get_event_status(
        &self,
        event_id: WebhookEventId,
    ) -> Result<EventStatusView, PipelineError> {
        let event = self
            .events
            .find_event(event_id)
            .await?
            .ok_or(PipelineError::EventNotFound(event_id))?;
        let integration = self
            .integrations
            .find_integration(event.integration_id)
            .await?;
        Ok(EventStatusView::new(&event, integration.as_ref()))
    }

    pub async fn retry_failed_event(&self, event_id: WebhookEventId) -> Result<JobId, PipelineError> {
        self.retry.retry_failed_event(event_id).await
    }

    pub async fn list_events(
        &self,
        status: Option<WebhookStatus>,
        limit: usize,
    ) -> Result<Vec<WebhookEvent>, PipelineError> {
        self.events.list_events(status, limit).await
    }

    /// Re-enqueue events a previous process accepted but never finished.
    /// The queue is process-local, so this runs once at start-up.
    pub async fn recover_unfinished(&self) -> Result<usize, PipelineError> {
        let events = self.events.list_unfinished().await?;
        let mut recovered = 0;
        for event in &events {
            if event.status != WebhookStatus::Retrying {
                self.events.set_status(event.id, WebhookStatus::Queued).await?;
            }
            self.dispatcher
                .add_webhook_event(WebhookJob::from_event(event))
                .await?;
            recovered += 1;
        }
        if recovered > 0 {
            tracing::info!(count = recovered, "re-enqueued unfinished webhook events");
        }
        Ok(recovered)
    }
}

/// The declared type wins; the envelope's type, when present, must agree.
fn resolve_event_type(
    declared: Option<&str>,
    from_envelope: Option<&str>,
) -> Result<WebhookEventType, PipelineError> {
    let from_envelope = from_envelope.map(WebhookEventType::try_from).transpose()?;
    let event_type = match declared {
        Some(name) => WebhookEventType::try_from(name)?,
        None => from_envelope
            .ok_or_else(|| PipelineError::Validation("missing event type".into()))?,
    };
    if let Some(payload_type) = from_envelope.filter(|t| *t != event_type) {
        return Err(PipelineError::Validation(format!(
            "event type mismatch: request says {event_type}, payload says {payload_type}"
        )));
    }
    Ok(event_type)
}

fn header<'a>(headers: &'a WebhookHeaders, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}
