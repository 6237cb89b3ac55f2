use {
    super::queue::QueueDispatcher,
    crate::domain::error::PipelineError,
    crate::domain::id::WebhookEventId,
    crate::domain::job::{JobId, WebhookJob},
    crate::domain::ports::WebhookEventRepository,
    crate::domain::webhook_event::FailureOutcome,
    std::{sync::Arc, time::Duration},
};

/// Linear backoff: attempt `n` waits `n * base_delay`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn backoff(&self, retry_count: u32) -> Duration {
        self.base_delay.saturating_mul(retry_count)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_millis(2000),
        }
    }
}

#[derive(Clone)]
pub struct RetryManager {
    dispatcher: QueueDispatcher,
    events: Arc<dyn WebhookEventRepository>,
    policy: RetryPolicy,
}

impl RetryManager {
    pub fn new(
        dispatcher: QueueDispatcher,
        events: Arc<dyn WebhookEventRepository>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            dispatcher,
            events,
            policy,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Re-enqueue the event's job after `delay`.
    pub async fn schedule(
        &self,
        event_id: WebhookEventId,
        delay: Duration,
    ) -> Result<JobId, PipelineError> {
        self.dispatcher.add_retry_job(event_id, delay).await
    }

    /// Record a failed attempt and schedule the next one while budget remains.
    pub async fn handle_failure(
        &self,
        event_id: WebhookEventId,
        error: &PipelineError,
    ) -> Result<FailureOutcome, PipelineError> {
        let message = error.to_string();
        let outcome = self
            .events
            .record_failure(event_id, &message, self.policy.max_retries)
            .await?
            .ok_or(PipelineError::EventNotFound(event_id))?;

        match outcome {
            FailureOutcome::Retrying { retry_count } => {
                let delay = self.policy.backoff(retry_count);
                self.schedule(event_id, delay).await?;
                tracing::warn!(
                    %event_id,
                    retry_count,
                    delay_ms = delay.as_millis() as u64,
                    error = %message,
                    "handler failed, retry scheduled"
                );
            }
            FailureOutcome::Failed { retry_count } => {
                tracing::error!(
                    %event_id,
                    retry_count,
                    error = %message,
                    "handler failed, retries exhausted"
                );
            }
        }

        Ok(outcome)
    }

    /// Operator-triggered retry of a stored event.
    pub async fn retry_failed_event(
        &self,
        event_id: WebhookEventId,
    ) -> Result<JobId, PipelineError> {
        let event = self
            .events
            .begin_manual_retry(event_id, self.policy.max_retries)
            .await?;
        let job_id = self
            .dispatcher
            .add_webhook_event(WebhookJob::from_event(&event))
            .await?;
        tracing::info!(%event_id, retry_count = event.retry_count, %job_id, "manual retry enqueued");
        Ok(job_id)
    }
}
