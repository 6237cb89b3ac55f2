use {
    super::handlers::EventHandlers,
    super::retry::RetryManager,
    crate::domain::error::PipelineError,
    crate::domain::job::WebhookJob,
    crate::domain::ports::{DedupStore, JobQueue, WebhookEventRepository},
    crate::domain::webhook_event::WebhookStatus,
    chrono::Utc,
    std::{sync::Arc, time::Duration},
    tokio::{sync::watch, task::JoinHandle},
};

const MIN_REQUEUE_DELAY: Duration = Duration::from_millis(100);

/// Consumer side of the pipeline: runs handlers and records the outcome.
pub struct Worker {
    queue: Arc<dyn JobQueue>,
    events: Arc<dyn WebhookEventRepository>,
    handlers: Arc<EventHandlers>,
    retry: RetryManager,
    handler_timeout: Duration,
}

impl Worker {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        events: Arc<dyn WebhookEventRepository>,
        handlers: Arc<EventHandlers>,
        retry: RetryManager,
        handler_timeout: Duration,
    ) -> Self {
        Self {
            queue,
            events,
            handlers,
            retry,
            handler_timeout,
        }
    }

    #[tracing::instrument(
        name = "webhook_job",
        skip_all,
        fields(event_id = %job.event_id, event_type = %job.event_type, priority = %job.priority)
    )]
    pub async fn process_job(&self, job: WebhookJob) {
        match self.try_process(&job).await {
            Ok(()) => {}
            Err(PipelineError::EventNotFound(event_id)) => {
                tracing::error!(%event_id, "job references a missing event, dropping");
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to record job outcome");
                self.requeue(job).await;
            }
        }
    }

    /// Put a job back after a storage error so the event still reaches a
    /// terminal status in this process.
    async fn requeue(&self, job: WebhookJob) {
        let event_id = job.event_id;
        let delay = self.retry.policy().base_delay.max(MIN_REQUEUE_DELAY);
        match self.queue.push(job, delay).await {
            Ok(job_id) => tracing::warn!(
                %event_id,
                %job_id,
                delay_ms = delay.as_millis() as u64,
                "job requeued after storage error"
            ),
            Err(e) => tracing::error!(%event_id, error = %e, "failed to requeue job"),
        }
    }

    async fn try_process(&self, job: &WebhookJob) -> Result<(), PipelineError> {
        self.events
            .set_status(job.event_id, WebhookStatus::Processing)
            .await?;

        let outcome = match tokio::time::timeout(self.handler_timeout, self.handlers.handle(job)).await
        {
            Ok(result) => result,
            Err(_) => Err(PipelineError::HandlerTimeout(self.handler_timeout.as_secs())),
        };

        match outcome {
            Ok(()) => {
                self.events.mark_completed(job.event_id, Utc::now()).await?;
                tracing::info!("webhook event completed");
            }
            Err(e) => {
                self.retry.handle_failure(job.event_id, &e).await?;
            }
        }
        Ok(())
    }
}

/// Pull jobs until shutdown is signalled. A job already dequeued is
/// finished before the loop checks for shutdown again.
pub async fn run_worker(worker: Arc<Worker>, worker_id: usize, mut shutdown: watch::Receiver<bool>) {
    tracing::info!(worker_id, "webhook worker started");

    loop {
        let job = tokio::select! {
            _ = shutdown.changed() => {
                tracing::info!(worker_id, "webhook worker shutting down");
                return;
            }
            job = worker.queue.pop() => job,
        };

        match job {
            Ok(job) => worker.process_job(job).await,
            Err(e) => {
                tracing::error!(worker_id, error = %e, "queue pop error");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

pub fn spawn_workers(
    worker: Arc<Worker>,
    count: usize,
    shutdown: &watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    (0..count)
        .map(|id| tokio::spawn(run_worker(worker.clone(), id, shutdown.clone())))
        .collect()
}

/// Periodically drop expired dedup keys.
pub async fn run_dedup_sweeper(
    dedup: Arc<dyn DedupStore>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::info!("dedup sweeper started");

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                tracing::info!("dedup sweeper shutting down");
                return;
            }
            _ = tokio::time::sleep(interval) => {}
        }

        match dedup.purge_expired().await {
            Ok(0) => {}
            Ok(n) => tracing::info!(count = n, "purged expired dedup keys"),
            Err(e) => tracing::error!(error = %e, "dedup sweep error"),
        }
    }
}
