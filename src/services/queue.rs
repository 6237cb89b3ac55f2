use {
    crate::domain::error::PipelineError,
    crate::domain::id::WebhookEventId,
    crate::domain::job::{JobId, WebhookJob},
    crate::domain::ports::{JobQueue, PipelineFuture, WebhookEventRepository},
    crate::domain::priority::Priority,
    std::{
        cmp::Ordering,
        collections::BinaryHeap,
        sync::{
            Arc, Mutex, MutexGuard,
            atomic::{AtomicU64, Ordering as AtomicOrdering},
        },
        time::Duration,
    },
    tokio::{sync::Notify, time::Instant},
};

/// Deadline used when `now + delay` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

struct Slot {
    priority: Priority,
    seq: u64,
    job: WebhookJob,
}

// BinaryHeap is a max-heap: the "greatest" slot is the lowest priority
// value, then the lowest sequence number.
impl Ord for Slot {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Slot {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Slot {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for Slot {}

struct Delayed {
    ready_at: Instant,
    slot: Slot,
}

impl Ord for Delayed {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .ready_at
            .cmp(&self.ready_at)
            .then_with(|| other.slot.seq.cmp(&self.slot.seq))
    }
}

impl PartialOrd for Delayed {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Delayed {
    fn eq(&self, other: &Self) -> bool {
        self.slot.seq == other.slot.seq
    }
}

impl Eq for Delayed {}

#[derive(Default)]
struct QueueState {
    ready: BinaryHeap<Slot>,
    delayed: BinaryHeap<Delayed>,
}

impl QueueState {
    fn promote_due(&mut self, now: Instant) {
        while self.delayed.peek().is_some_and(|d| d.ready_at <= now) {
            if let Some(d) = self.delayed.pop() {
                self.ready.push(d.slot);
            }
        }
    }
}

/// Process-local priority queue. Ready jobs are served lowest priority
/// value first, FIFO within a priority; delayed jobs become ready at their
/// deadline.
pub struct InMemoryJobQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    next_seq: AtomicU64,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            next_seq: AtomicU64::new(1),
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn state(&self) -> MutexGuard<'_, QueueState> {
        // Nothing panics while holding the lock, but don't wedge the queue if it did.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn push_now(&self, job: WebhookJob, delay: Duration) -> JobId {
        let seq = self.next_seq.fetch_add(1, AtomicOrdering::Relaxed);
        let slot = Slot {
            priority: job.priority,
            seq,
            job,
        };
        {
            let mut state = self.state();
            if delay.is_zero() {
                state.ready.push(slot);
            } else {
                let now = Instant::now();
                state.delayed.push(Delayed {
                    ready_at: now.checked_add(delay).unwrap_or(now + FAR_FUTURE),
                    slot,
                });
            }
        }
        self.notify.notify_one();
        JobId(seq)
    }

    /// Non-blocking pop of the best ready job.
    pub fn try_pop(&self) -> Option<WebhookJob> {
        let mut state = self.state();
        state.promote_due(Instant::now());
        state.ready.pop().map(|slot| slot.job)
    }

    async fn pop_wait(&self) -> WebhookJob {
        loop {
            let notified = self.notify.notified();
            let next_due = {
                let mut state = self.state();
                state.promote_due(Instant::now());
                if let Some(slot) = state.ready.pop() {
                    return slot.job;
                }
                state.delayed.peek().map(|d| d.ready_at)
            };

            match next_due {
                Some(deadline) => {
                    tokio::select! {
                        _ = notified => {}
                        _ = tokio::time::sleep_until(deadline) => {}
                    }
                }
                None => notified.await,
            }
        }
    }

    pub fn delayed_len(&self) -> usize {
        self.state().delayed.len()
    }
}

impl Default for InMemoryJobQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl JobQueue for InMemoryJobQueue {
    fn push(&self, job: WebhookJob, delay: Duration) -> PipelineFuture<'_, JobId> {
        Box::pin(async move { Ok(self.push_now(job, delay)) })
    }

    fn pop(&self) -> PipelineFuture<'_, WebhookJob> {
        Box::pin(async move { Ok(self.pop_wait().await) })
    }

    fn len(&self) -> usize {
        let state = self.state();
        state.ready.len() + state.delayed.len()
    }
}

/// Producer side of the queue used by the orchestrator and retry manager.
#[derive(Clone)]
pub struct QueueDispatcher {
    queue: Arc<dyn JobQueue>,
    events: Arc<dyn WebhookEventRepository>,
}

impl QueueDispatcher {
    pub fn new(queue: Arc<dyn JobQueue>, events: Arc<dyn WebhookEventRepository>) -> Self {
        Self { queue, events }
    }

    pub fn queue(&self) -> &Arc<dyn JobQueue> {
        &self.queue
    }

    pub async fn add_webhook_event(&self, job: WebhookJob) -> Result<JobId, PipelineError> {
        let event_id = job.event_id;
        let priority = job.priority;
        let job_id = self.queue.push(job, Duration::ZERO).await?;
        tracing::debug!(%event_id, %job_id, %priority, "job enqueued");
        Ok(job_id)
    }

    /// Re-enqueue the stored event after `delay`.
    pub async fn add_retry_job(
        &self,
        event_id: WebhookEventId,
        delay: Duration,
    ) -> Result<JobId, PipelineError> {
        let event = self
            .events
            .find_event(event_id)
            .await?
            .ok_or(PipelineError::EventNotFound(event_id))?;
        let job_id = self.queue.push(WebhookJob::from_event(&event), delay).await?;
        tracing::debug!(%event_id, %job_id, delay_ms = delay.as_millis() as u64, "retry job scheduled");
        Ok(job_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event_type::WebhookEventType;
    use crate::domain::id::{ExternalEventId, IntegrationId};
    use crate::domain::priority::classify;

    fn job(event_type: WebhookEventType, n: u32) -> WebhookJob {
        WebhookJob {
            event_id: WebhookEventId::generate(),
            integration_id: IntegrationId::new(uuid::Uuid::nil()),
            external_event_id: ExternalEventId::new(format!("evt_{n}")).unwrap(),
            event_type,
            priority: classify(event_type),
            data: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn higher_priority_first_even_if_enqueued_later() {
        let q = InMemoryJobQueue::new();
        q.push(job(WebhookEventType::ContactCreated, 1), Duration::ZERO)
            .await
            .unwrap();
        q.push(job(WebhookEventType::TransactionStatusChanged, 2), Duration::ZERO)
            .await
            .unwrap();

        let first = q.pop().await.unwrap();
        assert_eq!(first.event_type, WebhookEventType::TransactionStatusChanged);
        let second = q.pop().await.unwrap();
        assert_eq!(second.event_type, WebhookEventType::ContactCreated);
        assert!(q.is_empty());
    }

    #[tokio::test]
    async fn fifo_within_priority() {
        let q = InMemoryJobQueue::new();
        for n in 0..5 {
            q.push(job(WebhookEventType::DocumentUploaded, n), Duration::ZERO)
                .await
                .unwrap();
        }
        for n in 0..5 {
            let j = q.try_pop().unwrap();
            assert_eq!(j.external_event_id.as_str(), format!("evt_{n}"));
        }
        assert!(q.try_pop().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_job_waits_for_deadline() {
        let q = InMemoryJobQueue::new();
        q.push(job(WebhookEventType::TransactionStatusChanged, 1), Duration::from_secs(2))
            .await
            .unwrap();
        q.push(job(WebhookEventType::ContactUpdated, 2), Duration::ZERO)
            .await
            .unwrap();

        assert_eq!(q.len(), 2);
        assert_eq!(q.delayed_len(), 1);

        // Only the contact job is ready now.
        let ready = q.try_pop().unwrap();
        assert_eq!(ready.event_type, WebhookEventType::ContactUpdated);
        assert!(q.try_pop().is_none());

        let start = Instant::now();
        let delayed = q.pop().await.unwrap();
        assert_eq!(delayed.event_type, WebhookEventType::TransactionStatusChanged);
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test]
    async fn oversized_delay_parks_job() {
        let q = InMemoryJobQueue::new();
        q.push(job(WebhookEventType::TaskCompleted, 1), Duration::MAX)
            .await
            .unwrap();
        assert_eq!(q.delayed_len(), 1);
        assert!(q.try_pop().is_none());
    }

    #[tokio::test]
    async fn pop_wakes_on_push() {
        let q = Arc::new(InMemoryJobQueue::new());
        let waiter = {
            let q = q.clone();
            tokio::spawn(async move { q.pop().await.unwrap() })
        };
        tokio::task::yield_now().await;
        q.push(job(WebhookEventType::TaskCreated, 7), Duration::ZERO)
            .await
            .unwrap();
        let got = waiter.await.unwrap();
        assert_eq!(got.external_event_id.as_str(), "evt_7");
    }
}
