use {
    crate::domain::ports::{DedupStore, PipelineFuture},
    std::{collections::HashMap, time::Duration},
    tokio::{sync::Mutex, time::Instant},
};

/// Expiry used when `now + ttl` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// TTL map of seen keys. Expired keys are treated as absent and removed
/// lazily or by `purge_expired`.
#[derive(Default)]
pub struct InMemoryDedupStore {
    keys: Mutex<HashMap<String, Instant>>,
}

impl InMemoryDedupStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.keys
            .lock()
            .await
            .values()
            .filter(|expires| **expires > now)
            .count()
    }
}

impl DedupStore for InMemoryDedupStore {
    fn is_duplicate<'a>(&'a self, key: &'a str) -> PipelineFuture<'a, bool> {
        Box::pin(async move {
            let now = Instant::now();
            let mut keys = self.keys.lock().await;
            match keys.get(key) {
                Some(expires) if *expires > now => Ok(true),
                Some(_) => {
                    keys.remove(key);
                    Ok(false)
                }
                None => Ok(false),
            }
        })
    }

    fn mark_seen<'a>(&'a self, key: &'a str, ttl: Duration) -> PipelineFuture<'a, bool> {
        Box::pin(async move {
            let now = Instant::now();
            let mut keys = self.keys.lock().await;
            if keys.get(key).is_some_and(|expires| *expires > now) {
                return Ok(false);
            }
            let expires = now.checked_add(ttl).unwrap_or(now + FAR_FUTURE);
            keys.insert(key.to_string(), expires);
            Ok(true)
        })
    }

    fn purge_expired(&self) -> PipelineFuture<'_, u64> {
        Box::pin(async move {
            let now = Instant::now();
            let mut keys = self.keys.lock().await;
            let before = keys.len();
            keys.retain(|_, expires| *expires > now);
            Ok((before - keys.len()) as u64)
        })
    }
}
