//! In-memory implementations of the storage ports. Suitable for a single
//! process; state is lost on restart.

mod dedup;
mod events;
mod records;

pub use {dedup::InMemoryDedupStore, events::InMemoryWebhookEvents, records::InMemoryRecordStore};

use {
    crate::domain::id::IntegrationId,
    crate::domain::integration::Integration,
    crate::domain::ports::{IntegrationRepository, PipelineFuture},
    std::collections::HashMap,
    tokio::sync::RwLock,
};

#[derive(Default)]
pub struct InMemoryIntegrations {
    integrations: RwLock<HashMap<IntegrationId, Integration>>,
}

impl InMemoryIntegrations {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, integration: Integration) {
        self.integrations
            .write()
            .await
            .insert(integration.id, integration);
    }
}

impl IntegrationRepository for InMemoryIntegrations {
    fn find_integration(&self, id: IntegrationId) -> PipelineFuture<'_, Option<Integration>> {
        Box::pin(async move { Ok(self.integrations.read().await.get(&id).cloned()) })
    }
}
