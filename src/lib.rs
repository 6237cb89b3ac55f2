pub mod adapters;
pub mod config;
pub mod domain;
pub mod infra;
pub mod services;

use {services::webhook_service::WebhookService, std::sync::Arc};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<WebhookService>,
}
