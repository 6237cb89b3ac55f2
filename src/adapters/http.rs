//! axum front door: the webhook receiver plus operator endpoints over the
//! event lifecycle.

pub mod errors;
pub mod events;
pub mod webhook;

use {
    crate::AppState,
    axum::{
        Router,
        extract::DefaultBodyLimit,
        routing::{get, post},
    },
    std::time::Duration,
    tower::ServiceBuilder,
    tower_http::timeout::TimeoutLayer,
};

/// SoftPro events are small JSON documents.
const BODY_LIMIT: usize = 64 * 1024;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "ok" }))
        .route(
            "/webhooks/softpro/{integration_id}",
            post(webhook::softpro_webhook_handler),
        )
        .route("/events", get(events::list_events_handler))
        .route("/events/{event_id}", get(events::get_event_handler))
        .route("/events/{event_id}/retry", post(events::retry_event_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
                .layer(DefaultBodyLimit::max(BODY_LIMIT)),
        )
        .with_state(state)
}
