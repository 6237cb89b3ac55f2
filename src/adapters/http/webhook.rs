use {
    super::errors::ApiError,
    crate::{
        AppState,
        domain::id::IntegrationId,
        services::webhook_service::{ProcessResult, WebhookHeaders},
    },
    axum::{
        Json,
        body::Bytes,
        extract::{Path, State},
        http::HeaderMap,
    },
};

/// Optional header naming the event type; the envelope's `event.type` is
/// used when it is absent. Resolved only after the delivery is authenticated.
pub const EVENT_TYPE_HEADER: &str = "x-softpro-event-type";

fn to_webhook_headers(headers: &HeaderMap) -> WebhookHeaders {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

#[tracing::instrument(name = "softpro_webhook", skip_all)]
pub async fn softpro_webhook_handler(
    State(state): State<AppState>,
    Path(integration_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    let integration_id: IntegrationId = integration_id.parse()?;
    let declared_type = headers
        .get(EVENT_TYPE_HEADER)
        .and_then(|v| v.to_str().ok());

    let result = state
        .service
        .process_delivery(
            integration_id,
            declared_type,
            &body,
            &to_webhook_headers(&headers),
        )
        .await?;

    match result {
        ProcessResult::Accepted {
            event_id,
            job_id,
            priority,
        } => Ok(Json(serde_json::json!({
            "status": "accepted",
            "event_id": event_id,
            "job_id": job_id,
            "priority": priority.value(),
        }))),
        ProcessResult::Duplicate => Ok(Json(serde_json::json!({"status": "duplicate"}))),
    }
}
