use {
    super::errors::ApiError,
    crate::{
        AppState,
        domain::{
            id::WebhookEventId,
            webhook_event::{EventStatusView, WebhookEvent, WebhookStatus},
        },
    },
    axum::{
        Json,
        extract::{Path, Query, State},
    },
    serde::Deserialize,
};

const DEFAULT_LIST_LIMIT: usize = 50;
const MAX_LIST_LIMIT: usize = 500;

#[derive(Debug, Deserialize)]
pub struct ListEventsQuery {
    pub status: Option<String>,
    pub limit: Option<usize>,
}

pub async fn list_events_handler(
    State(state): State<AppState>,
    Query(query): Query<ListEventsQuery>,
) -> Result<Json<Vec<WebhookEvent>>, ApiError> {
    let status = query
        .status
        .as_deref()
        .map(WebhookStatus::try_from)
        .transpose()?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .min(MAX_LIST_LIMIT);

    Ok(Json(state.service.list_events(status, limit).await?))
}

pub async fn get_event_handler(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<Json<EventStatusView>, ApiError> {
    let event_id: WebhookEventId = event_id.parse()?;
    Ok(Json(state.service.get_event_status(event_id).await?))
}

#[tracing::instrument(name = "manual_retry", skip_all)]
pub async fn retry_event_handler(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let event_id: WebhookEventId = event_id.parse()?;
    let job_id = state.service.retry_failed_event(event_id).await?;
    tracing::info!(%event_id, %job_id, "manual retry enqueued");

    Ok(Json(serde_json::json!({
        "status": "retrying",
        "event_id": event_id,
        "job_id": job_id,
    })))
}
