use {
    crate::domain::error::PipelineError,
    crate::domain::event_type::WebhookEventType,
    crate::domain::id::{ExternalEventId, IntegrationId, WebhookEventId},
    crate::domain::priority::Priority,
    crate::domain::webhook_event::{FailureOutcome, NewWebhookEvent, WebhookEvent, WebhookStatus},
    chrono::{DateTime, Utc},
    sqlx::PgPool,
    uuid::Uuid,
};

const EVENT_COLUMNS: &str = "id, integration_id, event_type, external_event_id, status, priority, \
     retry_count, last_retry_at, received_at, processed_at, error, payload, updated_at";

#[derive(sqlx::FromRow)]
struct WebhookEventRow {
    id: Uuid,
    integration_id: Uuid,
    event_type: String,
    external_event_id: String,
    status: String,
    priority: i16,
    retry_count: i32,
    last_retry_at: Option<DateTime<Utc>>,
    received_at: DateTime<Utc>,
    processed_at: Option<DateTime<Utc>>,
    error: Option<String>,
    payload: serde_json::Value,
    updated_at: DateTime<Utc>,
}

impl TryFrom<WebhookEventRow> for WebhookEvent {
    type Error = PipelineError;

    fn try_from(row: WebhookEventRow) -> Result<Self, Self::Error> {
        let priority = u8::try_from(row.priority)
            .map_err(|_| PipelineError::Validation(format!("bad stored priority: {}", row.priority)))
            .and_then(Priority::try_from)?;
        let retry_count = u32::try_from(row.retry_count).map_err(|_| {
            PipelineError::Validation(format!("bad stored retry_count: {}", row.retry_count))
        })?;

        Ok(Self {
            id: WebhookEventId::from_uuid(row.id),
            integration_id: IntegrationId::new(row.integration_id),
            event_type: WebhookEventType::try_from(row.event_type.as_str())?,
            external_event_id: ExternalEventId::new(row.external_event_id)?,
            status: WebhookStatus::try_from(row.status.as_str())?,
            priority,
            retry_count,
            last_retry_at: row.last_retry_at,
            received_at: row.received_at,
            processed_at: row.processed_at,
            error: row.error,
            payload: row.payload,
            updated_at: row.updated_at,
        })
    }
}

fn rows_to_events(rows: Vec<WebhookEventRow>) -> Result<Vec<WebhookEvent>, PipelineError> {
    rows.into_iter().map(WebhookEvent::try_from).collect()
}

fn budget(max_retries: u32) -> i32 {
    i32::try_from(max_retries).unwrap_or(i32::MAX)
}

pub async fn insert_event(
    pool: &PgPool,
    event: &NewWebhookEvent,
) -> Result<WebhookEvent, PipelineError> {
    let row = sqlx::query_as::<_, WebhookEventRow>(&format!(
        r#"
        INSERT INTO webhook_events
            (id, integration_id, event_type, external_event_id, status,
             priority, received_at, payload, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $7)
        RETURNING {EVENT_COLUMNS}
        "#
    ))
    .bind(event.id().as_uuid())
    .bind(event.integration_id().as_uuid())
    .bind(event.event_type().as_str())
    .bind(event.external_event_id().as_str())
    .bind(WebhookStatus::Received.as_str())
    .bind(i16::from(event.priority().value()))
    .bind(event.received_at())
    .bind(event.payload())
    .fetch_one(pool)
    .await?;

    row.try_into()
}

pub async fn find_event(
    pool: &PgPool,
    id: WebhookEventId,
) -> Result<Option<WebhookEvent>, PipelineError> {
    let row = sqlx::query_as::<_, WebhookEventRow>(&format!(
        "SELECT {EVENT_COLUMNS} FROM webhook_events WHERE id = $1"
    ))
    .bind(id.as_uuid())
    .fetch_optional(pool)
    .await?;

    row.map(WebhookEvent::try_from).transpose()
}

pub async fn set_status(
    pool: &PgPool,
    id: WebhookEventId,
    status: WebhookStatus,
) -> Result<(), PipelineError> {
    let result =
        sqlx::query("UPDATE webhook_events SET status = $2, updated_at = now() WHERE id = $1")
            .bind(id.as_uuid())
            .bind(status.as_str())
            .execute(pool)
            .await?;

    if result.rows_affected() == 0 {
        return Err(PipelineError::EventNotFound(id));
    }
    Ok(())
}

pub async fn mark_completed(
    pool: &PgPool,
    id: WebhookEventId,
    processed_at: DateTime<Utc>,
) -> Result<(), PipelineError> {
    let result = sqlx::query(
        r#"
        UPDATE webhook_events
        SET status = 'COMPLETED', processed_at = $2, error = NULL, updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(id.as_uuid())
    .bind(processed_at)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(PipelineError::EventNotFound(id));
    }
    Ok(())
}

/// Increment and status decision in one statement; right-hand sides see the
/// pre-update `retry_count`.
pub async fn record_failure(
    pool: &PgPool,
    id: WebhookEventId,
    error: &str,
    max_retries: u32,
) -> Result<Option<FailureOutcome>, PipelineError> {
    let row: Option<(i32, String)> = sqlx::query_as(
        r#"
        UPDATE webhook_events
        SET retry_count = LEAST(retry_count + 1, $3),
            status = CASE WHEN retry_count + 1 < $3 THEN 'RETRYING' ELSE 'FAILED' END,
            last_retry_at = CASE WHEN retry_count + 1 < $3 THEN now() ELSE last_retry_at END,
            error = $2,
            updated_at = now()
        WHERE id = $1
        RETURNING retry_count, status
        "#,
    )
    .bind(id.as_uuid())
    .bind(error)
    .bind(budget(max_retries))
    .fetch_optional(pool)
    .await?;

    let Some((retry_count, status)) = row else {
        return Ok(None);
    };
    let retry_count = u32::try_from(retry_count)
        .map_err(|_| PipelineError::Validation(format!("bad stored retry_count: {retry_count}")))?;

    match WebhookStatus::try_from(status.as_str())? {
        WebhookStatus::Retrying => Ok(Some(FailureOutcome::Retrying { retry_count })),
        _ => Ok(Some(FailureOutcome::Failed { retry_count })),
    }
}

pub async fn begin_manual_retry(
    pool: &PgPool,
    id: WebhookEventId,
    max_retries: u32,
) -> Result<WebhookEvent, PipelineError> {
    let row = sqlx::query_as::<_, WebhookEventRow>(&format!(
        r#"
        UPDATE webhook_events
        SET retry_count = retry_count + 1,
            status = 'RETRYING',
            last_retry_at = now(),
            updated_at = now()
        WHERE id = $1 AND retry_count < $2
        RETURNING {EVENT_COLUMNS}
        "#
    ))
    .bind(id.as_uuid())
    .bind(budget(max_retries))
    .fetch_optional(pool)
    .await?;

    if let Some(row) = row {
        return row.try_into();
    }

    // Nothing updated: tell a missing row from an exhausted one.
    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM webhook_events WHERE id = $1)")
        .bind(id.as_uuid())
        .fetch_one(pool)
        .await?;

    if exists {
        Err(PipelineError::MaxRetriesExceeded {
            event_id: id,
            max_retries,
        })
    } else {
        Err(PipelineError::EventNotFound(id))
    }
}

pub async fn list_events(
    pool: &PgPool,
    status: Option<WebhookStatus>,
    limit: usize,
) -> Result<Vec<WebhookEvent>, PipelineError> {
    let rows = sqlx::query_as::<_, WebhookEventRow>(&format!(
        r#"
        SELECT {EVENT_COLUMNS} FROM webhook_events
        WHERE ($1::text IS NULL OR status = $1)
        ORDER BY id DESC
        LIMIT $2
        "#
    ))
    .bind(status.map(|s| s.as_str()))
    .bind(i64::try_from(limit).unwrap_or(i64::MAX))
    .fetch_all(pool)
    .await?;

    rows_to_events(rows)
}

pub async fn list_unfinished(pool: &PgPool) -> Result<Vec<WebhookEvent>, PipelineError> {
    let rows = sqlx::query_as::<_, WebhookEventRow>(&format!(
        r#"
        SELECT {EVENT_COLUMNS} FROM webhook_events
        WHERE status NOT IN ('COMPLETED', 'FAILED')
        ORDER BY id
        "#
    ))
    .fetch_all(pool)
    .await?;

    rows_to_events(rows)
}
