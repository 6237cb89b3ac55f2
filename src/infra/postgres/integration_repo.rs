use {
    crate::domain::error::PipelineError,
    crate::domain::id::IntegrationId,
    crate::domain::integration::Integration,
    sqlx::PgPool,
    uuid::Uuid,
};

#[derive(sqlx::FromRow)]
struct IntegrationRow {
    id: Uuid,
    organization_id: String,
    active: bool,
    webhook_secret: Option<String>,
}

impl From<IntegrationRow> for Integration {
    fn from(row: IntegrationRow) -> Self {
        Self {
            id: IntegrationId::new(row.id),
            organization_id: row.organization_id,
            active: row.active,
            webhook_secret: row.webhook_secret,
        }
    }
}

pub async fn find_integration(
    pool: &PgPool,
    id: IntegrationId,
) -> Result<Option<Integration>, PipelineError> {
    let row = sqlx::query_as::<_, IntegrationRow>(
        "SELECT id, organization_id, active, webhook_secret FROM integrations WHERE id = $1",
    )
    .bind(id.as_uuid())
    .fetch_optional(pool)
    .await?;

    Ok(row.map(Integration::from))
}

/// Used by the test harness and seed tooling.
pub async fn insert_integration(pool: &PgPool, integration: &Integration) -> Result<(), PipelineError> {
    sqlx::query(
        r#"
        INSERT INTO integrations (id, organization_id, active, webhook_secret)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (id) DO UPDATE
        SET organization_id = EXCLUDED.organization_id,
            active = EXCLUDED.active,
            webhook_secret = EXCLUDED.webhook_secret,
            updated_at = now()
        "#,
    )
    .bind(integration.id.as_uuid())
    .bind(&integration.organization_id)
    .bind(integration.active)
    .bind(integration.webhook_secret.as_deref())
    .execute(pool)
    .await?;
    Ok(())
}
