use {crate::domain::error::PipelineError, sqlx::PgPool, std::time::Duration};

pub async fn is_duplicate(pool: &PgPool, key: &str) -> Result<bool, PipelineError> {
    let live: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM dedup_keys WHERE key = $1 AND expires_at > now())",
    )
    .bind(key)
    .fetch_one(pool)
    .await?;
    Ok(live)
}

/// Set-if-not-exists. An expired row is overwritten as if it were absent.
pub async fn mark_seen(pool: &PgPool, key: &str, ttl: Duration) -> Result<bool, PipelineError> {
    let inserted: Option<bool> = sqlx::query_scalar(
        r#"
        INSERT INTO dedup_keys (key, expires_at)
        VALUES ($1, now() + make_interval(secs => $2))
        ON CONFLICT (key) DO UPDATE
        SET expires_at = EXCLUDED.expires_at
        WHERE dedup_keys.expires_at <= now()
        RETURNING true
        "#,
    )
    .bind(key)
    .bind(ttl.as_secs_f64())
    .fetch_optional(pool)
    .await?;
    Ok(inserted.is_some())
}

pub async fn purge_expired(pool: &PgPool) -> Result<u64, PipelineError> {
    let result = sqlx::query("DELETE FROM dedup_keys WHERE expires_at <= now()")
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
