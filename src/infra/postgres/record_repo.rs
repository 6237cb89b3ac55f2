use {
    crate::domain::error::PipelineError,
    crate::domain::id::IntegrationId,
    crate::domain::records::{
        ClosingUpdate, ContactUpsert, DocumentUpsert, StatusChange, StatusChangeLog, TaskUpsert,
        TransactionUpsert,
    },
    chrono::{DateTime, Utc},
    sqlx::PgPool,
};

// Object metadata merges key by key, JSON null keeps the stored value,
// anything else replaces it. Mirrors `records::merge_metadata`.
fn merge_metadata_sql(table: &str) -> String {
    format!(
        "metadata = CASE \
         WHEN jsonb_typeof(EXCLUDED.metadata) = 'null' THEN {table}.metadata \
         WHEN jsonb_typeof({table}.metadata) = 'object' \
              AND jsonb_typeof(EXCLUDED.metadata) = 'object' THEN {table}.metadata || EXCLUDED.metadata \
         ELSE EXCLUDED.metadata END"
    )
}

pub async fn upsert_transaction(pool: &PgPool, tx: &TransactionUpsert) -> Result<(), PipelineError> {
    let sql = format!(
        r#"
        INSERT INTO transactions
            (integration_id, external_id, file_number, status, property_address, closing_date, metadata)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (integration_id, external_id) DO UPDATE
        SET file_number = COALESCE(EXCLUDED.file_number, transactions.file_number),
            status = COALESCE(EXCLUDED.status, transactions.status),
            property_address = COALESCE(EXCLUDED.property_address, transactions.property_address),
            closing_date = COALESCE(EXCLUDED.closing_date, transactions.closing_date),
            updated_at = now(), {}
        "#,
        merge_metadata_sql("transactions")
    );
    sqlx::query(&sql)
        .bind(tx.integration_id.as_uuid())
        .bind(&tx.external_id)
        .bind(tx.file_number.as_deref())
        .bind(tx.status.as_deref())
        .bind(tx.property_address.as_deref())
        .bind(tx.closing_date)
        .bind(&tx.metadata)
        .execute(pool)
        .await?;
    Ok(())
}

/// Log append and transaction update commit together. A source event that
/// is already logged leaves both untouched.
pub async fn apply_status_change(pool: &PgPool, change: &StatusChange) -> Result<(), PipelineError> {
    let log = StatusChangeLog::from_change(change);
    let mut tx = pool.begin().await?;

    let inserted: Option<bool> = sqlx::query_scalar(
        r#"
        INSERT INTO status_change_logs
            (id, integration_id, transaction_external_id, old_status, new_status,
             changed_at, changed_by, source_event_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (integration_id, source_event_id) DO NOTHING
        RETURNING true
        "#,
    )
    .bind(log.id)
    .bind(log.integration_id.as_uuid())
    .bind(&log.transaction_external_id)
    .bind(log.old_status.as_deref())
    .bind(&log.new_status)
    .bind(log.changed_at)
    .bind(log.changed_by.as_deref())
    .bind(&log.source_event_id)
    .fetch_optional(&mut *tx)
    .await?;

    if inserted.is_none() {
        tx.commit().await?;
        return Ok(());
    }

    sqlx::query(
        r#"
        INSERT INTO transactions (integration_id, external_id, status, previous_status)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (integration_id, external_id) DO UPDATE
        SET previous_status = COALESCE($4, transactions.status),
            status = EXCLUDED.status,
            updated_at = now()
        "#,
    )
    .bind(change.integration_id.as_uuid())
    .bind(&change.transaction_external_id)
    .bind(&change.new_status)
    .bind(change.old_status.as_deref())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

pub async fn update_closing(pool: &PgPool, update: &ClosingUpdate) -> Result<(), PipelineError> {
    sqlx::query(
        r#"
        INSERT INTO transactions (integration_id, external_id, closing_date, closing_location, closed_at)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (integration_id, external_id) DO UPDATE
        SET closing_date = COALESCE(EXCLUDED.closing_date, transactions.closing_date),
            closing_location = COALESCE(EXCLUDED.closing_location, transactions.closing_location),
            closed_at = COALESCE(EXCLUDED.closed_at, transactions.closed_at),
            updated_at = now()
        "#,
    )
    .bind(update.integration_id.as_uuid())
    .bind(&update.transaction_external_id)
    .bind(update.closing_date)
    .bind(update.location.as_deref())
    .bind(update.closed_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn upsert_document(pool: &PgPool, doc: &DocumentUpsert) -> Result<(), PipelineError> {
    let sql = format!(
        r#"
        INSERT INTO documents
            (integration_id, external_id, transaction_external_id, name, document_type, url, metadata)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (integration_id, external_id) DO UPDATE
        SET transaction_external_id = COALESCE(EXCLUDED.transaction_external_id, documents.transaction_external_id),
            name = COALESCE(EXCLUDED.name, documents.name),
            document_type = COALESCE(EXCLUDED.document_type, documents.document_type),
            url = COALESCE(EXCLUDED.url, documents.url),
            removed_at = NULL,
            updated_at = now(), {}
        "#,
        merge_metadata_sql("documents")
    );
    sqlx::query(&sql)
        .bind(doc.integration_id.as_uuid())
        .bind(&doc.external_id)
        .bind(doc.transaction_external_id.as_deref())
        .bind(doc.name.as_deref())
        .bind(doc.document_type.as_deref())
        .bind(doc.url.as_deref())
        .bind(&doc.metadata)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn mark_document_removed(
    pool: &PgPool,
    integration_id: IntegrationId,
    external_id: &str,
    removed_at: DateTime<Utc>,
) -> Result<(), PipelineError> {
    sqlx::query(
        r#"
        INSERT INTO documents (integration_id, external_id, removed_at)
        VALUES ($1, $2, $3)
        ON CONFLICT (integration_id, external_id) DO UPDATE
        SET removed_at = COALESCE(documents.removed_at, EXCLUDED.removed_at),
            updated_at = now()
        "#,
    )
    .bind(integration_id.as_uuid())
    .bind(external_id)
    .bind(removed_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn upsert_contact(pool: &PgPool, contact: &ContactUpsert) -> Result<(), PipelineError> {
    let sql = format!(
        r#"
        INSERT INTO contacts
            (integration_id, external_id, transaction_external_id, first_name, last_name,
             email, phone, role, metadata)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (integration_id, external_id) DO UPDATE
        SET transaction_external_id = COALESCE(EXCLUDED.transaction_external_id, contacts.transaction_external_id),
            first_name = COALESCE(EXCLUDED.first_name, contacts.first_name),
            last_name = COALESCE(EXCLUDED.last_name, contacts.last_name),
            email = COALESCE(EXCLUDED.email, contacts.email),
            phone = COALESCE(EXCLUDED.phone, contacts.phone),
            role = COALESCE(EXCLUDED.role, contacts.role),
            updated_at = now(), {}
        "#,
        merge_metadata_sql("contacts")
    );
    sqlx::query(&sql)
        .bind(contact.integration_id.as_uuid())
        .bind(&contact.external_id)
        .bind(contact.transaction_external_id.as_deref())
        .bind(contact.first_name.as_deref())
        .bind(contact.last_name.as_deref())
        .bind(contact.email.as_deref())
        .bind(contact.phone.as_deref())
        .bind(contact.role.as_deref())
        .bind(&contact.metadata)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn remove_contact(
    pool: &PgPool,
    integration_id: IntegrationId,
    external_id: &str,
) -> Result<(), PipelineError> {
    sqlx::query("DELETE FROM contacts WHERE integration_id = $1 AND external_id = $2")
        .bind(integration_id.as_uuid())
        .bind(external_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn upsert_task(pool: &PgPool, task: &TaskUpsert) -> Result<(), PipelineError> {
    let sql = format!(
        r#"
        INSERT INTO tasks
            (integration_id, external_id, transaction_external_id, title, due_date,
             assigned_to, completed_at, metadata)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (integration_id, external_id) DO UPDATE
        SET transaction_external_id = COALESCE(EXCLUDED.transaction_external_id, tasks.transaction_external_id),
            title = COALESCE(EXCLUDED.title, tasks.title),
            due_date = COALESCE(EXCLUDED.due_date, tasks.due_date),
            assigned_to = COALESCE(EXCLUDED.assigned_to, tasks.assigned_to),
            completed_at = COALESCE(EXCLUDED.completed_at, tasks.completed_at),
            updated_at = now(), {}
        "#,
        merge_metadata_sql("tasks")
    );
    sqlx::query(&sql)
        .bind(task.integration_id.as_uuid())
        .bind(&task.external_id)
        .bind(task.transaction_external_id.as_deref())
        .bind(task.title.as_deref())
        .bind(task.due_date)
        .bind(task.assigned_to.as_deref())
        .bind(task.completed_at)
        .bind(&task.metadata)
        .execute(pool)
        .await?;
    Ok(())
}
