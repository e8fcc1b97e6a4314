use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Executor, PgPool, Postgres, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    NewOutboxEvent, OutboxError, OutboxEvent, OutboxEventId, Result, store::OutboxStore,
};

const SELECT_COLUMNS: &str =
    "id, aggregate_type, aggregate_id, event_type, payload, retry_count, created_at, published_at";

/// Inserts an outbox record using any Postgres executor.
///
/// Pass `&mut *tx` to write the event in the same transaction as the state
/// change it describes.
pub async fn insert_event<'c, E>(executor: E, event: &NewOutboxEvent) -> Result<OutboxEvent>
where
    E: Executor<'c, Database = Postgres>,
{
    let row = sqlx::query(&format!(
        r#"
        INSERT INTO outbox_events (id, aggregate_type, aggregate_id, event_type, payload, retry_count, created_at)
        VALUES ($1, $2, $3, $4, $5, 0, $6)
        RETURNING {SELECT_COLUMNS}
        "#
    ))
    .bind(event.id.as_uuid())
    .bind(&event.aggregate_type)
    .bind(&event.aggregate_id)
    .bind(&event.event_type)
    .bind(&event.payload)
    .bind(event.created_at)
    .fetch_one(executor)
    .await?;

    row_to_event(row)
}

fn row_to_event(row: PgRow) -> Result<OutboxEvent> {
    Ok(OutboxEvent {
        id: OutboxEventId::from_uuid(row.try_get::<Uuid, _>("id")?),
        aggregate_type: row.try_get("aggregate_type")?,
        aggregate_id: row.try_get("aggregate_id")?,
        event_type: row.try_get("event_type")?,
        payload: row.try_get("payload")?,
        retry_count: row.try_get("retry_count")?,
        created_at: row.try_get("created_at")?,
        published_at: row.try_get("published_at")?,
    })
}

/// PostgreSQL-backed outbox store.
#[derive(Clone)]
pub struct PostgresOutboxStore {
    pool: PgPool,
}

impl PostgresOutboxStore {
    /// Creates a new PostgreSQL outbox store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl OutboxStore for PostgresOutboxStore {
    async fn create_event(&self, event: NewOutboxEvent) -> Result<OutboxEvent> {
        insert_event(&self.pool, &event).await
    }

    async fn list_unpublished(&self, limit: usize) -> Result<Vec<OutboxEvent>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM outbox_events
            WHERE published_at IS NULL
            ORDER BY created_at ASC
            LIMIT $1
            "#
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_event).collect()
    }

    async fn mark_published(&self, id: OutboxEventId, at: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query("UPDATE outbox_events SET published_at = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(at)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(OutboxError::EventNotFound(id));
        }
        Ok(())
    }

    async fn increment_retry(&self, id: OutboxEventId) -> Result<()> {
        let result =
            sqlx::query("UPDATE outbox_events SET retry_count = retry_count + 1 WHERE id = $1")
                .bind(id.as_uuid())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(OutboxError::EventNotFound(id));
        }
        Ok(())
    }

    async fn get_event(&self, id: OutboxEventId) -> Result<Option<OutboxEvent>> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM outbox_events WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_event).transpose()
    }
}
