//! Durable PostgreSQL buffer for open business transactions.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use siteline_core::consumer::{EventRecord, TransactionBufferRepository};
use siteline_core::error::DomainError;
use siteline_core::identity::EventEnvelope;
use siteline_messages::Payload;

use crate::storage_error;

/// PostgreSQL-backed transaction buffer.
///
/// Rows are keyed by `(transaction_id, event_offset)` with
/// `ON CONFLICT DO NOTHING`, so a redelivered record buffers at most once.
#[derive(Debug, Clone)]
pub struct PgTransactionBufferRepository {
    pool: PgPool,
}

impl PgTransactionBufferRepository {
    /// Creates a buffer over the given pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionBufferRepository<Payload> for PgTransactionBufferRepository {
    async fn save(
        &self,
        transaction_id: Uuid,
        record: &EventRecord<Payload>,
    ) -> Result<(), DomainError> {
        let envelope = serde_json::to_value(&record.envelope)
            .map_err(|error| DomainError::Storage(error.to_string()))?;
        let result = sqlx::query(
            "INSERT INTO transaction_event_buffer (transaction_id, event_offset, envelope) \
             VALUES ($1, $2, $3) ON CONFLICT (transaction_id, event_offset) DO NOTHING",
        )
        .bind(transaction_id)
        .bind(record.offset)
        .bind(envelope)
        .execute(&self.pool)
        .await
        .map_err(|error| storage_error(&error))?;
        if result.rows_affected() == 0 {
            debug!(
                transaction = %transaction_id,
                offset = record.offset,
                "record already buffered, skipping"
            );
        }
        Ok(())
    }

    async fn load(&self, transaction_id: Uuid) -> Result<Vec<EventRecord<Payload>>, DomainError> {
        let rows = sqlx::query(
            "SELECT event_offset, envelope FROM transaction_event_buffer \
             WHERE transaction_id = $1 ORDER BY event_offset",
        )
        .bind(transaction_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| storage_error(&error))?;
        rows.into_iter()
            .map(|row| {
                let offset: i64 = row.try_get("event_offset").map_err(|e| storage_error(&e))?;
                let envelope: serde_json::Value =
                    row.try_get("envelope").map_err(|e| storage_error(&e))?;
                let envelope: EventEnvelope<Payload> = serde_json::from_value(envelope)
                    .map_err(|error| DomainError::Storage(error.to_string()))?;
                Ok(EventRecord::new(envelope, offset))
            })
            .collect()
    }

    async fn delete(&self, transaction_id: Uuid) -> Result<(), DomainError> {
        sqlx::query("DELETE FROM transaction_event_buffer WHERE transaction_id = $1")
            .bind(transaction_id)
            .execute(&self.pool)
            .await
            .map_err(|error| storage_error(&error))?;
        Ok(())
    }

    async fn open_transactions(&self) -> Result<Vec<Uuid>, DomainError> {
        let rows = sqlx::query(
            "SELECT transaction_id FROM transaction_event_buffer \
             GROUP BY transaction_id ORDER BY MIN(inserted_at)",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| storage_error(&error))?;
        rows.into_iter()
            .map(|row| row.try_get("transaction_id").map_err(|e| storage_error(&e)))
            .collect()
    }
}
