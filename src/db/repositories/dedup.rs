use crate::error::Error;
use anyhow::Result;
use sqlx::{PgConnection, PgPool};
use std::sync::Arc;
use uuid::Uuid;

/// Dedup records repository. A row per event that already produced an
/// assignment decision; its presence makes broker redelivery a no-op.
#[derive(Clone)]
pub struct DedupRepository {
    pool: Arc<PgPool>,
}

impl DedupRepository {
    /// Create a new dedup repository
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Whether an assignment decision was already made for this event
    pub async fn exists(&self, event_id: &Uuid) -> Result<bool> {
        let found: Option<Uuid> =
            sqlx::query_scalar("SELECT event_id FROM dedup_events WHERE event_id = $1")
                .bind(event_id)
                .fetch_optional(&*self.pool)
                .await
                .map_err(|e| Error::Database(format!("Failed to check dedup record: {}", e)))?;

        Ok(found.is_some())
    }

    /// Insert the dedup marker. The primary key rejects a duplicate, which
    /// aborts the surrounding transaction when two workers race one event.
    pub async fn create_in_tx(&self, conn: &mut PgConnection, event_id: &Uuid) -> Result<()> {
        sqlx::query("INSERT INTO dedup_events (event_id) VALUES ($1)")
            .bind(event_id)
            .execute(&mut *conn)
            .await
            .map_err(|e| Error::Database(format!("Failed to create dedup record: {}", e)))?;

        Ok(())
    }

    /// Delete dedup markers for a batch of events, freeing them for a fresh
    /// assignment decision.
    pub async fn delete_many_in_tx(
        &self,
        conn: &mut PgConnection,
        event_ids: &[Uuid],
    ) -> Result<u64> {
        let result = sqlx::query("DELETE FROM dedup_events WHERE event_id = ANY($1)")
            .bind(event_ids)
            .execute(&mut *conn)
            .await
            .map_err(|e| Error::Database(format!("Failed to delete dedup records: {}", e)))?;

        Ok(result.rows_affected())
    }
}
