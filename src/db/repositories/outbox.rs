use crate::db::models::{OutboxStatus, PendingRelayRow};
use crate::error::Error;
use anyhow::Result;
use sqlx::{PgConnection, PgPool};
use std::sync::Arc;

/// Transactional outbox repository
#[derive(Clone)]
pub struct OutboxRepository {
    pool: Arc<PgPool>,
}

impl OutboxRepository {
    /// Create a new outbox repository
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Append an outbox entry within the transaction that produced the state
    /// change it describes.
    pub async fn create_in_tx(
        &self,
        conn: &mut PgConnection,
        assignment_id: i64,
        status: OutboxStatus,
    ) -> Result<()> {
        sqlx::query("INSERT INTO outbox_assignments (assignment_id, status) VALUES ($1, $2)")
            .bind(assignment_id)
            .bind(status)
            .execute(&mut *conn)
            .await
            .map_err(|e| Error::Database(format!("Failed to create outbox entry: {}", e)))?;

        Ok(())
    }

    /// Entries not yet confirmed by downstream, joined to their assignment.
    /// The relay re-reads this on every tick; rows stay here until the
    /// acknowledgment consumer marks them finished.
    pub async fn pending_relay(&self, limit: i64) -> Result<Vec<PendingRelayRow>> {
        let result = sqlx::query_as::<_, PendingRelayRow>(
            r#"
            SELECT o.id, o.assignment_id, a.event_id, a.reviewer_id
            FROM outbox_assignments o
            JOIN assignments a ON a.assignment_id = o.assignment_id
            WHERE o.status <> 'finished'
            ORDER BY o.created_at
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get pending outbox entries: {}", e)))?;

        Ok(result)
    }

    /// Mark all unfinished entries for an assignment as finished. Returns the
    /// number of rows changed; zero means a duplicate or unknown ack.
    pub async fn mark_finished_in_tx(
        &self,
        conn: &mut PgConnection,
        assignment_id: i64,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE outbox_assignments
            SET status = 'finished'
            WHERE assignment_id = $1 AND status <> 'finished'
            "#,
        )
        .bind(assignment_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| Error::Database(format!("Failed to mark outbox entry finished: {}", e)))?;

        Ok(result.rows_affected())
    }
}
