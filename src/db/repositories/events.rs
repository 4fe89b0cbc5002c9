use crate::db::models::{Event, EventState};
use crate::error::Error;
use crate::messaging::messages::InboundEventMessage;
use anyhow::Result;
use sqlx::{PgConnection, PgPool};
use std::sync::Arc;
use uuid::Uuid;

/// Events repository for handling event operations
#[derive(Clone)]
pub struct EventsRepository {
    pool: Arc<PgPool>,
}

impl EventsRepository {
    /// Create a new events repository
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Get event by ID
    pub async fn get_by_id(&self, event_id: &Uuid) -> Result<Option<Event>> {
        let result = sqlx::query_as::<_, Event>(
            r#"
            SELECT event_id, region, rule_type, location, severity, device_id,
                   camera_id, frame_reference, state, created_at
            FROM events
            WHERE event_id = $1
            "#,
        )
        .bind(event_id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get event by ID: {}", e)))?;

        Ok(result)
    }

    /// Insert the event row if it does not exist yet. Part of the assignment
    /// transaction; upstream ingestion may have created the row already.
    pub async fn create_if_absent_in_tx(
        &self,
        conn: &mut PgConnection,
        message: &InboundEventMessage,
        state: EventState,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO events (
                event_id, region, rule_type, location, severity, device_id,
                camera_id, frame_reference, state
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(message.event_id)
        .bind(&message.region)
        .bind(&message.rule_type)
        .bind(&message.location)
        .bind(message.severity)
        .bind(&message.device_id)
        .bind(&message.camera_id)
        .bind(&message.frame_reference)
        .bind(state)
        .execute(&mut *conn)
        .await
        .map_err(|e| Error::Database(format!("Failed to create event: {}", e)))?;

        Ok(())
    }

    /// Advance an event that has not been viewed yet to Viewed. Returns the
    /// number of rows changed (zero when the event is unknown or already
    /// Viewed, which callers treat as a no-op).
    pub async fn mark_viewed_in_tx(&self, conn: &mut PgConnection, event_id: &Uuid) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE events
            SET state = 'Viewed'
            WHERE event_id = $1 AND state <> 'Viewed'
            "#,
        )
        .bind(event_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| Error::Database(format!("Failed to mark event viewed: {}", e)))?;

        Ok(result.rows_affected())
    }
}
