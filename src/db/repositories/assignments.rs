use crate::db::models::{Assignment, AssignmentStatus};
use crate::error::Error;
use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use std::sync::Arc;
use uuid::Uuid;

const ASSIGNMENT_COLUMNS: &str =
    "assignment_id, event_id, reviewer_id, status, deleted, created_at";

/// Assignments repository
#[derive(Clone)]
pub struct AssignmentsRepository {
    pool: Arc<PgPool>,
}

impl AssignmentsRepository {
    /// Create a new assignments repository
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Insert a pending assignment. The partial unique index on
    /// (event_id) WHERE NOT deleted rejects a second live assignment for the
    /// same event; that error aborts the surrounding transaction.
    pub async fn create_in_tx(
        &self,
        conn: &mut PgConnection,
        event_id: &Uuid,
        reviewer_id: i64,
    ) -> Result<Assignment> {
        let result = sqlx::query_as::<_, Assignment>(&format!(
            r#"
            INSERT INTO assignments (event_id, reviewer_id, status)
            VALUES ($1, $2, 'pending')
            RETURNING {}
            "#,
            ASSIGNMENT_COLUMNS
        ))
        .bind(event_id)
        .bind(reviewer_id)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| Error::Database(format!("Failed to create assignment: {}", e)))?;

        Ok(result)
    }

    /// Get assignment by ID
    pub async fn get_by_id(&self, assignment_id: i64) -> Result<Option<Assignment>> {
        let result = sqlx::query_as::<_, Assignment>(&format!(
            r#"
            SELECT {}
            FROM assignments
            WHERE assignment_id = $1
            "#,
            ASSIGNMENT_COLUMNS
        ))
        .bind(assignment_id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get assignment by ID: {}", e)))?;

        Ok(result)
    }

    /// Update the status of a live assignment
    pub async fn update_status_in_tx(
        &self,
        conn: &mut PgConnection,
        assignment_id: i64,
        status: AssignmentStatus,
    ) -> Result<Option<Assignment>> {
        let result = sqlx::query_as::<_, Assignment>(&format!(
            r#"
            UPDATE assignments
            SET status = $2
            WHERE assignment_id = $1 AND NOT deleted
            RETURNING {}
            "#,
            ASSIGNMENT_COLUMNS
        ))
        .bind(assignment_id)
        .bind(status)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| Error::Database(format!("Failed to update assignment status: {}", e)))?;

        Ok(result)
    }

    /// Soft-delete a batch of assignments that are still live and pending.
    /// Rows that reached a terminal status or were deleted since the caller
    /// read them are left untouched. Returns the event ids actually freed;
    /// only those may have their dedup markers removed.
    pub async fn soft_delete_in_tx(
        &self,
        conn: &mut PgConnection,
        assignment_ids: &[i64],
    ) -> Result<Vec<Uuid>> {
        let freed: Vec<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE assignments
            SET deleted = TRUE
            WHERE assignment_id = ANY($1) AND status = 'pending' AND NOT deleted
            RETURNING event_id
            "#,
        )
        .bind(assignment_ids)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| Error::Database(format!("Failed to soft-delete assignments: {}", e)))?;

        Ok(freed)
    }

    /// Live pending assignments created before the cutoff
    pub async fn expired_pending(&self, cutoff: DateTime<Utc>) -> Result<Vec<Assignment>> {
        let result = sqlx::query_as::<_, Assignment>(&format!(
            r#"
            SELECT {}
            FROM assignments
            WHERE status = 'pending' AND NOT deleted AND created_at < $1
            ORDER BY created_at
            "#,
            ASSIGNMENT_COLUMNS
        ))
        .bind(cutoff)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get expired assignments: {}", e)))?;

        Ok(result)
    }

    /// Live pending assignments held by one reviewer
    pub async fn pending_for_reviewer(&self, reviewer_id: i64) -> Result<Vec<Assignment>> {
        let result = sqlx::query_as::<_, Assignment>(&format!(
            r#"
            SELECT {}
            FROM assignments
            WHERE reviewer_id = $1 AND status = 'pending' AND NOT deleted
            ORDER BY created_at
            "#,
            ASSIGNMENT_COLUMNS
        ))
        .bind(reviewer_id)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get reviewer assignments: {}", e)))?;

        Ok(result)
    }

    /// Authoritative pending count for one reviewer, used to overwrite the
    /// cached load counter during reconciliation.
    pub async fn pending_count(&self, reviewer_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM assignments
            WHERE reviewer_id = $1 AND status = 'pending' AND NOT deleted
            "#,
        )
        .bind(reviewer_id)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to count pending assignments: {}", e)))?;

        Ok(count)
    }
}
