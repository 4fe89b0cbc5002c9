use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outbox entry status. Entries start as `pending` (assignment created) or
/// `completed` (terminal status update); the acknowledgment consumer moves
/// them to `finished` once downstream confirms receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "outbox_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OutboxStatus {
    Pending,
    Completed,
    Finished,
}

/// Transactional outbox row. Append-only; rows are never deleted so the
/// table doubles as an audit log of relay attempts.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OutboxEntry {
    pub id: i64,
    pub assignment_id: i64,
    pub status: OutboxStatus,
    pub created_at: DateTime<Utc>,
}

/// Outbox row joined to its assignment, as read by the relay tick.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PendingRelayRow {
    pub id: i64,
    pub assignment_id: i64,
    pub event_id: Uuid,
    pub reviewer_id: i64,
}
