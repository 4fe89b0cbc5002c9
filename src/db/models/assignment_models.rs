use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Assignment status. `approved` and `rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "assignment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AssignmentStatus {
    Pending,
    Approved,
    Rejected,
}

impl AssignmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

/// Assignment model. At most one non-deleted assignment exists per event,
/// enforced by a partial unique index on (event_id) WHERE NOT deleted.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Assignment {
    pub assignment_id: i64,
    pub event_id: Uuid,
    pub reviewer_id: i64,
    pub status: AssignmentStatus,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}

/// Marker row preventing a second assignment decision for an event.
/// Written in the same transaction as the assignment; deleted only when
/// a reconciliation sweep discards the assignment.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DedupRecord {
    pub event_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(!AssignmentStatus::Pending.is_terminal());
        assert!(AssignmentStatus::Approved.is_terminal());
        assert!(AssignmentStatus::Rejected.is_terminal());
    }
}
