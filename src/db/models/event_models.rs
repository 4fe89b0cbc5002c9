use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a monitoring event. Transitions are monotonic:
/// NotViewed -> Processing -> Viewed, never backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "event_state")]
pub enum EventState {
    NotViewed,
    Processing,
    Viewed,
}

/// Security/monitoring event model
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Event {
    pub event_id: Uuid,
    pub region: Option<String>,
    pub rule_type: Option<String>,
    pub location: Option<String>,
    pub severity: Option<i32>,
    pub device_id: Option<String>,
    pub camera_id: Option<String>,
    pub frame_reference: Option<String>,
    pub state: EventState,
    pub created_at: DateTime<Utc>,
}
