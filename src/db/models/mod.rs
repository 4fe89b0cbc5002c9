pub mod assignment_models;
pub mod event_models;
pub mod outbox_models;

pub use assignment_models::{Assignment, AssignmentStatus, DedupRecord};
pub use event_models::{Event, EventState};
pub use outbox_models::{OutboxEntry, OutboxStatus, PendingRelayRow};
