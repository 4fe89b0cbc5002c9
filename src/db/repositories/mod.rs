pub mod assignments;
pub mod dedup;
pub mod events;
pub mod outbox;

pub use assignments::AssignmentsRepository;
pub use dedup::DedupRepository;
pub use events::EventsRepository;
pub use outbox::OutboxRepository;
