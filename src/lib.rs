pub mod ack;
pub mod cache;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod jobs;
pub mod messaging;
pub mod relay;

pub use engine::AssignmentEngine;
pub use error::Error;
