pub mod broker;
pub mod messages;

#[cfg(test)]
mod tests;

pub use broker::{create_message_broker, MessageBroker};
pub use messages::{AckMessage, InboundEventMessage, RelayMessage};
