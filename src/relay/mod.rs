use crate::config::RelayConfig;
use crate::db::repositories::OutboxRepository;
use crate::messaging::messages::RelayMessage;
use crate::messaging::MessageBroker;
use anyhow::Result;
use log::{debug, error, info, warn};
use sqlx::PgPool;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tokio_util::sync::CancellationToken;

/// Outbox relay: on every tick, re-reads the outbox entries downstream has
/// not confirmed yet and publishes one message per entry.
///
/// The relay never marks entries finished; only the acknowledgment consumer
/// does. A crash between commit and publish loses nothing because the next
/// tick re-reads the same rows, so delivery is at-least-once by construction.
pub struct OutboxRelay {
    config: RelayConfig,
    outbox: OutboxRepository,
    broker: Arc<MessageBroker>,
}

impl OutboxRelay {
    pub fn new(config: RelayConfig, pool: Arc<PgPool>, broker: Arc<MessageBroker>) -> Self {
        Self {
            config,
            outbox: OutboxRepository::new(pool),
            broker,
        }
    }

    /// Spawn the relay tick loop
    pub fn start(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                "Outbox relay started with interval of {} seconds",
                self.config.interval_secs
            );

            let mut tick = interval(Duration::from_secs(self.config.interval_secs));

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tick.tick() => {
                        if let Err(e) = self.run_tick().await {
                            error!("Error running outbox relay tick: {}", e);
                        }
                    }
                }
            }

            info!("Outbox relay shut down");
        })
    }

    /// Publish every not-yet-finished outbox entry, up to the batch size.
    /// A publish failure leaves the entry untouched for the next tick.
    pub async fn run_tick(&self) -> Result<()> {
        let pending = self.outbox.pending_relay(self.config.batch_size).await?;
        if pending.is_empty() {
            return Ok(());
        }

        debug!("Relaying {} outbox entries", pending.len());

        let queue = self.broker.config().outbound_queue.clone();
        let channel = self.broker.create_channel().await?;

        for row in pending {
            let message = RelayMessage {
                assignment_id: row.assignment_id,
                event_id: row.event_id,
                reviewer_id: row.reviewer_id,
            };

            if let Err(e) = self.broker.publish(&channel, &queue, &message).await {
                warn!(
                    "Failed to relay outbox entry {} (assignment {}): {}",
                    row.id, row.assignment_id, e
                );
                // The entry stays unfinished and is retried next tick
            }
        }

        Ok(())
    }
}
