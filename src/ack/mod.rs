use crate::db::repositories::{EventsRepository, OutboxRepository};
use crate::error::Error;
use crate::messaging::messages::AckMessage;
use crate::messaging::MessageBroker;
use anyhow::Result;
use futures_util::stream::StreamExt;
use lapin::options::{BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions};
use lapin::types::FieldTable;
use log::{error, info, warn};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Acknowledgment consumer: closes the relay loop once downstream confirms
/// an assignment was handled. Idempotent per assignment id, so it runs with
/// a higher prefetch than the inbound consumer.
pub struct AckConsumer {
    broker: Arc<MessageBroker>,
    pool: Arc<PgPool>,
    outbox: OutboxRepository,
    events: EventsRepository,
}

impl AckConsumer {
    pub fn new(broker: Arc<MessageBroker>, pool: Arc<PgPool>) -> Self {
        Self {
            broker,
            outbox: OutboxRepository::new(pool.clone()),
            events: EventsRepository::new(pool.clone()),
            pool,
        }
    }

    /// Spawn the consumer loop with fixed-delay reconnects
    pub fn start(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let retry_delay =
                Duration::from_millis(self.broker.config().retry_delay_ms);

            loop {
                if shutdown.is_cancelled() {
                    break;
                }

                if let Err(e) = self.consume(&shutdown).await {
                    error!("Acknowledgment consumer stopped: {}", e);
                }

                if shutdown.is_cancelled() {
                    break;
                }
                tokio::time::sleep(retry_delay).await;
            }

            info!("Acknowledgment consumer shut down");
        })
    }

    async fn consume(&self, shutdown: &CancellationToken) -> Result<()> {
        let queue = self.broker.config().ack_queue.clone();
        let prefetch = self.broker.config().ack_prefetch;
        let channel = self.broker.create_channel().await?;

        channel
            .basic_qos(prefetch, BasicQosOptions::default())
            .await?;

        let mut consumer = channel
            .basic_consume(
                &queue,
                "ack-consumer",
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        info!("Consuming acknowledgments from queue: {}", queue);

        loop {
            let delivery = tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                delivery = consumer.next() => delivery,
            };

            let delivery = match delivery {
                Some(Ok(delivery)) => delivery,
                Some(Err(e)) => {
                    error!("Error receiving acknowledgment: {}", e);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    continue;
                }
                None => return Ok(()),
            };

            let ack = match serde_json::from_slice::<AckMessage>(&delivery.data) {
                Ok(ack) => ack,
                Err(e) => {
                    error!("Dropping malformed acknowledgment: {}", e);
                    delivery
                        .nack(BasicNackOptions {
                            requeue: false,
                            ..Default::default()
                        })
                        .await?;
                    continue;
                }
            };

            match self.handle_ack(&ack).await {
                Ok(()) => {
                    delivery.ack(BasicAckOptions::default()).await?;
                }
                Err(e) => {
                    warn!(
                        "Requeueing acknowledgment for assignment {} after error: {}",
                        ack.assignment_id, e
                    );
                    delivery
                        .nack(BasicNackOptions {
                            requeue: true,
                            ..Default::default()
                        })
                        .await?;
                }
            }
        }
    }

    /// Mark the outbox entry finished and advance the event to Viewed. An
    /// unknown assignment is a duplicate or delayed redelivery, not an error.
    async fn handle_ack(&self, ack: &AckMessage) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Database(format!("Failed to begin transaction: {}", e)))?;

        let finished = self
            .outbox
            .mark_finished_in_tx(&mut *tx, ack.assignment_id)
            .await?;

        if finished == 0 {
            warn!(
                "No unfinished outbox entry for assignment {}; ignoring",
                ack.assignment_id
            );
            return Ok(());
        }

        self.events.mark_viewed_in_tx(&mut *tx, &ack.event_id).await?;

        tx.commit()
            .await
            .map_err(|e| Error::Database(format!("Failed to commit acknowledgment: {}", e)))?;

        info!(
            "Outbox entry for assignment {} marked finished",
            ack.assignment_id
        );

        Ok(())
    }
}
