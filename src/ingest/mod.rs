use crate::engine::AssignmentEngine;
use crate::messaging::messages::InboundEventMessage;
use crate::messaging::MessageBroker;
use anyhow::Result;
use futures_util::stream::StreamExt;
use lapin::options::{BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions};
use lapin::types::FieldTable;
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Inbound event consumer and dedup gate.
///
/// Runs with prefetch = 1 so only one assignment decision is in flight at a
/// time; that ordering is what keeps two deliveries of the same event from
/// racing past the dedup check before either commits.
pub struct IngestConsumer {
    broker: Arc<MessageBroker>,
    engine: Arc<AssignmentEngine>,
}

impl IngestConsumer {
    pub fn new(broker: Arc<MessageBroker>, engine: Arc<AssignmentEngine>) -> Self {
        Self { broker, engine }
    }

    /// Spawn the consumer loop. Reconnects with a fixed delay on channel or
    /// connection loss until shutdown is signalled.
    pub fn start(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let retry_delay =
                Duration::from_millis(self.broker.config().retry_delay_ms);

            loop {
                if shutdown.is_cancelled() {
                    break;
                }

                if let Err(e) = self.consume(&shutdown).await {
                    error!("Inbound consumer stopped: {}", e);
                }

                if shutdown.is_cancelled() {
                    break;
                }
                tokio::time::sleep(retry_delay).await;
            }

            info!("Inbound consumer shut down");
        })
    }

    async fn consume(&self, shutdown: &CancellationToken) -> Result<()> {
        let queue = self.broker.config().inbound_queue.clone();
        let channel = self.broker.create_channel().await?;

        channel
            .basic_qos(1, BasicQosOptions::default())
            .await?;

        let mut consumer = channel
            .basic_consume(
                &queue,
                "ingest-consumer",
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        info!("Consuming inbound events from queue: {}", queue);

        loop {
            let delivery = tokio::select! {
                _ = shutdown.cancelled() => {
                    // Unacked deliveries are requeued by the broker once the
                    // channel closes.
                    return Ok(());
                }
                delivery = consumer.next() => delivery,
            };

            let delivery = match delivery {
                Some(Ok(delivery)) => delivery,
                Some(Err(e)) => {
                    error!("Error receiving inbound message: {}", e);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    continue;
                }
                None => return Ok(()),
            };

            let event = match serde_json::from_slice::<InboundEventMessage>(&delivery.data) {
                Ok(event) => event,
                Err(e) => {
                    // Poison message: it can never succeed, drop it
                    error!("Dropping malformed inbound event: {}", e);
                    delivery
                        .nack(BasicNackOptions {
                            requeue: false,
                            ..Default::default()
                        })
                        .await?;
                    continue;
                }
            };

            match self.handle_event(&event).await {
                Ok(()) => {
                    delivery.ack(BasicAckOptions::default()).await?;
                }
                Err(e) => {
                    // Transient failure: requeue for a later delivery attempt
                    warn!("Requeueing event {} after error: {}", event.event_id, e);
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

    async fn handle_event(&self, event: &InboundEventMessage) -> Result<()> {
        if self.engine.already_processed(event).await? {
            debug!("Event {} already processed", event.event_id);
            return Ok(());
        }

        // No eligible reviewer is a business no-op: the message is acked and
        // redelivery or upstream re-polling retries the event later.
        self.engine.assign(event).await?;

        Ok(())
    }
}
