use crate::config::MessageBrokerConfig;
use crate::error::Error;
use anyhow::Result;
use deadpool_lapin::{Config, Manager, Pool};
use lapin::{
    options::{BasicPublishOptions, QueueDeclareOptions},
    types::FieldTable,
    BasicProperties, Channel, ConnectionProperties,
};
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// RabbitMQ message broker backed by a connection pool. Publishing and
/// consuming both go through durable named queues on the default exchange
/// with manual acknowledgment.
pub struct MessageBroker {
    pool: Pool,
    config: MessageBrokerConfig,
}

impl MessageBroker {
    /// Create a new message broker and declare the queues it serves
    pub async fn new(config: MessageBrokerConfig) -> Result<Self> {
        let pool_config = Config {
            url: Some(config.uri.clone()),
            pool: Some(deadpool_lapin::PoolConfig {
                max_size: config.pool_size as usize,
                queue_mode: deadpool::managed::QueueMode::Fifo,
                timeouts: deadpool::managed::Timeouts {
                    wait: Some(Duration::from_millis(config.timeout_ms)),
                    create: Some(Duration::from_millis(config.timeout_ms)),
                    recycle: Some(Duration::from_millis(config.timeout_ms)),
                },
            }),
            connection_properties: ConnectionProperties::default(),
        };
        let pool = pool_config.create_pool(Some(deadpool_lapin::Runtime::Tokio1))?;

        let broker = Self { pool, config };
        broker.init().await?;

        Ok(broker)
    }

    /// Declare the durable queues the dispatcher uses
    async fn init(&self) -> Result<()> {
        let channel = self.create_channel().await?;

        for queue in [
            &self.config.inbound_queue,
            &self.config.outbound_queue,
            &self.config.ack_queue,
        ] {
            self.declare_queue(&channel, queue).await?;
        }

        info!("RabbitMQ message broker initialized");

        Ok(())
    }

    async fn declare_queue(&self, channel: &Channel, queue: &str) -> Result<()> {
        channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| Error::Broker(format!("Failed to declare queue {}: {}", queue, e)))?;

        debug!("Declared durable queue: {}", queue);

        Ok(())
    }

    /// Get a connection from the pool with bounded retry
    async fn get_connection(&self) -> Result<deadpool::managed::Object<Manager>> {
        let mut attempts = 0;
        let max_attempts = self.config.retry_attempts;

        loop {
            attempts += 1;
            match self.pool.get().await {
                Ok(conn) => return Ok(conn),
                Err(err) => {
                    if attempts >= max_attempts {
                        return Err(Error::Broker(format!(
                            "Failed to get RabbitMQ connection after {} attempts: {}",
                            attempts, err
                        ))
                        .into());
                    }

                    warn!(
                        "Failed to get RabbitMQ connection (attempt {}/{}): {}",
                        attempts, max_attempts, err
                    );

                    tokio::time::sleep(Duration::from_millis(self.config.retry_delay_ms)).await;
                }
            }
        }
    }

    /// Open a fresh channel. Consumers own their channel for the lifetime of
    /// their consume loop; publishers open one per call site and reuse it.
    pub async fn create_channel(&self) -> Result<Channel> {
        let conn = self.get_connection().await?;
        let channel = conn
            .create_channel()
            .await
            .map_err(|e| Error::Broker(format!("Failed to create RabbitMQ channel: {}", e)))?;

        Ok(channel)
    }

    /// Publish a persistent JSON message to a durable queue
    pub async fn publish<T: Serialize + Send + Sync>(
        &self,
        channel: &Channel,
        queue: &str,
        payload: &T,
    ) -> Result<()> {
        let message = serde_json::to_vec(payload)
            .map_err(|e| Error::Serialization(format!("Failed to encode message: {}", e)))?;

        channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                &message,
                BasicProperties::default().with_delivery_mode(2),
            )
            .await
            .map_err(|e| Error::Broker(format!("Failed to publish message: {}", e)))?;

        debug!("Published message to queue: {}", queue);

        Ok(())
    }

    pub fn config(&self) -> &MessageBrokerConfig {
        &self.config
    }
}

/// Create a message broker service
pub async fn create_message_broker(config: MessageBrokerConfig) -> Result<Arc<MessageBroker>> {
    let broker = MessageBroker::new(config).await?;

    Ok(Arc::new(broker))
}
