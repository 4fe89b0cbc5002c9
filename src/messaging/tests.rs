use super::broker::create_message_broker;
use super::messages::RelayMessage;
use crate::config::MessageBrokerConfig;
use anyhow::Result;
use futures_util::stream::StreamExt;
use lapin::options::{BasicAckOptions, BasicConsumeOptions};
use lapin::types::FieldTable;
use std::time::Duration;
use tokio::time::timeout;
use uuid::Uuid;

// Tests that need a live RabbitMQ are skipped unless TEST_RABBITMQ is set.

#[tokio::test]
async fn test_create_message_broker() -> Result<()> {
    if std::env::var("TEST_RABBITMQ").is_err() {
        println!("Skipping RabbitMQ test. Set TEST_RABBITMQ=1 to run.");
        return Ok(());
    }

    let config = MessageBrokerConfig::default();
    create_message_broker(config).await?;

    Ok(())
}

#[tokio::test]
async fn test_publish_and_consume_roundtrip() -> Result<()> {
    if std::env::var("TEST_RABBITMQ").is_err() {
        println!("Skipping RabbitMQ test. Set TEST_RABBITMQ=1 to run.");
        return Ok(());
    }

    let suffix = Uuid::new_v4();
    let config = MessageBrokerConfig {
        inbound_queue: format!("test.inbound.{}", suffix),
        outbound_queue: format!("test.outbound.{}", suffix),
        ack_queue: format!("test.ack.{}", suffix),
        ..MessageBrokerConfig::default()
    };

    let broker = create_message_broker(config.clone()).await?;
    let channel = broker.create_channel().await?;

    let payload = RelayMessage {
        assignment_id: 1,
        event_id: Uuid::new_v4(),
        reviewer_id: 7,
    };
    broker
        .publish(&channel, &config.outbound_queue, &payload)
        .await?;

    let mut consumer = channel
        .basic_consume(
            &config.outbound_queue,
            "test-consumer",
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await?;

    let delivery = timeout(Duration::from_secs(5), consumer.next())
        .await?
        .expect("queue closed before delivery")?;
    let received: RelayMessage = serde_json::from_slice(&delivery.data)?;
    delivery.ack(BasicAckOptions::default()).await?;

    assert_eq!(received.assignment_id, payload.assignment_id);
    assert_eq!(received.event_id, payload.event_id);

    Ok(())
}
