use anyhow::{Error, Result, anyhow};
use chrono::Utc;
use futures_util::StreamExt;
use lapin::{
    BasicProperties, Channel, Connection, ConnectionProperties, Consumer, ExchangeKind,
    options::{
        BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, BasicQosOptions,
        BasicRejectOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
    },
    types::{AMQPValue, FieldTable, ShortString},
};
use tracing::{debug, error, info, warn};

use crate::{
    clients::{gateway::PushGateway, status::StatusPublisher},
    config::Config,
    metrics::Metrics,
    processor::{NotificationProcessor, ProcessOutcome},
    stores::{CircuitBreakerStore, NotificationLogStore},
};

const CONSUMER_TAG: &str = "push_relay_worker";
const ROUTING_KEY: &str = "push";

// Exactly one unacknowledged message per consumer; the broker holds the next
// delivery until this one is acked or rejected. This is the backpressure
// control, so it is not configurable.
const PREFETCH_COUNT: u16 = 1;

/// Broker-side actions taken to settle a processed delivery.
#[allow(async_fn_in_trait)]
pub trait DeliverySink {
    async fn acknowledge(&self, delivery_tag: u64) -> Result<(), Error>;

    async fn reject(&self, delivery_tag: u64, requeue: bool) -> Result<(), Error>;

    async fn publish_to_dlq(&self, body: &[u8]) -> Result<(), Error>;
}

/// Settle one delivery according to its outcome: ack on success, requeue on
/// retryable, dead-letter the unchanged body then ack on permanent.
pub async fn settle_delivery<S: DeliverySink>(
    sink: &S,
    delivery_tag: u64,
    body: &[u8],
    outcome: &ProcessOutcome,
) -> Result<(), Error> {
    match outcome {
        ProcessOutcome::Success => sink.acknowledge(delivery_tag).await,
        ProcessOutcome::RetryableFailure(reason) => {
            warn!(error = %reason, "Requeueing message for redelivery");
            sink.reject(delivery_tag, true).await
        }
        ProcessOutcome::PermanentFailure(reason) => {
            error!(error = %reason, "Moving message to failed queue");
            sink.publish_to_dlq(body).await?;
            sink.acknowledge(delivery_tag).await
        }
    }
}

/// Headers attached to a dead-lettered message: when it failed (unix seconds)
/// and which queue it originally came from.
pub fn dlq_headers(original_queue: &str) -> FieldTable {
    let mut headers = FieldTable::default();
    headers.insert(
        ShortString::from("x-failed-at"),
        AMQPValue::LongLongInt(Utc::now().timestamp()),
    );
    headers.insert(
        ShortString::from("x-original-queue"),
        AMQPValue::LongString(original_queue.to_string().into()),
    );
    headers
}

/// Bridges broker delivery semantics to the processor's three-way outcome
/// contract: ack on success, requeue on retryable, dead-letter on permanent.
pub struct RabbitMqClient {
    connection: Connection,
    channel: Channel,
    push_queue_name: String,
    failed_queue_name: String,
}

impl RabbitMqClient {
    pub async fn connect(config: &Config) -> Result<Self, Error> {
        let connection = Connection::connect(&config.rabbitmq_url, ConnectionProperties::default())
            .await
            .map_err(|_| anyhow!("Failed to connect to RabbitMQ"))?;

        let channel = connection
            .create_channel()
            .await
            .map_err(|_| anyhow!("RabbitMQ channel creation failed"))?;

        channel
            .basic_qos(PREFETCH_COUNT, BasicQosOptions::default())
            .await
            .map_err(|_| anyhow!("Failed to set up QoS"))?;

        channel
            .exchange_declare(
                &config.push_exchange_name,
                ExchangeKind::Direct,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|_| anyhow!("Failed to declare exchange"))?;

        channel
            .queue_declare(
                &config.push_queue_name,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|_| anyhow!("Failed to declare push queue"))?;

        channel
            .queue_declare(
                &config.failed_queue_name,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|_| anyhow!("Failed to declare failed queue"))?;

        channel
            .queue_bind(
                &config.push_queue_name,
                &config.push_exchange_name,
                ROUTING_KEY,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|_| anyhow!("Failed to bind push queue"))?;

        info!(
            exchange = %config.push_exchange_name,
            queue = %config.push_queue_name,
            failed_queue = %config.failed_queue_name,
            "RabbitMQ connection and queues established"
        );

        Ok(Self {
            connection,
            channel,
            push_queue_name: config.push_queue_name.clone(),
            failed_queue_name: config.failed_queue_name.clone(),
        })
    }

    pub async fn create_consumer(&self) -> Result<Consumer, Error> {
        let consumer = self
            .channel
            .basic_consume(
                &self.push_queue_name,
                CONSUMER_TAG,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|_| anyhow!("Failed to create consumer"))?;

        Ok(consumer)
    }

    /// Consume until the broker drops the stream. One message is fully
    /// processed, including any backoff sleeps, before the next is taken.
    pub async fn run<G, L, B, P>(
        &self,
        processor: &NotificationProcessor<G, L, B, P>,
        metrics: &Metrics,
    ) -> Result<(), Error>
    where
        G: PushGateway,
        L: NotificationLogStore,
        B: CircuitBreakerStore,
        P: StatusPublisher,
    {
        let mut consumer = self.create_consumer().await?;

        info!(queue = %self.push_queue_name, "Waiting for messages");

        while let Some(delivery) = consumer.next().await {
            let delivery = delivery.map_err(|e| anyhow!("Failed to receive delivery: {}", e))?;

            metrics.record_consumed();
            debug!(
                body = %String::from_utf8_lossy(&delivery.data),
                "Received message"
            );

            let outcome = processor.process(&delivery.data).await;
            settle_delivery(self, delivery.delivery_tag, &delivery.data, &outcome).await?;
        }

        Ok(())
    }

    /// Deterministic teardown. Anything unacknowledged at this point goes
    /// back to the broker for redelivery.
    pub async fn close(&self) -> Result<(), Error> {
        self.channel
            .close(200, "shutdown")
            .await
            .map_err(|_| anyhow!("Failed to close RabbitMQ channel"))?;
        self.connection
            .close(200, "shutdown")
            .await
            .map_err(|_| anyhow!("Failed to close RabbitMQ connection"))?;

        info!("RabbitMQ connection closed");
        Ok(())
    }
}

impl DeliverySink for RabbitMqClient {
    async fn acknowledge(&self, delivery_tag: u64) -> Result<(), Error> {
        self.channel
            .basic_ack(delivery_tag, BasicAckOptions::default())
            .await
            .map_err(|_| anyhow!("Failed to acknowledge message"))?;

        Ok(())
    }

    async fn reject(&self, delivery_tag: u64, requeue: bool) -> Result<(), Error> {
        self.channel
            .basic_reject(delivery_tag, BasicRejectOptions { requeue })
            .await
            .map_err(|_| anyhow!("Failed to reject message"))?;

        Ok(())
    }

    /// Republish the original body unchanged to the failed queue.
    async fn publish_to_dlq(&self, body: &[u8]) -> Result<(), Error> {
        self.channel
            .basic_publish(
                "",
                &self.failed_queue_name,
                BasicPublishOptions::default(),
                body,
                BasicProperties::default()
                    .with_delivery_mode(2)
                    .with_headers(dlq_headers(&self.push_queue_name)),
            )
            .await
            .map_err(|_| anyhow!("Failed to publish message to dlq"))?;

        Ok(())
    }
}
