use async_trait::async_trait;
use event_schema::NotifyMessage;
use rdkafka::error::KafkaError;
use rdkafka::producer::{DeliveryFuture, FutureProducer, FutureRecord};
use rdkafka::ClientConfig;
use tracing::debug;

use crate::{MessageProducer, NotifyError, Result};

/// Kafka producer for notification messages.
#[derive(Clone)]
pub struct EventProducer {
    producer: FutureProducer,
    topic: String,
}

impl EventProducer {
    pub fn new(brokers: &str, topic: impl Into<String>) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .set("queue.buffering.max.messages", "100000")
            .create()?;

        Ok(Self {
            producer,
            topic: topic.into(),
        })
    }

    /// Serialize and enqueue one message.
    ///
    /// Returns once the client has accepted the record, not once the broker
    /// has committed it. Await the returned [`PendingDelivery`] to observe
    /// the delivery report.
    pub fn publish_message(&self, message: &NotifyMessage) -> Result<PendingDelivery> {
        let payload = serde_json::to_vec(message)?;

        debug!(
            topic = %self.topic,
            action = %message.payload.action,
            recipients = message.clients.len(),
            "publishing notification"
        );

        let record = FutureRecord::<(), _>::to(&self.topic).payload(&payload);
        match self.producer.send_result(record) {
            Ok(delivery) => Ok(PendingDelivery { inner: delivery }),
            Err((err, _record)) => Err(NotifyError::Kafka(err)),
        }
    }
}

#[async_trait]
impl MessageProducer for EventProducer {
    async fn publish(&self, message: &NotifyMessage) -> Result<()> {
        self.publish_message(message).map(|_pending| ())
    }
}

/// Delivery confirmation for one published message.
///
/// Dropping it is fine; the record is already on its way.
pub struct PendingDelivery {
    inner: DeliveryFuture,
}

impl PendingDelivery {
    /// Wait for the broker's delivery report. Returns `(partition, offset)`.
    pub async fn confirmed(self) -> Result<(i32, i64)> {
        match self.inner.await {
            Ok(Ok((partition, offset))) => Ok((partition, offset)),
            Ok(Err((err, _message))) => Err(NotifyError::Kafka(err)),
            Err(_canceled) => Err(NotifyError::Kafka(KafkaError::Canceled)),
        }
    }
}
