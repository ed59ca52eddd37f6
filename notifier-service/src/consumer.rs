use event_schema::NotifyMessage;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use crate::config::KafkaConfig;
use crate::error::AppError;
use crate::metrics;

/// Decode one broker record, or skip it.
///
/// A malformed record is logged and counted; it never terminates the
/// consumer loop, and the offset advances past it like any other record.
pub fn decode_record(payload: &[u8]) -> Option<NotifyMessage> {
    match serde_json::from_slice(payload) {
        Ok(message) => Some(message),
        Err(err) => {
            warn!(error = %err, "skipping undecodable broker record");
            metrics::record_decode_failure();
            None
        }
    }
}

/// The single reader pulling notification records off the broker.
pub struct NotifyConsumer {
    consumer: StreamConsumer,
    topic: String,
}

impl NotifyConsumer {
    pub fn new(cfg: &KafkaConfig) -> Result<Self, AppError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &cfg.brokers)
            .set("group.id", &cfg.group)
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "30000")
            .set("heartbeat.interval.ms", "10000")
            .create()
            .map_err(|err| AppError::Kafka(err.to_string()))?;

        Ok(Self {
            consumer,
            topic: cfg.topic.clone(),
        })
    }

    /// Run until shutdown, handing decoded messages to the fanout loop.
    pub async fn run(
        self,
        dispatch: mpsc::Sender<NotifyMessage>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), AppError> {
        self.consumer
            .subscribe(&[self.topic.as_str()])
            .map_err(|err| AppError::Kafka(err.to_string()))?;
        info!(topic = %self.topic, "kafka consumer subscribed");

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("kafka consumer stopping");
                    return Ok(());
                }
                received = self.consumer.recv() => match received {
                    Ok(record) => {
                        metrics::record_consumed();
                        let Some(payload) = record.payload() else {
                            continue;
                        };
                        let Some(message) = decode_record(payload) else {
                            continue;
                        };
                        if dispatch.send(message).await.is_err() {
                            // Fanout loop is gone; no one left to deliver to.
                            return Ok(());
                        }
                    }
                    Err(err) => {
                        warn!(error = %err, "kafka receive failed");
                    }
                }
            }
        }
    }
}
