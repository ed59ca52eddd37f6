//! Producer side of the notification pipeline.
//!
//! Business-mutation services depend on this crate: `Notifier` resolves a
//! trip mutation into an addressed [`event_schema::NotifyMessage`] and
//! `EventProducer` hands it to Kafka. Notification is advisory — callers
//! must never roll back their primary mutation because a publish failed.

use async_trait::async_trait;
use event_schema::NotifyMessage;
use thiserror::Error;
use uuid::Uuid;

mod composer;
mod producer;

pub use composer::Notifier;
pub use producer::{EventProducer, PendingDelivery};

pub type Result<T, E = NotifyError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("failed to resolve trip members: {0}")]
    Trip(String),

    #[error("failed to serialize notification: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),
}

/// Trip membership lookup, owned by the trip service.
#[async_trait]
pub trait TripDirectory: Send + Sync {
    async fn get_members(&self, trip_id: Uuid) -> anyhow::Result<Vec<i64>>;
}

/// Fire-and-forget publish seam the composer writes to.
///
/// Implementations return once the broker client has accepted the record;
/// durable commit is not awaited here. [`EventProducer::publish_message`]
/// exposes the delivery confirmation for callers that want it.
#[async_trait]
pub trait MessageProducer: Send + Sync {
    async fn publish(&self, message: &NotifyMessage) -> Result<()>;
}
