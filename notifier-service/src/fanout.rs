use event_schema::NotifyMessage;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use crate::metrics;
use crate::websocket::{ConnectionRegistry, DeliveryOutcome};

/// The single fanout loop: drains the internal channel and routes each
/// message to its recipients' live connections.
pub async fn run(
    mut messages: mpsc::Receiver<NotifyMessage>,
    registry: ConnectionRegistry,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                info!("fanout dispatcher stopping");
                return;
            }
            received = messages.recv() => match received {
                Some(message) => dispatch(&registry, &message).await,
                None => return,
            }
        }
    }
}

/// Deliver one message to every recipient token that has a live connection.
///
/// Clients only ever see the `payload` object; the routing token list stays
/// server-side. Absent recipients and saturated queues are counted drops,
/// never errors.
pub async fn dispatch(registry: &ConnectionRegistry, message: &NotifyMessage) {
    let payload = match serde_json::to_string(&message.payload) {
        Ok(payload) => payload,
        Err(err) => {
            error!(error = %err, "failed to encode client payload");
            return;
        }
    };

    for token in &message.clients {
        match registry.deliver(token, &payload).await {
            DeliveryOutcome::Enqueued => metrics::record_delivered(),
            DeliveryOutcome::NotConnected => metrics::record_dropped("not_connected"),
            DeliveryOutcome::QueueFull => {
                warn!(action = %message.payload.action, "outbound queue full, payload dropped");
                metrics::record_dropped("queue_full");
            }
        }
    }
}
