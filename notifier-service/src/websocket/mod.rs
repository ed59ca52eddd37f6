use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

pub mod handlers;

/// Unique identifier for one registration of a token.
///
/// Deregistration is guarded by it: a pump that lost its slot to a newer
/// connection for the same token must not remove that newer entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

struct ConnectionEntry {
    id: ConnectionId,
    sender: mpsc::Sender<String>,
}

/// What happened to one payload aimed at one token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Enqueued,
    /// No reachable connection for the token; the payload is dropped.
    NotConnected,
    /// The connection's bounded queue is saturated; the payload is dropped
    /// rather than blocking the fanout loop.
    QueueFull,
}

/// token -> live connection entry
///
/// Mutated from three concurrent contexts (registration, fanout lookup,
/// deregistration), so every path goes through the lock. At most one
/// reachable entry exists per token: registering a token that is already
/// present replaces the old entry, which closes the superseded connection's
/// queue and thereby its pump.
#[derive(Clone)]
pub struct ConnectionRegistry {
    inner: Arc<RwLock<HashMap<String, ConnectionEntry>>>,
    queue_capacity: usize,
}

impl ConnectionRegistry {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            queue_capacity,
        }
    }

    /// Register a connection for `token`, superseding any existing one.
    ///
    /// Returns the registration id and the receiving end of the bounded
    /// outbound queue the pump drains.
    pub async fn register(&self, token: &str) -> (ConnectionId, mpsc::Receiver<String>) {
        let (sender, receiver) = mpsc::channel(self.queue_capacity);
        let id = ConnectionId::new();

        let mut guard = self.inner.write().await;
        if guard
            .insert(token.to_string(), ConnectionEntry { id, sender })
            .is_some()
        {
            // The replaced sender is dropped here; the old pump observes the
            // closed queue and shuts its socket down.
            tracing::debug!("existing connection superseded by re-registration");
        }
        (id, receiver)
    }

    /// Remove the entry for `token`, but only if it still belongs to `id`.
    /// Returns whether an entry was removed.
    pub async fn deregister(&self, token: &str, id: ConnectionId) -> bool {
        let mut guard = self.inner.write().await;
        match guard.get(token) {
            Some(entry) if entry.id == id => {
                guard.remove(token);
                true
            }
            _ => false,
        }
    }

    /// Non-blocking enqueue of `payload` for `token`.
    pub async fn deliver(&self, token: &str, payload: &str) -> DeliveryOutcome {
        let guard = self.inner.read().await;
        let Some(entry) = guard.get(token) else {
            return DeliveryOutcome::NotConnected;
        };
        match entry.sender.try_send(payload.to_string()) {
            Ok(()) => DeliveryOutcome::Enqueued,
            Err(TrySendError::Full(_)) => DeliveryOutcome::QueueFull,
            // A closed queue means the pump already exited; the entry is as
            // good as gone.
            Err(TrySendError::Closed(_)) => DeliveryOutcome::NotConnected,
        }
    }

    pub async fn is_connected(&self, token: &str) -> bool {
        self.inner.read().await.contains_key(token)
    }

    pub async fn connection_count(&self) -> usize {
        self.inner.read().await.len()
    }
}
