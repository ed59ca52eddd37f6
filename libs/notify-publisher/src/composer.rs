use std::sync::Arc;

use event_schema::{EventPayload, NotifyAction, NotifyMessage};
use session_store::SessionDirectory;
use tracing::warn;
use uuid::Uuid;

use crate::{MessageProducer, NotifyError, Result, TripDirectory};

/// Composes addressed notifications out of trip mutations.
///
/// Recipient tokens are resolved at composition time and never reused; a
/// member whose token lookup fails simply contributes no tokens.
pub struct Notifier {
    trips: Arc<dyn TripDirectory>,
    sessions: Arc<dyn SessionDirectory>,
    producer: Arc<dyn MessageProducer>,
}

impl Notifier {
    pub fn new(
        trips: Arc<dyn TripDirectory>,
        sessions: Arc<dyn SessionDirectory>,
        producer: Arc<dyn MessageProducer>,
    ) -> Self {
        Self {
            trips,
            sessions,
            producer,
        }
    }

    /// Build and publish a notification for every member of the trip.
    ///
    /// The returned error is advisory: the caller's primary mutation has
    /// already happened and must not be rolled back on it.
    pub async fn form_and_send(
        &self,
        trip_id: Uuid,
        action: NotifyAction,
        text: &str,
        author_id: i64,
    ) -> Result<()> {
        let members = self
            .trips
            .get_members(trip_id)
            .await
            .map_err(|err| NotifyError::Trip(err.to_string()))?;

        let mut clients: Vec<String> = Vec::new();
        for user_id in members {
            match self.sessions.get_tokens_by_user_id(user_id).await {
                Ok(tokens) => clients.extend(tokens),
                Err(err) => {
                    // Best effort: one unresolvable member must not keep the
                    // rest of the trip from hearing about the change.
                    warn!(user_id, error = %err, "token lookup failed, member skipped");
                }
            }
        }

        let message = NotifyMessage::new(
            EventPayload {
                action,
                author: author_id.to_string(),
                trip_id,
                message: text.to_string(),
            },
            clients,
        );

        self.producer.publish(&message).await
    }
}
