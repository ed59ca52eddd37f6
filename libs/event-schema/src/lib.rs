/// Wire schema for the notification fan-out pipeline.
///
/// Both sides of the Kafka topic compile against this crate: the publisher
/// library serializes `NotifyMessage`, the notifier service deserializes it.
/// Keeping the schema in one place is what prevents the two halves from
/// drifting apart as services evolve.
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of change a notification announces to a trip's members.
///
/// Serialized as the snake_case string in the `action` field of the wire
/// payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyAction {
    TripUpdate,
    TripEventsUpdate,
    ChatFreeze,
    ChatReplyMessage,
    TripAutoPlanningEnable,
}

impl std::fmt::Display for NotifyAction {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            NotifyAction::TripUpdate => write!(f, "trip_update"),
            NotifyAction::TripEventsUpdate => write!(f, "trip_events_update"),
            NotifyAction::ChatFreeze => write!(f, "chat_freeze"),
            NotifyAction::ChatReplyMessage => write!(f, "chat_reply_message"),
            NotifyAction::TripAutoPlanningEnable => write!(f, "trip_auto_planning_enable"),
        }
    }
}

/// The part of a notification that is actually delivered to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPayload {
    pub action: NotifyAction,
    /// User id of the member whose mutation triggered the notification,
    /// stringified.
    pub author: String,
    pub trip_id: Uuid,
    pub message: String,
}

/// One addressed notification as published to the broker.
///
/// `clients` carries the recipient session tokens resolved at composition
/// time. It is routing metadata only: the notifier strips it before anything
/// reaches a client connection. Immutable once published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyMessage {
    pub payload: EventPayload,
    pub clients: Vec<String>,
}

impl NotifyMessage {
    pub fn new(payload: EventPayload, clients: Vec<String>) -> Self {
        Self { payload, clients }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NotifyMessage {
        NotifyMessage {
            payload: EventPayload {
                action: NotifyAction::TripUpdate,
                author: "1".to_string(),
                trip_id: Uuid::parse_str("7b5ac195-6bc8-4f67-90fa-ca6a1d9a2c3e").unwrap(),
                message: "Поездка обновилась".to_string(),
            },
            clients: vec!["tokA1".to_string(), "tokB1".to_string()],
        }
    }

    #[test]
    fn wire_format_field_names() {
        let value = serde_json::to_value(sample()).unwrap();

        let payload = value.get("payload").unwrap();
        assert_eq!(payload.get("action").unwrap(), "trip_update");
        assert_eq!(payload.get("author").unwrap(), "1");
        assert_eq!(
            payload.get("trip_id").unwrap(),
            "7b5ac195-6bc8-4f67-90fa-ca6a1d9a2c3e"
        );
        assert_eq!(payload.get("message").unwrap(), "Поездка обновилась");

        let clients: Vec<String> =
            serde_json::from_value(value.get("clients").unwrap().clone()).unwrap();
        assert_eq!(clients, vec!["tokA1", "tokB1"]);
    }

    #[test]
    fn action_strings_match_display() {
        for action in [
            NotifyAction::TripUpdate,
            NotifyAction::TripEventsUpdate,
            NotifyAction::ChatFreeze,
            NotifyAction::ChatReplyMessage,
            NotifyAction::TripAutoPlanningEnable,
        ] {
            let wire = serde_json::to_value(action).unwrap();
            assert_eq!(wire, action.to_string());
        }
    }

    #[test]
    fn decode_rejects_unknown_action() {
        let raw = r#"{
            "payload": {
                "action": "trip_teleport",
                "author": "1",
                "trip_id": "7b5ac195-6bc8-4f67-90fa-ca6a1d9a2c3e",
                "message": "x"
            },
            "clients": []
        }"#;
        assert!(serde_json::from_str::<NotifyMessage>(raw).is_err());
    }

    #[test]
    fn decode_roundtrip() {
        let msg = sample();
        let bytes = serde_json::to_vec(&msg).unwrap();
        let back: NotifyMessage = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back, msg);
    }
}
