use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A message as delivered to a consumer group.
///
/// The key determines partition-style routing: all messages with the same
/// key are delivered to the same member of a consumer group, in publish
/// order. Sagas use the order ID as the key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier for this message.
    pub id: Uuid,

    /// The topic the message was published to.
    pub topic: String,

    /// Routing key (the order ID for all fulfillment facts).
    pub key: String,

    /// The payload as JSON.
    pub payload: serde_json::Value,

    /// When the message was accepted by the bus.
    pub published_at: DateTime<Utc>,
}

impl Message {
    /// Creates a new message for the given topic and key.
    pub fn new(topic: impl Into<String>, key: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic: topic.into(),
            key: key.into(),
            payload,
            published_at: Utc::now(),
        }
    }

    /// Deserializes the payload into a typed fact.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}
