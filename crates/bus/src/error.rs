use thiserror::Error;

/// Errors that can occur when interacting with the message bus.
#[derive(Debug, Error)]
pub enum BusError {
    /// No consumer group is subscribed to the topic. Publishers that need
    /// a delivery guarantee (the outbox relay) retry until this clears.
    #[error("no subscribers for topic '{0}'")]
    NoSubscribers(String),

    /// The bus has been shut down and no longer accepts messages.
    #[error("bus is closed")]
    Closed,

    /// A payload failed to serialize.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for bus operations.
pub type Result<T> = std::result::Result<T, BusError>;
