use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures_core::Stream;

use crate::{Message, Result};

/// A stream of messages delivered to one member of a consumer group.
pub type MessageStream = Pin<Box<dyn Stream<Item = Message> + Send>>;

/// Core trait for message bus implementations.
///
/// Guarantees required by consumers:
/// - messages sharing a key are delivered to a group in publish order
///   (single-key FIFO), to the same group member;
/// - delivery is at-least-once, so every handler must tolerate redelivery.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publishes a message to a topic.
    ///
    /// Fails with `BusError::NoSubscribers` if no consumer group is
    /// currently attached to the topic; publishers needing delivery
    /// guarantees retry until it succeeds.
    async fn publish(&self, topic: &str, key: &str, payload: serde_json::Value) -> Result<()>;

    /// Publishes a message after a visibility delay.
    ///
    /// Used to re-schedule work items (payment confirmation polls) without
    /// blocking a worker. Delivery failures after the delay are logged,
    /// not surfaced; stuck sagas are recovered via the lease mechanism.
    async fn publish_delayed(
        &self,
        topic: &str,
        key: &str,
        payload: serde_json::Value,
        delay: Duration,
    ) -> Result<()>;

    /// Subscribes a consumer group member to a topic.
    ///
    /// Multiple members may subscribe under the same group; each key is
    /// routed to exactly one member. Distinct groups each receive every
    /// message.
    async fn subscribe(&self, topic: &str, group: &str) -> Result<MessageStream>;
}
