use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::sync::mpsc;

use crate::{
    BusError, Message, Result,
    bus::{MessageBus, MessageStream},
};

type GroupSenders = HashMap<String, Vec<mpsc::UnboundedSender<Message>>>;

/// In-memory message bus for tests and single-process deployments.
///
/// Routing mimics a partitioned broker: within a consumer group, the key
/// hash picks the member, so all messages for one order land on the same
/// member in publish order. Every distinct group receives every message.
#[derive(Clone, Default)]
pub struct InMemoryBus {
    topics: Arc<RwLock<HashMap<String, GroupSenders>>>,
}

impl InMemoryBus {
    /// Creates a new empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of consumer groups attached to a topic.
    pub async fn group_count(&self, topic: &str) -> usize {
        self.topics
            .read()
            .await
            .get(topic)
            .map(|groups| groups.len())
            .unwrap_or(0)
    }

    fn member_index(key: &str, members: usize) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % members
    }
}

#[async_trait]
impl MessageBus for InMemoryBus {
    async fn publish(&self, topic: &str, key: &str, payload: serde_json::Value) -> Result<()> {
        let mut topics = self.topics.write().await;

        let groups = topics
            .get_mut(topic)
            .ok_or_else(|| BusError::NoSubscribers(topic.to_string()))?;

        // Drop members whose receiving side went away.
        groups.retain(|_, members| {
            members.retain(|tx| !tx.is_closed());
            !members.is_empty()
        });

        if groups.is_empty() {
            return Err(BusError::NoSubscribers(topic.to_string()));
        }

        for members in groups.values() {
            let idx = Self::member_index(key, members.len());
            let message = Message::new(topic, key, payload.clone());
            // Receiver liveness was checked above; a racing drop only
            // loses the message for that group, matching broker behavior
            // for a consumer that died mid-delivery.
            let _ = members[idx].send(message);
        }

        Ok(())
    }

    async fn publish_delayed(
        &self,
        topic: &str,
        key: &str,
        payload: serde_json::Value,
        delay: Duration,
    ) -> Result<()> {
        let bus = self.clone();
        let topic = topic.to_string();
        let key = key.to_string();

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = bus.publish(&topic, &key, payload).await {
                tracing::warn!(%topic, %key, error = %e, "delayed publish failed");
            }
        });

        Ok(())
    }

    async fn subscribe(&self, topic: &str, group: &str) -> Result<MessageStream> {
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut topics = self.topics.write().await;
        topics
            .entry(topic.to_string())
            .or_default()
            .entry(group.to_string())
            .or_default()
            .push(tx);

        let stream = futures_util::stream::poll_fn(move |cx| rx.poll_recv(cx));
        Ok(Box::pin(stream))
    }
}
