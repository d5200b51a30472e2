//! Outbox for persist-then-publish of intake facts.
//!
//! Intake stages the `order.created` fact in the outbox in the same
//! logical unit as the order insert; the relay then publishes staged
//! entries to the bus, removing an entry only after the publish succeeds.
//! Every persisted pending order therefore eventually produces exactly
//! one fact, and no fact exists without a persisted order.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use bus::{BusError, MessageBus};
use serde::Serialize;
use tokio::sync::Mutex;

/// A staged fact awaiting publication.
#[derive(Debug, Clone)]
pub struct OutboxEntry {
    pub topic: String,
    pub key: String,
    pub payload: serde_json::Value,
    pub attempts: u32,
}

/// FIFO staging area shared between intake and the relay.
#[derive(Clone, Default)]
pub struct Outbox {
    pub(crate) entries: Arc<Mutex<VecDeque<OutboxEntry>>>,
}

impl Outbox {
    /// Creates a new empty outbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages a fact for publication.
    pub async fn enqueue<T: Serialize>(
        &self,
        topic: &str,
        key: &str,
        fact: &T,
    ) -> Result<(), serde_json::Error> {
        let entry = OutboxEntry {
            topic: topic.to_string(),
            key: key.to_string(),
            payload: serde_json::to_value(fact)?,
            attempts: 0,
        };
        self.entries.lock().await.push_back(entry);
        Ok(())
    }

    /// Returns the number of staged entries.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Returns true if nothing is staged.
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

/// Publishes staged outbox entries to the bus, retrying until delivered.
pub struct OutboxRelay<B: MessageBus> {
    outbox: Outbox,
    bus: B,
    retry_interval: Duration,
}

impl<B: MessageBus> OutboxRelay<B> {
    /// Creates a relay draining `outbox` into `bus`.
    pub fn new(outbox: Outbox, bus: B, retry_interval: Duration) -> Self {
        Self {
            outbox,
            bus,
            retry_interval,
        }
    }

    /// Publishes staged entries until the outbox is empty or a publish
    /// fails. A failed entry goes back to the front so per-key FIFO is
    /// preserved across retries. Returns the number published.
    pub async fn drain_once(&self) -> Result<usize, BusError> {
        let mut published = 0usize;

        loop {
            let entry = { self.outbox.entries.lock().await.pop_front() };
            let Some(mut entry) = entry else {
                return Ok(published);
            };

            match self
                .bus
                .publish(&entry.topic, &entry.key, entry.payload.clone())
                .await
            {
                Ok(()) => {
                    published += 1;
                    metrics::counter!("outbox_published_total").increment(1);
                }
                Err(e) => {
                    entry.attempts += 1;
                    tracing::warn!(
                        topic = %entry.topic,
                        key = %entry.key,
                        attempts = entry.attempts,
                        error = %e,
                        "outbox publish failed, will retry"
                    );
                    self.outbox.entries.lock().await.push_front(entry);
                    return Err(e);
                }
            }
        }
    }

    /// Drains the outbox forever, sleeping between passes.
    pub async fn run(self) {
        loop {
            let _ = self.drain_once().await;
            tokio::time::sleep(self.retry_interval).await;
        }
    }
}
