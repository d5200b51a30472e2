//! Saga state store with compare-and-swap writes.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::OrderId;
use tokio::sync::RwLock;

use crate::error::SagaStoreError;
use crate::instance::SagaInstance;
use crate::step::SagaStep;

/// Durable store for saga instances, keyed by order id.
///
/// Writes are guarded: [`compare_and_swap`] persists the instance only
/// if the stored step still equals `expected`, so of two workers racing
/// on the same saga exactly one advances it. The loser receives
/// [`SagaStoreError::Conflict`] and must reload before acting again.
///
/// [`compare_and_swap`]: SagaStore::compare_and_swap
#[async_trait]
pub trait SagaStore: Send + Sync {
    /// Fetches the saga for an order, creating it at `NotStarted` if
    /// absent. The flag is true when this call created it.
    async fn load_or_create(
        &self,
        order_id: OrderId,
    ) -> Result<(SagaInstance, bool), SagaStoreError>;

    /// Persists `instance` if the stored step still equals `expected`.
    async fn compare_and_swap(
        &self,
        expected: SagaStep,
        instance: &SagaInstance,
    ) -> Result<(), SagaStoreError>;

    /// Fetches the saga for an order, if one exists.
    async fn get(&self, order_id: OrderId) -> Result<Option<SagaInstance>, SagaStoreError>;
}

/// In-memory saga store for tests and local runs.
#[derive(Clone, Default)]
pub struct InMemorySagaStore {
    sagas: Arc<RwLock<HashMap<OrderId, SagaInstance>>>,
}

impl InMemorySagaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.sagas.read().await.len()
    }
}

#[async_trait]
impl SagaStore for InMemorySagaStore {
    async fn load_or_create(
        &self,
        order_id: OrderId,
    ) -> Result<(SagaInstance, bool), SagaStoreError> {
        let mut sagas = self.sagas.write().await;
        match sagas.get(&order_id) {
            Some(existing) => Ok((existing.clone(), false)),
            None => {
                let instance = SagaInstance::new(order_id);
                sagas.insert(order_id, instance.clone());
                Ok((instance, true))
            }
        }
    }

    async fn compare_and_swap(
        &self,
        expected: SagaStep,
        instance: &SagaInstance,
    ) -> Result<(), SagaStoreError> {
        let mut sagas = self.sagas.write().await;
        let order_id = instance.order_id();
        let current = sagas
            .get(&order_id)
            .ok_or(SagaStoreError::NotFound(order_id))?;
        if current.step() != expected {
            return Err(SagaStoreError::Conflict {
                order_id,
                expected,
                actual: current.step(),
            });
        }
        sagas.insert(order_id, instance.clone());
        Ok(())
    }

    async fn get(&self, order_id: OrderId) -> Result<Option<SagaInstance>, SagaStoreError> {
        Ok(self.sagas.read().await.get(&order_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_or_create_is_create_once() {
        let store = InMemorySagaStore::new();
        let order_id = OrderId::new();
        let (first, created) = store.load_or_create(order_id).await.unwrap();
        assert!(created);
        assert_eq!(first.step(), SagaStep::NotStarted);

        let (second, created) = store.load_or_create(order_id).await.unwrap();
        assert!(!created);
        assert_eq!(second.step(), SagaStep::NotStarted);
        assert_eq!(store.count().await, 1);
    }

    #[tokio::test]
    async fn test_cas_persists_when_step_matches() {
        let store = InMemorySagaStore::new();
        let order_id = OrderId::new();
        let (mut saga, _) = store.load_or_create(order_id).await.unwrap();
        saga.advance(SagaStep::ReservingInventory).unwrap();
        store
            .compare_and_swap(SagaStep::NotStarted, &saga)
            .await
            .unwrap();

        let stored = store.get(order_id).await.unwrap().unwrap();
        assert_eq!(stored.step(), SagaStep::ReservingInventory);
    }

    #[tokio::test]
    async fn test_cas_rejects_stale_writer() {
        let store = InMemorySagaStore::new();
        let order_id = OrderId::new();
        let (saga, _) = store.load_or_create(order_id).await.unwrap();

        // Two workers cloned the same NotStarted snapshot.
        let mut winner = saga.clone();
        let mut loser = saga;
        winner.advance(SagaStep::ReservingInventory).unwrap();
        store
            .compare_and_swap(SagaStep::NotStarted, &winner)
            .await
            .unwrap();

        loser.advance(SagaStep::ReservingInventory).unwrap();
        let err = store
            .compare_and_swap(SagaStep::NotStarted, &loser)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SagaStoreError::Conflict {
                expected: SagaStep::NotStarted,
                actual: SagaStep::ReservingInventory,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_cas_on_missing_saga() {
        let store = InMemorySagaStore::new();
        let saga = SagaInstance::new(OrderId::new());
        let err = store
            .compare_and_swap(SagaStep::NotStarted, &saga)
            .await
            .unwrap_err();
        assert!(matches!(err, SagaStoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let store = InMemorySagaStore::new();
        assert!(store.get(OrderId::new()).await.unwrap().is_none());
    }
}
