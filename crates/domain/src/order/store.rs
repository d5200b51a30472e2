//! Order persistence trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::OrderId;
use thiserror::Error;
use tokio::sync::RwLock;

use super::model::Order;
use super::status::OrderStatus;

/// Errors that can occur in the order store.
#[derive(Debug, Error)]
pub enum OrderStoreError {
    /// No order exists with the given ID.
    #[error("order not found: {0}")]
    NotFound(OrderId),

    /// An order with this ID was already persisted.
    #[error("order already exists: {0}")]
    AlreadyExists(OrderId),

    /// The requested status change is not a legal transition.
    #[error("illegal status transition {from} -> {to} for order {order_id}")]
    IllegalTransition {
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    },

    /// The backing store could not be reached.
    #[error("order store unavailable: {0}")]
    Unavailable(String),
}

/// Trait for order persistence.
///
/// `set_status` enforces the `OrderStatus` transition graph, so the store
/// never holds a status the state machine cannot reach. Re-asserting the
/// status an order already has succeeds without writing, so at-least-once
/// drivers can repeat a write after a crash.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persists a new order. Fails if the ID is already taken.
    async fn insert(&self, order: Order) -> Result<(), OrderStoreError>;

    /// Loads an order by ID.
    async fn get(&self, order_id: OrderId) -> Result<Option<Order>, OrderStoreError>;

    /// Advances an order's status, checking the transition graph.
    async fn set_status(&self, order_id: OrderId, status: OrderStatus)
    -> Result<(), OrderStoreError>;
}

#[derive(Default)]
struct InMemoryOrderState {
    orders: HashMap<OrderId, Order>,
    fail_on_status: Option<OrderStatus>,
}

/// In-memory order store for tests and single-process deployments.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    state: Arc<RwLock<InMemoryOrderState>>,
}

impl InMemoryOrderStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of persisted orders.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    /// Configures the store to fail any attempt to set the given status.
    ///
    /// Used by tests to force the finalize step to fail after payment has
    /// settled.
    pub async fn set_fail_on_status(&self, status: Option<OrderStatus>) {
        self.state.write().await.fail_on_status = status;
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order: Order) -> Result<(), OrderStoreError> {
        let mut state = self.state.write().await;
        let id = order.id();
        if state.orders.contains_key(&id) {
            return Err(OrderStoreError::AlreadyExists(id));
        }
        state.orders.insert(id, order);
        Ok(())
    }

    async fn get(&self, order_id: OrderId) -> Result<Option<Order>, OrderStoreError> {
        Ok(self.state.read().await.orders.get(&order_id).cloned())
    }

    async fn set_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<(), OrderStoreError> {
        let mut state = self.state.write().await;

        if state.fail_on_status == Some(status) {
            return Err(OrderStoreError::Unavailable(format!(
                "injected failure setting status {status}"
            )));
        }

        let order = state
            .orders
            .get_mut(&order_id)
            .ok_or(OrderStoreError::NotFound(order_id))?;

        let from = order.status();
        if from == status {
            return Ok(());
        }
        if !from.can_transition_to(status) {
            return Err(OrderStoreError::IllegalTransition {
                order_id,
                from,
                to: status,
            });
        }

        order.set_status(status);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{CustomerId, Money, OrderLine};

    fn order() -> Order {
        Order::new(
            OrderId::new(),
            CustomerId::new(),
            vec![OrderLine::new("SKU-001", "Widget", 1, Money::from_cents(100))],
        )
    }

    #[tokio::test]
    async fn insert_and_get() {
        let store = InMemoryOrderStore::new();
        let order = order();
        let id = order.id();

        store.insert(order).await.unwrap();
        let loaded = store.get(id).await.unwrap().unwrap();
        assert_eq!(loaded.id(), id);
        assert_eq!(loaded.status(), OrderStatus::Pending);
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected() {
        let store = InMemoryOrderStore::new();
        let order = order();

        store.insert(order.clone()).await.unwrap();
        let result = store.insert(order).await;
        assert!(matches!(result, Err(OrderStoreError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn set_status_follows_the_state_machine() {
        let store = InMemoryOrderStore::new();
        let order = order();
        let id = order.id();
        store.insert(order).await.unwrap();

        store
            .set_status(id, OrderStatus::InventoryReserved)
            .await
            .unwrap();
        store
            .set_status(id, OrderStatus::PaymentPending)
            .await
            .unwrap();
        store.set_status(id, OrderStatus::Confirmed).await.unwrap();

        let loaded = store.get(id).await.unwrap().unwrap();
        assert_eq!(loaded.status(), OrderStatus::Confirmed);
    }

    #[tokio::test]
    async fn reasserting_the_current_status_is_a_noop() {
        let store = InMemoryOrderStore::new();
        let order = order();
        let id = order.id();
        store.insert(order).await.unwrap();

        store
            .set_status(id, OrderStatus::InventoryReserved)
            .await
            .unwrap();
        store
            .set_status(id, OrderStatus::InventoryReserved)
            .await
            .unwrap();

        let loaded = store.get(id).await.unwrap().unwrap();
        assert_eq!(loaded.status(), OrderStatus::InventoryReserved);
    }

    #[tokio::test]
    async fn illegal_transition_is_rejected() {
        let store = InMemoryOrderStore::new();
        let order = order();
        let id = order.id();
        store.insert(order).await.unwrap();

        let result = store.set_status(id, OrderStatus::Confirmed).await;
        assert!(matches!(
            result,
            Err(OrderStoreError::IllegalTransition { .. })
        ));
    }

    #[tokio::test]
    async fn status_of_missing_order_fails() {
        let store = InMemoryOrderStore::new();
        let result = store.set_status(OrderId::new(), OrderStatus::Failed).await;
        assert!(matches!(result, Err(OrderStoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn injected_status_failure() {
        let store = InMemoryOrderStore::new();
        let order = order();
        let id = order.id();
        store.insert(order).await.unwrap();
        store
            .set_fail_on_status(Some(OrderStatus::InventoryReserved))
            .await;

        let result = store.set_status(id, OrderStatus::InventoryReserved).await;
        assert!(matches!(result, Err(OrderStoreError::Unavailable(_))));
    }
}
