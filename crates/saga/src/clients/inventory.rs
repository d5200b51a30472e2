//! Inventory service client.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::OrderId;
use domain::OrderLine;

use super::RpcError;

/// Answer to a reservation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReserveOutcome {
    /// Stock was set aside; the handle must be kept for later release.
    Granted { reservation_id: String },
    /// The service refused, e.g. `"out_of_stock"`. Final, never retried.
    Denied { reason: String },
}

/// Answer to a release request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    Released,
    /// Unknown reservation id. Treated as already released.
    NotFound,
}

/// Client for the inventory service.
///
/// `reserve` must be idempotent per order: a repeated call for the same
/// order returns the reservation already granted rather than doubling it.
#[async_trait]
pub trait InventoryClient: Send + Sync {
    async fn reserve(
        &self,
        order_id: OrderId,
        lines: &[OrderLine],
    ) -> Result<ReserveOutcome, RpcError>;

    async fn release(&self, reservation_id: &str) -> Result<ReleaseOutcome, RpcError>;
}

#[derive(Default)]
struct InventoryState {
    reservations: HashMap<String, (OrderId, Vec<OrderLine>)>,
    by_order: HashMap<OrderId, String>,
    next_id: u64,
    deny_reason: Option<String>,
    reserve_faults: u32,
    release_faults: u32,
    reserve_calls: u32,
    release_calls: u32,
}

/// In-memory inventory client for tests and local runs.
///
/// Grants every reservation unless told otherwise. Faults injected with
/// [`fail_reserves`] / [`fail_releases`] surface as [`RpcError::Timeout`]
/// and are consumed one per call.
///
/// [`fail_reserves`]: InMemoryInventoryClient::fail_reserves
/// [`fail_releases`]: InMemoryInventoryClient::fail_releases
#[derive(Clone, Default)]
pub struct InMemoryInventoryClient {
    state: Arc<RwLock<InventoryState>>,
}

impl InMemoryInventoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent reservation come back denied with `reason`.
    pub fn deny_with(&self, reason: &str) {
        self.state.write().unwrap().deny_reason = Some(reason.to_string());
    }

    /// Makes the next `n` reserve calls fail with a timeout.
    pub fn fail_reserves(&self, n: u32) {
        self.state.write().unwrap().reserve_faults = n;
    }

    /// Makes the next `n` release calls fail with a timeout.
    pub fn fail_releases(&self, n: u32) {
        self.state.write().unwrap().release_faults = n;
    }

    /// Number of reservations currently held.
    pub fn reservation_count(&self) -> usize {
        self.state.read().unwrap().reservations.len()
    }

    pub fn reserve_call_count(&self) -> u32 {
        self.state.read().unwrap().reserve_calls
    }

    pub fn release_call_count(&self) -> u32 {
        self.state.read().unwrap().release_calls
    }
}

#[async_trait]
impl InventoryClient for InMemoryInventoryClient {
    async fn reserve(
        &self,
        order_id: OrderId,
        lines: &[OrderLine],
    ) -> Result<ReserveOutcome, RpcError> {
        let mut state = self.state.write().unwrap();
        state.reserve_calls += 1;
        if state.reserve_faults > 0 {
            state.reserve_faults -= 1;
            return Err(RpcError::Timeout);
        }
        if let Some(reason) = &state.deny_reason {
            return Ok(ReserveOutcome::Denied {
                reason: reason.clone(),
            });
        }
        // Idempotent per order: a redelivered request gets the same handle.
        if let Some(existing) = state.by_order.get(&order_id) {
            return Ok(ReserveOutcome::Granted {
                reservation_id: existing.clone(),
            });
        }
        state.next_id += 1;
        let reservation_id = format!("RES-{:04}", state.next_id);
        state
            .reservations
            .insert(reservation_id.clone(), (order_id, lines.to_vec()));
        state.by_order.insert(order_id, reservation_id.clone());
        Ok(ReserveOutcome::Granted { reservation_id })
    }

    async fn release(&self, reservation_id: &str) -> Result<ReleaseOutcome, RpcError> {
        let mut state = self.state.write().unwrap();
        state.release_calls += 1;
        if state.release_faults > 0 {
            state.release_faults -= 1;
            return Err(RpcError::Timeout);
        }
        match state.reservations.remove(reservation_id) {
            Some((order_id, _)) => {
                state.by_order.remove(&order_id);
                Ok(ReleaseOutcome::Released)
            }
            None => Ok(ReleaseOutcome::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::Money;

    fn lines() -> Vec<OrderLine> {
        vec![OrderLine::new("SKU-1", "Widget", 2, Money::from_cents(500))]
    }

    #[tokio::test]
    async fn test_reserve_then_release() {
        let client = InMemoryInventoryClient::new();
        let order_id = OrderId::new();
        let outcome = client.reserve(order_id, &lines()).await.unwrap();
        let ReserveOutcome::Granted { reservation_id } = outcome else {
            panic!("expected grant");
        };
        assert_eq!(client.reservation_count(), 1);
        assert_eq!(
            client.release(&reservation_id).await.unwrap(),
            ReleaseOutcome::Released
        );
        assert_eq!(client.reservation_count(), 0);
    }

    #[tokio::test]
    async fn test_reserve_is_idempotent_per_order() {
        let client = InMemoryInventoryClient::new();
        let order_id = OrderId::new();
        let first = client.reserve(order_id, &lines()).await.unwrap();
        let second = client.reserve(order_id, &lines()).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(client.reservation_count(), 1);
    }

    #[tokio::test]
    async fn test_denial_and_faults() {
        let client = InMemoryInventoryClient::new();
        client.fail_reserves(1);
        let err = client.reserve(OrderId::new(), &lines()).await.unwrap_err();
        assert_eq!(err, RpcError::Timeout);

        client.deny_with("out_of_stock");
        let outcome = client.reserve(OrderId::new(), &lines()).await.unwrap();
        assert_eq!(
            outcome,
            ReserveOutcome::Denied {
                reason: "out_of_stock".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_release_of_unknown_reservation() {
        let client = InMemoryInventoryClient::new();
        assert_eq!(
            client.release("RES-9999").await.unwrap(),
            ReleaseOutcome::NotFound
        );
    }
}
