//! Payment service client.
//!
//! Payment is a two-phase escrow: `initiate` places a hold, settlement
//! is confirmed asynchronously by polling `confirm`, and `void` cancels
//! a hold that must not be kept.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::OrderId;
use domain::Money;

use super::RpcError;

/// Answer to an escrow initiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitiateOutcome {
    /// Hold placed; settlement pending. The reference drives confirm/void.
    Pending { payment_ref: String },
    /// Refused outright, e.g. `"insufficient_funds"`. Final.
    Rejected { reason: String },
}

/// Answer to a settlement check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmOutcome {
    Settled,
    StillPending,
    /// Settlement failed after the hold was placed. Final.
    Failed { reason: String },
}

/// Answer to a void request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoidOutcome {
    Voided,
    /// Unknown reference. Treated as already voided.
    NotFound,
}

/// Client for the payment service.
///
/// `initiate` must be idempotent per order, mirroring
/// [`InventoryClient::reserve`](super::InventoryClient::reserve).
#[async_trait]
pub trait PaymentClient: Send + Sync {
    async fn initiate(
        &self,
        order_id: OrderId,
        amount: Money,
    ) -> Result<InitiateOutcome, RpcError>;

    async fn confirm(&self, payment_ref: &str) -> Result<ConfirmOutcome, RpcError>;

    async fn void(&self, payment_ref: &str) -> Result<VoidOutcome, RpcError>;
}

struct PaymentEntry {
    order_id: OrderId,
    #[allow(dead_code)]
    amount: Money,
    pending_polls: u32,
    fail_reason: Option<String>,
    settled: bool,
}

#[derive(Default)]
struct PaymentState {
    payments: HashMap<String, PaymentEntry>,
    by_order: HashMap<OrderId, String>,
    next_id: u64,
    reject_reason: Option<String>,
    settle_after: u32,
    confirm_fail_reason: Option<String>,
    initiate_faults: u32,
    confirm_faults: u32,
    void_faults: u32,
    initiate_calls: u32,
    confirm_calls: u32,
    void_calls: u32,
}

/// In-memory payment client for tests and local runs.
///
/// By default a hold settles on the first confirm. [`settle_after`]
/// answers `StillPending` that many times first; [`fail_confirm_with`]
/// makes settlement fail instead; the `fail_*` methods inject one
/// transport timeout per call.
///
/// [`settle_after`]: InMemoryPaymentClient::settle_after
/// [`fail_confirm_with`]: InMemoryPaymentClient::fail_confirm_with
#[derive(Clone, Default)]
pub struct InMemoryPaymentClient {
    state: Arc<RwLock<PaymentState>>,
}

impl InMemoryPaymentClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent initiation come back rejected with `reason`.
    pub fn reject_with(&self, reason: &str) {
        self.state.write().unwrap().reject_reason = Some(reason.to_string());
    }

    /// New holds answer `StillPending` to their first `n` confirms.
    pub fn settle_after(&self, n: u32) {
        self.state.write().unwrap().settle_after = n;
    }

    /// New holds fail settlement with `reason` instead of settling.
    pub fn fail_confirm_with(&self, reason: &str) {
        self.state.write().unwrap().confirm_fail_reason = Some(reason.to_string());
    }

    pub fn fail_initiates(&self, n: u32) {
        self.state.write().unwrap().initiate_faults = n;
    }

    pub fn fail_confirms(&self, n: u32) {
        self.state.write().unwrap().confirm_faults = n;
    }

    pub fn fail_voids(&self, n: u32) {
        self.state.write().unwrap().void_faults = n;
    }

    /// Number of holds that settled and were never voided.
    pub fn settled_count(&self) -> usize {
        self.state
            .read()
            .unwrap()
            .payments
            .values()
            .filter(|p| p.settled)
            .count()
    }

    /// Number of holds currently outstanding (settled or not).
    pub fn active_payment_count(&self) -> usize {
        self.state.read().unwrap().payments.len()
    }

    pub fn initiate_call_count(&self) -> u32 {
        self.state.read().unwrap().initiate_calls
    }

    pub fn confirm_call_count(&self) -> u32 {
        self.state.read().unwrap().confirm_calls
    }

    pub fn void_call_count(&self) -> u32 {
        self.state.read().unwrap().void_calls
    }
}

#[async_trait]
impl PaymentClient for InMemoryPaymentClient {
    async fn initiate(
        &self,
        order_id: OrderId,
        amount: Money,
    ) -> Result<InitiateOutcome, RpcError> {
        let mut state = self.state.write().unwrap();
        state.initiate_calls += 1;
        if state.initiate_faults > 0 {
            state.initiate_faults -= 1;
            return Err(RpcError::Timeout);
        }
        if let Some(reason) = &state.reject_reason {
            return Ok(InitiateOutcome::Rejected {
                reason: reason.clone(),
            });
        }
        if let Some(existing) = state.by_order.get(&order_id) {
            return Ok(InitiateOutcome::Pending {
                payment_ref: existing.clone(),
            });
        }
        state.next_id += 1;
        let payment_ref = format!("PAY-{:04}", state.next_id);
        let entry = PaymentEntry {
            order_id,
            amount,
            pending_polls: state.settle_after,
            fail_reason: state.confirm_fail_reason.clone(),
            settled: false,
        };
        state.payments.insert(payment_ref.clone(), entry);
        state.by_order.insert(order_id, payment_ref.clone());
        Ok(InitiateOutcome::Pending { payment_ref })
    }

    async fn confirm(&self, payment_ref: &str) -> Result<ConfirmOutcome, RpcError> {
        let mut state = self.state.write().unwrap();
        state.confirm_calls += 1;
        if state.confirm_faults > 0 {
            state.confirm_faults -= 1;
            return Err(RpcError::Timeout);
        }
        let Some(entry) = state.payments.get_mut(payment_ref) else {
            return Ok(ConfirmOutcome::Failed {
                reason: "unknown_payment".to_string(),
            });
        };
        if entry.pending_polls > 0 {
            entry.pending_polls -= 1;
            return Ok(ConfirmOutcome::StillPending);
        }
        if let Some(reason) = &entry.fail_reason {
            return Ok(ConfirmOutcome::Failed {
                reason: reason.clone(),
            });
        }
        entry.settled = true;
        Ok(ConfirmOutcome::Settled)
    }

    async fn void(&self, payment_ref: &str) -> Result<VoidOutcome, RpcError> {
        let mut state = self.state.write().unwrap();
        state.void_calls += 1;
        if state.void_faults > 0 {
            state.void_faults -= 1;
            return Err(RpcError::Timeout);
        }
        match state.payments.remove(payment_ref) {
            Some(entry) => {
                state.by_order.remove(&entry.order_id);
                Ok(VoidOutcome::Voided)
            }
            None => Ok(VoidOutcome::NotFound),
        }
    }
}
