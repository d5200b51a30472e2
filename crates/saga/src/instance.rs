//! Mutable saga state, one record per order.

use chrono::{DateTime, Utc};
use common::OrderId;
use serde::{Deserialize, Serialize};

use crate::error::SagaError;
use crate::step::SagaStep;

/// The durable state of one order fulfillment saga.
///
/// There is exactly one instance per order, keyed by the order id.
/// `reservation_id` is present while an inventory reservation is held
/// (from `Reserved` until it is released or the saga finishes `Done`);
/// `payment_ref` is present while a payment escrow exists. `updated_at`
/// doubles as a liveness heartbeat: a redelivered trigger may re-claim
/// a non-terminal saga whose heartbeat is older than the lease window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaInstance {
    order_id: OrderId,
    step: SagaStep,
    reservation_id: Option<String>,
    payment_ref: Option<String>,
    reserve_attempts: u32,
    confirm_polls: u32,
    release_attempts: u32,
    void_attempts: u32,
    last_error: Option<String>,
    updated_at: DateTime<Utc>,
}

impl SagaInstance {
    /// Creates a fresh saga for an order, at `NotStarted`.
    pub fn new(order_id: OrderId) -> Self {
        Self {
            order_id,
            step: SagaStep::NotStarted,
            reservation_id: None,
            payment_ref: None,
            reserve_attempts: 0,
            confirm_polls: 0,
            release_attempts: 0,
            void_attempts: 0,
            last_error: None,
            updated_at: Utc::now(),
        }
    }

    /// Rehydrates an instance from stored fields. Used by stores only.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        order_id: OrderId,
        step: SagaStep,
        reservation_id: Option<String>,
        payment_ref: Option<String>,
        reserve_attempts: u32,
        confirm_polls: u32,
        release_attempts: u32,
        void_attempts: u32,
        last_error: Option<String>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            order_id,
            step,
            reservation_id,
            payment_ref,
            reserve_attempts,
            confirm_polls,
            release_attempts,
            void_attempts,
            last_error,
            updated_at,
        }
    }

    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    pub fn step(&self) -> SagaStep {
        self.step
    }

    pub fn reservation_id(&self) -> Option<&str> {
        self.reservation_id.as_deref()
    }

    pub fn payment_ref(&self) -> Option<&str> {
        self.payment_ref.as_deref()
    }

    pub fn reserve_attempts(&self) -> u32 {
        self.reserve_attempts
    }

    pub fn confirm_polls(&self) -> u32 {
        self.confirm_polls
    }

    pub fn release_attempts(&self) -> u32 {
        self.release_attempts
    }

    pub fn void_attempts(&self) -> u32 {
        self.void_attempts
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns true if the heartbeat is older than `window`, meaning the
    /// worker that held this saga is presumed dead and it may be re-claimed.
    pub fn lease_expired(&self, window: std::time::Duration) -> bool {
        let window = chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX);
        Utc::now().signed_duration_since(self.updated_at) > window
    }

    /// Moves the saga to `to`, refreshing the heartbeat.
    ///
    /// Entering `CompensatingInventory` clears the payment reference (the
    /// escrow is gone, either voided or never settled); terminal
    /// compensation states clear both resource handles.
    pub fn advance(&mut self, to: SagaStep) -> Result<(), SagaError> {
        if !self.step.can_transition_to(to) {
            return Err(SagaError::IllegalTransition {
                order_id: self.order_id,
                from: self.step,
                to,
            });
        }
        self.step = to;
        match to {
            SagaStep::CompensatingInventory => self.payment_ref = None,
            SagaStep::Compensated | SagaStep::Aborted => {
                self.reservation_id = None;
                self.payment_ref = None;
            }
            _ => {}
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn set_reservation_id(&mut self, reservation_id: String) {
        self.reservation_id = Some(reservation_id);
    }

    pub fn set_payment_ref(&mut self, payment_ref: String) {
        self.payment_ref = Some(payment_ref);
    }

    pub fn set_last_error(&mut self, error: impl Into<String>) {
        self.last_error = Some(error.into());
    }

    pub fn record_reserve_attempt(&mut self) {
        self.reserve_attempts += 1;
    }

    pub fn record_confirm_poll(&mut self) {
        self.confirm_polls += 1;
    }

    pub fn record_release_attempt(&mut self) {
        self.release_attempts += 1;
    }

    pub fn record_void_attempt(&mut self) {
        self.void_attempts += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance() -> SagaInstance {
        SagaInstance::new(OrderId::new())
    }

    #[test]
    fn test_new_instance_starts_fresh() {
        let saga = instance();
        assert_eq!(saga.step(), SagaStep::NotStarted);
        assert!(saga.reservation_id().is_none());
        assert!(saga.payment_ref().is_none());
        assert_eq!(saga.reserve_attempts(), 0);
        assert!(saga.last_error().is_none());
    }

    #[test]
    fn test_advance_rejects_illegal_transition() {
        let mut saga = instance();
        let err = saga.advance(SagaStep::Paid).unwrap_err();
        assert!(matches!(
            err,
            SagaError::IllegalTransition {
                from: SagaStep::NotStarted,
                to: SagaStep::Paid,
                ..
            }
        ));
        assert_eq!(saga.step(), SagaStep::NotStarted);
    }

    #[test]
    fn test_advance_walks_the_happy_path() {
        let mut saga = instance();
        saga.advance(SagaStep::ReservingInventory).unwrap();
        saga.advance(SagaStep::Reserved).unwrap();
        saga.set_reservation_id("RES-0001".to_string());
        saga.advance(SagaStep::ProcessingPayment).unwrap();
        saga.set_payment_ref("PAY-0001".to_string());
        saga.advance(SagaStep::Paid).unwrap();
        saga.advance(SagaStep::Finalizing).unwrap();
        saga.advance(SagaStep::Done).unwrap();
        assert_eq!(saga.reservation_id(), Some("RES-0001"));
        assert_eq!(saga.payment_ref(), Some("PAY-0001"));
    }

    #[test]
    fn test_entering_compensating_inventory_drops_payment_ref() {
        let mut saga = instance();
        saga.advance(SagaStep::ReservingInventory).unwrap();
        saga.advance(SagaStep::Reserved).unwrap();
        saga.set_reservation_id("RES-0001".to_string());
        saga.advance(SagaStep::ProcessingPayment).unwrap();
        saga.set_payment_ref("PAY-0001".to_string());
        saga.advance(SagaStep::CompensatingInventory).unwrap();
        assert!(saga.payment_ref().is_none());
        assert_eq!(saga.reservation_id(), Some("RES-0001"));
        saga.advance(SagaStep::Compensated).unwrap();
        assert!(saga.reservation_id().is_none());
    }

    #[test]
    fn test_lease_expiry() {
        let saga = instance();
        assert!(!saga.lease_expired(std::time::Duration::from_secs(30)));
        assert!(saga.lease_expired(std::time::Duration::ZERO));
    }

    #[test]
    fn test_advance_refreshes_heartbeat() {
        let mut saga = instance();
        let before = saga.updated_at();
        std::thread::sleep(std::time::Duration::from_millis(2));
        saga.advance(SagaStep::ReservingInventory).unwrap();
        assert!(saga.updated_at() > before);
    }
}
