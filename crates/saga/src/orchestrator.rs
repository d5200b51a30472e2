//! Saga orchestrator for order fulfillment.

use common::OrderId;
use domain::{
    OrderCreated, OrderFailed, OrderFulfilled, OrderStatus, OrderStore, TOPIC_ORDER_FAILED,
    TOPIC_ORDER_FULFILLED,
};
use bus::{BusError, MessageBus};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::clients::{
    ConfirmOutcome, InitiateOutcome, InventoryClient, PaymentClient, ReserveOutcome, VoidOutcome,
};
use crate::config::SagaConfig;
use crate::error::{SagaError, SagaStoreError};
use crate::instance::SagaInstance;
use crate::step::SagaStep;
use crate::store::SagaStore;

/// Topic for the orchestrator's own delayed payment settlement checks.
pub const TOPIC_PAYMENT_CHECK: &str = "saga.payment.check";

/// Reason recorded when inventory reservation retries are exhausted.
pub const REASON_INVENTORY_TIMEOUT: &str = "inventory_timeout";
/// Reason recorded when payment initiation or settlement polling gives up.
pub const REASON_PAYMENT_TIMEOUT: &str = "payment_timeout";
/// Reason recorded when the confirmed order state could not be written.
pub const REASON_FINALIZE_FAILED: &str = "finalize_failed";
/// Reason recorded when compensation finished but left a resource behind.
pub const REASON_COMPENSATION_INCOMPLETE: &str = "compensation_incomplete";

/// Work item the orchestrator re-enqueues to itself to poll settlement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentCheck {
    pub order_id: OrderId,
}

/// Drives order fulfillment sagas: reserve inventory, escrow payment,
/// finalize the order, with compensations in reverse on failure.
///
/// Every step transition is written through the saga store's
/// compare-and-swap before its side effect runs, so a racing worker
/// loses the write and backs off instead of double-executing an RPC.
/// Order status writes are denormalized views and best-effort; the saga
/// instance is the source of truth for where fulfillment stands.
pub struct SagaOrchestrator<St, Os, I, P, B>
where
    St: SagaStore,
    Os: OrderStore,
    I: InventoryClient,
    P: PaymentClient,
    B: MessageBus,
{
    sagas: St,
    orders: Os,
    inventory: I,
    payment: P,
    bus: B,
    config: SagaConfig,
}

impl<St, Os, I, P, B> SagaOrchestrator<St, Os, I, P, B>
where
    St: SagaStore,
    Os: OrderStore,
    I: InventoryClient,
    P: PaymentClient,
    B: MessageBus,
{
    pub fn new(sagas: St, orders: Os, inventory: I, payment: P, bus: B, config: SagaConfig) -> Self {
        Self {
            sagas,
            orders,
            inventory,
            payment,
            bus,
            config,
        }
    }

    /// Entry point for `order.created` facts.
    ///
    /// Redeliveries are absorbed here: a saga already past `NotStarted`
    /// is left alone unless its heartbeat is older than the lease
    /// window, in which case the original worker is presumed dead and
    /// the saga resumes from its persisted step.
    #[tracing::instrument(skip(self, fact), fields(order_id = %fact.order_id))]
    pub async fn handle_order_created(&self, fact: &OrderCreated) -> Result<(), SagaError> {
        let (instance, created) = self.sagas.load_or_create(fact.order_id).await?;

        if !created && instance.step() != SagaStep::NotStarted {
            if instance.step().is_terminal() {
                tracing::debug!(step = %instance.step(), "redelivery for settled saga, ignoring");
                return Ok(());
            }
            if instance.lease_expired(self.config.lease_window) {
                tracing::info!(step = %instance.step(), "lease expired, resuming stalled saga");
                metrics::counter!("saga_resumed_total").increment(1);
                return self.resume(instance, fact).await;
            }
            tracing::debug!(step = %instance.step(), "saga already in progress, ignoring");
            return Ok(());
        }

        metrics::counter!("saga_started_total").increment(1);
        self.run_from_start(instance, fact).await
    }

    /// Entry point for `saga.payment.check` work items.
    #[tracing::instrument(skip(self, check), fields(order_id = %check.order_id))]
    pub async fn handle_payment_check(&self, check: &PaymentCheck) -> Result<(), SagaError> {
        let order_id = check.order_id;
        let Some(mut instance) = self.sagas.get(order_id).await? else {
            tracing::warn!("payment check for unknown saga, dropping");
            return Ok(());
        };
        if instance.step() != SagaStep::ProcessingPayment {
            tracing::debug!(step = %instance.step(), "payment check for settled step, ignoring");
            return Ok(());
        }
        let payment_ref = instance
            .payment_ref()
            .map(str::to_string)
            .ok_or(SagaError::MissingPaymentRef(order_id, instance.step()))?;

        match self.payment.confirm(&payment_ref).await {
            Ok(ConfirmOutcome::Settled) => {
                if !self.advance(&mut instance, SagaStep::Paid, |_| {}).await? {
                    return Ok(());
                }
                self.finalize(instance, order_id).await
            }
            Ok(ConfirmOutcome::StillPending) => self.reschedule_or_give_up(instance, order_id).await,
            Ok(ConfirmOutcome::Failed { reason }) => {
                tracing::warn!(%reason, "payment settlement failed, compensating");
                self.compensate_inventory(instance, order_id, reason).await
            }
            Err(e) => {
                tracing::warn!(error = %e, "transient confirm failure, counting as a poll");
                self.reschedule_or_give_up(instance, order_id).await
            }
        }
    }

    async fn run_from_start(
        &self,
        mut instance: SagaInstance,
        fact: &OrderCreated,
    ) -> Result<(), SagaError> {
        // Claim the saga before any side effect.
        if !self
            .advance(&mut instance, SagaStep::ReservingInventory, |_| {})
            .await?
        {
            return Ok(());
        }
        self.reserve(instance, fact).await
    }

    /// Continues a re-claimed saga from its persisted step.
    async fn resume(&self, instance: SagaInstance, fact: &OrderCreated) -> Result<(), SagaError> {
        let order_id = fact.order_id;
        match instance.step() {
            SagaStep::NotStarted => self.run_from_start(instance, fact).await,
            SagaStep::ReservingInventory => self.reserve(instance, fact).await,
            SagaStep::Reserved => self.start_payment(instance, order_id, fact).await,
            SagaStep::ProcessingPayment => self.schedule_payment_check(order_id).await,
            SagaStep::Paid | SagaStep::Finalizing => self.finalize(instance, order_id).await,
            SagaStep::CompensatingPayment => {
                self.compensate_payment(instance, order_id, None).await
            }
            SagaStep::CompensatingInventory => {
                let reason = instance
                    .last_error()
                    .unwrap_or(REASON_COMPENSATION_INCOMPLETE)
                    .to_string();
                self.compensate_inventory(instance, order_id, reason).await
            }
            SagaStep::Done | SagaStep::Compensated | SagaStep::Aborted => Ok(()),
        }
    }

    /// Reserves inventory, retrying transient failures with backoff.
    async fn reserve(
        &self,
        mut instance: SagaInstance,
        fact: &OrderCreated,
    ) -> Result<(), SagaError> {
        let order_id = fact.order_id;
        let policy = self.config.reserve_retry;
        loop {
            instance.record_reserve_attempt();
            match self.inventory.reserve(order_id, &fact.lines).await {
                Ok(ReserveOutcome::Granted { reservation_id }) => {
                    tracing::info!(%reservation_id, "inventory reserved");
                    if !self
                        .advance(&mut instance, SagaStep::Reserved, |i| {
                            i.set_reservation_id(reservation_id.clone())
                        })
                        .await?
                    {
                        return Ok(());
                    }
                    self.update_order_status(order_id, OrderStatus::InventoryReserved)
                        .await;
                    return self.start_payment(instance, order_id, fact).await;
                }
                Ok(ReserveOutcome::Denied { reason }) => {
                    tracing::warn!(%reason, "reservation denied, aborting");
                    return self.abort(instance, order_id, reason).await;
                }
                Err(e) => {
                    let attempts = instance.reserve_attempts();
                    tracing::warn!(error = %e, attempts, "transient reserve failure");
                    if policy.is_exhausted(attempts) {
                        return self
                            .abort(instance, order_id, REASON_INVENTORY_TIMEOUT.to_string())
                            .await;
                    }
                    tokio::time::sleep(policy.delay_for(attempts)).await;
                }
            }
        }
    }

    /// Initiates the payment escrow. The payment reference lands in the
    /// same write that enters `ProcessingPayment`, so the step never
    /// exists without its handle; initiation is idempotent per order,
    /// which makes the call safe to repeat after a crash.
    async fn start_payment(
        &self,
        mut instance: SagaInstance,
        order_id: OrderId,
        fact: &OrderCreated,
    ) -> Result<(), SagaError> {
        let policy = self.config.payment_retry;
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match self.payment.initiate(order_id, fact.total_amount).await {
                Ok(InitiateOutcome::Pending { payment_ref }) => {
                    tracing::info!(%payment_ref, "payment escrow initiated");
                    if !self
                        .advance(&mut instance, SagaStep::ProcessingPayment, |i| {
                            i.set_payment_ref(payment_ref.clone())
                        })
                        .await?
                    {
                        return Ok(());
                    }
                    self.update_order_status(order_id, OrderStatus::PaymentPending)
                        .await;
                    return self.schedule_payment_check(order_id).await;
                }
                Ok(InitiateOutcome::Rejected { reason }) => {
                    tracing::warn!(%reason, "payment rejected, compensating");
                    return self.compensate_inventory(instance, order_id, reason).await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, attempts, "transient initiate failure");
                    if policy.is_exhausted(attempts) {
                        return self
                            .compensate_inventory(
                                instance,
                                order_id,
                                REASON_PAYMENT_TIMEOUT.to_string(),
                            )
                            .await;
                    }
                    tokio::time::sleep(policy.delay_for(attempts)).await;
                }
            }
        }
    }

    /// Counts a settlement poll and either re-enqueues a delayed check
    /// or gives up and compensates once the poll budget is spent.
    async fn reschedule_or_give_up(
        &self,
        mut instance: SagaInstance,
        order_id: OrderId,
    ) -> Result<(), SagaError> {
        // Self-transition persists the poll counter and the heartbeat.
        // Unlike step-changing CAS writes it cannot detect a concurrent
        // writer; checks for one saga are keyed by order id, so delivery
        // serializes them onto a single group member. A duplicated check
        // after a lease resume shifts the poll budget by one interval at
        // worst.
        if !self
            .advance(&mut instance, SagaStep::ProcessingPayment, |i| {
                i.record_confirm_poll()
            })
            .await?
        {
            return Ok(());
        }
        if instance.confirm_polls() >= self.config.confirm_max_polls {
            tracing::warn!(polls = instance.confirm_polls(), "settlement never arrived, compensating");
            return self
                .compensate_inventory(instance, order_id, REASON_PAYMENT_TIMEOUT.to_string())
                .await;
        }
        self.schedule_payment_check(order_id).await
    }

    async fn schedule_payment_check(&self, order_id: OrderId) -> Result<(), SagaError> {
        let check = PaymentCheck { order_id };
        self.bus
            .publish_delayed(
                TOPIC_PAYMENT_CHECK,
                &order_id.to_string(),
                serde_json::to_value(&check)?,
                self.config.confirm_poll_delay,
            )
            .await?;
        Ok(())
    }

    /// Writes the confirmed order state and closes the saga. A failed
    /// write means money is held for an order we cannot confirm, so the
    /// escrow is voided and the reservation released.
    async fn finalize(
        &self,
        mut instance: SagaInstance,
        order_id: OrderId,
    ) -> Result<(), SagaError> {
        if instance.step() == SagaStep::Paid
            && !self
                .advance(&mut instance, SagaStep::Finalizing, |_| {})
                .await?
        {
            return Ok(());
        }
        match self.orders.set_status(order_id, OrderStatus::Confirmed).await {
            Ok(()) => {
                if !self.advance(&mut instance, SagaStep::Done, |_| {}).await? {
                    return Ok(());
                }
                let fact = OrderFulfilled {
                    order_id,
                    confirmed_at: Utc::now(),
                };
                self.publish_fact(TOPIC_ORDER_FULFILLED, order_id, serde_json::to_value(&fact)?)
                    .await;
                metrics::counter!("saga_completed_total").increment(1);
                tracing::info!("order fulfilled");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "finalize failed, unwinding payment and inventory");
                self.compensate_payment(instance, order_id, Some(REASON_FINALIZE_FAILED.to_string()))
                    .await
            }
        }
    }

    /// Voids the payment escrow, then falls through to releasing the
    /// reservation. `reason` is `None` when resuming a saga already in
    /// `CompensatingPayment`.
    async fn compensate_payment(
        &self,
        mut instance: SagaInstance,
        order_id: OrderId,
        reason: Option<String>,
    ) -> Result<(), SagaError> {
        if instance.step() != SagaStep::CompensatingPayment {
            self.update_order_status(order_id, OrderStatus::Compensating)
                .await;
            if !self
                .advance(&mut instance, SagaStep::CompensatingPayment, |i| {
                    if let Some(reason) = &reason {
                        i.set_last_error(reason.clone());
                    }
                })
                .await?
            {
                return Ok(());
            }
        }
        let reason = instance
            .last_error()
            .unwrap_or(REASON_FINALIZE_FAILED)
            .to_string();
        let payment_ref = instance
            .payment_ref()
            .map(str::to_string)
            .ok_or(SagaError::MissingPaymentRef(order_id, instance.step()))?;

        let policy = self.config.compensation_retry;
        let mut voided = false;
        loop {
            instance.record_void_attempt();
            match self.payment.void(&payment_ref).await {
                Ok(VoidOutcome::Voided) | Ok(VoidOutcome::NotFound) => {
                    voided = true;
                    break;
                }
                Err(e) => {
                    let attempts = instance.void_attempts();
                    tracing::warn!(error = %e, attempts, "transient void failure");
                    if policy.is_exhausted(attempts) {
                        tracing::error!(%payment_ref, "void retries exhausted, escrow needs manual review");
                        break;
                    }
                    tokio::time::sleep(policy.delay_for(attempts)).await;
                }
            }
        }
        if !voided {
            instance.set_last_error(format!(
                "{REASON_COMPENSATION_INCOMPLETE}: escrow {payment_ref} not voided"
            ));
        }
        self.compensate_inventory(instance, order_id, reason).await
    }

    /// Releases the inventory reservation and settles the saga as
    /// `Compensated`. If release retries run out, the saga still
    /// terminates, flagged for manual cleanup.
    async fn compensate_inventory(
        &self,
        mut instance: SagaInstance,
        order_id: OrderId,
        reason: String,
    ) -> Result<(), SagaError> {
        // A leaked escrow from the void phase must survive into the
        // terminal record even though we still release inventory.
        let escrow_leaked = instance
            .last_error()
            .is_some_and(|e| e.starts_with(REASON_COMPENSATION_INCOMPLETE));
        if instance.step() != SagaStep::CompensatingInventory {
            if !instance.step().is_compensating() {
                self.update_order_status(order_id, OrderStatus::Compensating)
                    .await;
            }
            if !self
                .advance(&mut instance, SagaStep::CompensatingInventory, |i| {
                    if !escrow_leaked {
                        i.set_last_error(reason.clone());
                    }
                })
                .await?
            {
                return Ok(());
            }
        }
        let mut released = true;
        if let Some(reservation_id) = instance.reservation_id().map(str::to_string) {
            let policy = self.config.compensation_retry;
            loop {
                instance.record_release_attempt();
                match self.inventory.release(&reservation_id).await {
                    Ok(_) => break,
                    Err(e) => {
                        let attempts = instance.release_attempts();
                        tracing::warn!(error = %e, attempts, "transient release failure");
                        if policy.is_exhausted(attempts) {
                            tracing::error!(%reservation_id, "release retries exhausted, reservation needs manual review");
                            instance.set_last_error(format!(
                                "{REASON_COMPENSATION_INCOMPLETE}: reservation {reservation_id} not released"
                            ));
                            released = false;
                            break;
                        }
                        tokio::time::sleep(policy.delay_for(attempts)).await;
                    }
                }
            }
        }

        let incomplete = !released || escrow_leaked;
        let reason = if incomplete {
            REASON_COMPENSATION_INCOMPLETE.to_string()
        } else {
            reason
        };
        if !self
            .advance(&mut instance, SagaStep::Compensated, |_| {})
            .await?
        {
            return Ok(());
        }
        self.update_order_status(order_id, OrderStatus::Failed).await;
        let fact = OrderFailed {
            order_id,
            reason,
            compensated: !incomplete,
        };
        self.publish_fact(TOPIC_ORDER_FAILED, order_id, serde_json::to_value(&fact)?)
            .await;
        metrics::counter!("saga_compensated_total").increment(1);
        tracing::info!(compensated = !incomplete, "saga compensated");
        Ok(())
    }

    /// Terminates a saga that never acquired anything.
    async fn abort(
        &self,
        mut instance: SagaInstance,
        order_id: OrderId,
        reason: String,
    ) -> Result<(), SagaError> {
        if !self
            .advance(&mut instance, SagaStep::Aborted, |i| {
                i.set_last_error(reason.clone())
            })
            .await?
        {
            return Ok(());
        }
        self.update_order_status(order_id, OrderStatus::Failed).await;
        let fact = OrderFailed {
            order_id,
            reason,
            compensated: false,
        };
        self.publish_fact(TOPIC_ORDER_FAILED, order_id, serde_json::to_value(&fact)?)
            .await;
        metrics::counter!("saga_aborted_total").increment(1);
        tracing::info!("saga aborted");
        Ok(())
    }

    /// CAS-advances the saga one step. Returns false when another
    /// worker won the race, in which case the caller must stop without
    /// executing the step's side effect.
    async fn advance<F>(
        &self,
        instance: &mut SagaInstance,
        to: SagaStep,
        mutate: F,
    ) -> Result<bool, SagaError>
    where
        F: FnOnce(&mut SagaInstance),
    {
        let expected = instance.step();
        let mut next = instance.clone();
        next.advance(to)?;
        mutate(&mut next);
        match self.sagas.compare_and_swap(expected, &next).await {
            Ok(()) => {
                *instance = next;
                Ok(true)
            }
            Err(SagaStoreError::Conflict { actual, .. }) => {
                tracing::debug!(
                    order_id = %instance.order_id(),
                    %expected,
                    %actual,
                    "lost step race, yielding"
                );
                metrics::counter!("saga_step_conflicts_total").increment(1);
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Order status writes mirror the saga into the order row for
    /// readers. They are not part of the saga's correctness, so a
    /// failure is logged rather than propagated.
    async fn update_order_status(&self, order_id: OrderId, status: OrderStatus) {
        if let Err(e) = self.orders.set_status(order_id, status).await {
            tracing::warn!(order_id = %order_id, %status, error = %e, "order status write failed");
        }
    }

    /// Publishes a terminal fact. Nobody listening is tolerated; any
    /// other failure is logged and counted.
    async fn publish_fact(&self, topic: &str, order_id: OrderId, payload: serde_json::Value) {
        match self.bus.publish(topic, &order_id.to_string(), payload).await {
            Ok(()) | Err(BusError::NoSubscribers(_)) => {}
            Err(e) => {
                tracing::error!(topic, order_id = %order_id, error = %e, "fact publish failed");
                metrics::counter!("saga_fact_publish_failures_total").increment(1);
            }
        }
    }
}
