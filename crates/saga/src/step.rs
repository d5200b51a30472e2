//! Saga step state machine.

use serde::{Deserialize, Serialize};

/// The step an order fulfillment saga is currently executing.
///
/// Forward path:
/// ```text
/// NotStarted ──► ReservingInventory ──► Reserved ──► ProcessingPayment ──► Paid ──► Finalizing ──► Done
/// ```
///
/// Compensation runs in reverse order of the completed forward steps:
/// a payment failure releases the reservation (`CompensatingInventory`),
/// a finalize failure first voids the escrow (`CompensatingPayment`) and
/// then releases the reservation. A reservation denied or unreachable
/// before anything was granted short-circuits to `Aborted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SagaStep {
    /// Saga row exists but no step has been claimed yet.
    #[default]
    NotStarted,

    /// Reservation request in flight against the inventory service.
    ReservingInventory,

    /// Inventory granted a reservation.
    Reserved,

    /// Payment escrow initiated; awaiting settlement confirmation.
    ProcessingPayment,

    /// Payment settled.
    Paid,

    /// Writing the confirmed order state.
    Finalizing,

    /// Order fulfilled (terminal).
    Done,

    /// Voiding the payment escrow after a finalize failure.
    CompensatingPayment,

    /// Releasing the inventory reservation.
    CompensatingInventory,

    /// All acquired resources undone (terminal).
    Compensated,

    /// Failed before any resource was acquired (terminal).
    Aborted,
}

impl SagaStep {
    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SagaStep::Done | SagaStep::Compensated | SagaStep::Aborted)
    }

    /// Returns true if this step is on the compensation path.
    pub fn is_compensating(&self) -> bool {
        matches!(
            self,
            SagaStep::CompensatingPayment | SagaStep::CompensatingInventory
        )
    }

    /// Returns true if a transition from `self` to `next` is legal.
    ///
    /// `ProcessingPayment` permits a self-transition so the poll counter
    /// can be persisted between settlement checks.
    pub fn can_transition_to(&self, next: SagaStep) -> bool {
        use SagaStep::*;
        matches!(
            (self, next),
            (NotStarted, ReservingInventory)
                | (ReservingInventory, Reserved)
                | (ReservingInventory, Aborted)
                | (Reserved, ProcessingPayment)
                | (Reserved, CompensatingInventory)
                | (ProcessingPayment, ProcessingPayment)
                | (ProcessingPayment, Paid)
                | (ProcessingPayment, CompensatingInventory)
                | (Paid, Finalizing)
                | (Finalizing, Done)
                | (Finalizing, CompensatingPayment)
                | (CompensatingPayment, CompensatingInventory)
                | (CompensatingInventory, Compensated)
        )
    }

    /// Returns the step name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaStep::NotStarted => "NotStarted",
            SagaStep::ReservingInventory => "ReservingInventory",
            SagaStep::Reserved => "Reserved",
            SagaStep::ProcessingPayment => "ProcessingPayment",
            SagaStep::Paid => "Paid",
            SagaStep::Finalizing => "Finalizing",
            SagaStep::Done => "Done",
            SagaStep::CompensatingPayment => "CompensatingPayment",
            SagaStep::CompensatingInventory => "CompensatingInventory",
            SagaStep::Compensated => "Compensated",
            SagaStep::Aborted => "Aborted",
        }
    }
}

impl std::fmt::Display for SagaStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SagaStep {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NotStarted" => Ok(SagaStep::NotStarted),
            "ReservingInventory" => Ok(SagaStep::ReservingInventory),
            "Reserved" => Ok(SagaStep::Reserved),
            "ProcessingPayment" => Ok(SagaStep::ProcessingPayment),
            "Paid" => Ok(SagaStep::Paid),
            "Finalizing" => Ok(SagaStep::Finalizing),
            "Done" => Ok(SagaStep::Done),
            "CompensatingPayment" => Ok(SagaStep::CompensatingPayment),
            "CompensatingInventory" => Ok(SagaStep::CompensatingInventory),
            "Compensated" => Ok(SagaStep::Compensated),
            "Aborted" => Ok(SagaStep::Aborted),
            other => Err(format!("unknown saga step: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_step_is_not_started() {
        assert_eq!(SagaStep::default(), SagaStep::NotStarted);
    }

    #[test]
    fn test_forward_path() {
        assert!(SagaStep::NotStarted.can_transition_to(SagaStep::ReservingInventory));
        assert!(SagaStep::ReservingInventory.can_transition_to(SagaStep::Reserved));
        assert!(SagaStep::Reserved.can_transition_to(SagaStep::ProcessingPayment));
        assert!(SagaStep::ProcessingPayment.can_transition_to(SagaStep::Paid));
        assert!(SagaStep::Paid.can_transition_to(SagaStep::Finalizing));
        assert!(SagaStep::Finalizing.can_transition_to(SagaStep::Done));
    }

    #[test]
    fn test_compensation_path() {
        assert!(SagaStep::Reserved.can_transition_to(SagaStep::CompensatingInventory));
        assert!(SagaStep::ProcessingPayment.can_transition_to(SagaStep::CompensatingInventory));
        assert!(SagaStep::Finalizing.can_transition_to(SagaStep::CompensatingPayment));
        assert!(SagaStep::CompensatingPayment.can_transition_to(SagaStep::CompensatingInventory));
        assert!(SagaStep::CompensatingInventory.can_transition_to(SagaStep::Compensated));
    }

    #[test]
    fn test_abort_only_from_reserving() {
        assert!(SagaStep::ReservingInventory.can_transition_to(SagaStep::Aborted));
        assert!(!SagaStep::Reserved.can_transition_to(SagaStep::Aborted));
        assert!(!SagaStep::ProcessingPayment.can_transition_to(SagaStep::Aborted));
    }

    #[test]
    fn test_no_skipping_forward_steps() {
        assert!(!SagaStep::NotStarted.can_transition_to(SagaStep::Reserved));
        assert!(!SagaStep::Reserved.can_transition_to(SagaStep::Paid));
        assert!(!SagaStep::Paid.can_transition_to(SagaStep::Done));
    }

    #[test]
    fn test_processing_payment_self_transition() {
        assert!(SagaStep::ProcessingPayment.can_transition_to(SagaStep::ProcessingPayment));
        assert!(!SagaStep::Reserved.can_transition_to(SagaStep::Reserved));
    }

    #[test]
    fn test_terminal_steps() {
        assert!(SagaStep::Done.is_terminal());
        assert!(SagaStep::Compensated.is_terminal());
        assert!(SagaStep::Aborted.is_terminal());
        assert!(!SagaStep::Finalizing.is_terminal());
        assert!(!SagaStep::CompensatingInventory.is_terminal());
    }

    #[test]
    fn test_terminal_steps_have_no_exits() {
        for terminal in [SagaStep::Done, SagaStep::Compensated, SagaStep::Aborted] {
            for next in [
                SagaStep::NotStarted,
                SagaStep::ReservingInventory,
                SagaStep::Reserved,
                SagaStep::ProcessingPayment,
                SagaStep::Paid,
                SagaStep::Finalizing,
                SagaStep::Done,
                SagaStep::CompensatingPayment,
                SagaStep::CompensatingInventory,
                SagaStep::Compensated,
                SagaStep::Aborted,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_round_trip_through_str() {
        let steps = [
            SagaStep::NotStarted,
            SagaStep::ReservingInventory,
            SagaStep::Reserved,
            SagaStep::ProcessingPayment,
            SagaStep::Paid,
            SagaStep::Finalizing,
            SagaStep::Done,
            SagaStep::CompensatingPayment,
            SagaStep::CompensatingInventory,
            SagaStep::Compensated,
            SagaStep::Aborted,
        ];
        for step in steps {
            assert_eq!(step.as_str().parse::<SagaStep>(), Ok(step));
        }
    }
}
