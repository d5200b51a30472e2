//! Order status state machine.

use serde::{Deserialize, Serialize};

/// The customer-visible status of an order.
///
/// Set to `Pending` at intake; every later transition is made by the saga
/// orchestrator as it advances or compensates:
/// ```text
/// Pending ──► InventoryReserved ──► PaymentPending ──► Confirmed
///    │               │                    │
///    └───────────────┴────► Compensating ─┴──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// Order accepted at intake, saga not finished with inventory yet.
    #[default]
    Pending,

    /// Inventory reserved, payment not yet initiated.
    InventoryReserved,

    /// Payment initiated in escrow, awaiting settlement.
    PaymentPending,

    /// Payment settled and order finalized (terminal).
    Confirmed,

    /// A step failed; previously completed steps are being undone.
    Compensating,

    /// Order will not be fulfilled (terminal).
    Failed,
}

impl OrderStatus {
    /// Returns true if `next` is a legal successor of this status.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, InventoryReserved)
                | (Pending, Compensating)
                | (Pending, Failed)
                | (InventoryReserved, PaymentPending)
                | (InventoryReserved, Compensating)
                | (InventoryReserved, Failed)
                | (PaymentPending, Confirmed)
                | (PaymentPending, Compensating)
                | (PaymentPending, Failed)
                | (Compensating, Failed)
        )
    }

    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Confirmed | OrderStatus::Failed)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::InventoryReserved => "InventoryReserved",
            OrderStatus::PaymentPending => "PaymentPending",
            OrderStatus::Confirmed => "Confirmed",
            OrderStatus::Compensating => "Compensating",
            OrderStatus::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
