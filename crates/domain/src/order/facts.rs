//! Facts published on the message bus.
//!
//! A fact is an immutable record of something that already happened. All
//! fulfillment facts are keyed by the order ID so the bus delivers them
//! FIFO per order.

use chrono::{DateTime, Utc};
use common::OrderId;
use serde::{Deserialize, Serialize};

use super::model::{Order, OrderLine};
use super::value_objects::{CustomerId, Money};

/// Topic for the intake fact that starts a saga.
pub const TOPIC_ORDER_CREATED: &str = "order.created";

/// Topic for the terminal success fact.
pub const TOPIC_ORDER_FULFILLED: &str = "order.fulfilled";

/// Topic for the terminal failure fact.
pub const TOPIC_ORDER_FAILED: &str = "order.failed";

/// Snapshot of an order at intake, published as `order.created`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCreated {
    pub order_id: OrderId,
    pub customer_id: CustomerId,
    pub lines: Vec<OrderLine>,
    pub total_amount: Money,
    pub created_at: DateTime<Utc>,
}

impl OrderCreated {
    /// Builds the fact from a freshly persisted order.
    pub fn from_order(order: &Order) -> Self {
        Self {
            order_id: order.id(),
            customer_id: order.customer_id(),
            lines: order.lines().to_vec(),
            total_amount: order.total_amount(),
            created_at: order.created_at(),
        }
    }
}

/// Published once when a saga reaches its successful terminal step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderFulfilled {
    pub order_id: OrderId,
    pub confirmed_at: DateTime<Utc>,
}

/// Published once when a saga reaches a failed terminal step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderFailed {
    pub order_id: OrderId,
    /// Machine-readable reason code ("out_of_stock", "payment_timeout", ...).
    pub reason: String,
    /// True when every previously completed step was undone.
    pub compensated: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_created_snapshot_carries_lines_and_total() {
        let order = Order::new(
            OrderId::new(),
            CustomerId::new(),
            vec![
                OrderLine::new("P1", "Seed", 2, Money::from_cents(500)),
                OrderLine::new("P2", "Feed", 1, Money::from_cents(300)),
            ],
        );

        let fact = OrderCreated::from_order(&order);
        assert_eq!(fact.order_id, order.id());
        assert_eq!(fact.lines.len(), 2);
        assert_eq!(fact.total_amount.cents(), 1300);

        let json = serde_json::to_value(&fact).unwrap();
        let restored: OrderCreated = serde_json::from_value(json).unwrap();
        assert_eq!(restored.total_amount, fact.total_amount);
    }

    #[test]
    fn order_failed_roundtrip() {
        let fact = OrderFailed {
            order_id: OrderId::new(),
            reason: "out_of_stock".to_string(),
            compensated: false,
        };
        let json = serde_json::to_string(&fact).unwrap();
        let restored: OrderFailed = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.reason, "out_of_stock");
        assert!(!restored.compensated);
    }
}
