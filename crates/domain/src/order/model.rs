//! The order and its lines.

use chrono::{DateTime, Utc};
use common::OrderId;
use serde::{Deserialize, Serialize};

use super::status::OrderStatus;
use super::value_objects::{CustomerId, Money, ProductId};

/// A single line of an order. Immutable once the order is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    /// The product being ordered.
    pub product_id: ProductId,
    /// Product name snapshot taken at order time.
    pub product_name: String,
    /// Quantity ordered (validated positive at intake).
    pub quantity: u32,
    /// Price per unit at order time.
    pub unit_price: Money,
}

impl OrderLine {
    /// Creates a new order line.
    pub fn new(
        product_id: impl Into<ProductId>,
        product_name: impl Into<String>,
        quantity: u32,
        unit_price: Money,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            product_name: product_name.into(),
            quantity,
            unit_price,
        }
    }

    /// Returns quantity × unit price for this line.
    pub fn line_total(&self) -> Money {
        self.unit_price.times(self.quantity)
    }
}

/// A customer order.
///
/// Created by intake with status `Pending`; after that, only the saga
/// orchestrator changes the status (through the order store, which
/// enforces the status state machine).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    customer_id: CustomerId,
    lines: Vec<OrderLine>,
    status: OrderStatus,
    created_at: DateTime<Utc>,
}

impl Order {
    /// Creates a new pending order. Lines are assumed validated by intake.
    pub fn new(id: OrderId, customer_id: CustomerId, lines: Vec<OrderLine>) -> Self {
        Self {
            id,
            customer_id,
            lines,
            status: OrderStatus::Pending,
            created_at: Utc::now(),
        }
    }

    /// Returns the order ID.
    pub fn id(&self) -> OrderId {
        self.id
    }

    /// Returns the customer who placed the order.
    pub fn customer_id(&self) -> CustomerId {
        self.customer_id
    }

    /// Returns the order lines in the sequence they were submitted.
    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    /// Returns the current status.
    pub fn status(&self) -> OrderStatus {
        self.status
    }

    /// Returns when the order was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Total amount, always recomputed from the lines.
    pub fn total_amount(&self) -> Money {
        self.lines.iter().map(OrderLine::line_total).sum()
    }

    /// Replaces the status. Callers (the order store) are responsible for
    /// checking the transition first.
    pub(crate) fn set_status(&mut self, status: OrderStatus) {
        self.status = status;
    }
}
