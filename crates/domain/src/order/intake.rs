//! Order intake: validation, persistence, and fact staging.

use common::OrderId;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

use super::facts::{OrderCreated, TOPIC_ORDER_CREATED};
use super::model::{Order, OrderLine};
use super::outbox::Outbox;
use super::store::OrderStore;
use super::value_objects::{CustomerId, Money, ProductId};
use super::OrderError;

/// One requested line of a new order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderLine {
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
}

/// A new-order command as received from the front door.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderRequest {
    pub customer_id: CustomerId,
    pub lines: Vec<NewOrderLine>,
}

/// Accepts new orders.
///
/// On success the order is persisted with status `Pending` and an
/// `order.created` fact is staged in the outbox as part of the same
/// logical unit; the outbox relay guarantees eventual publication.
pub struct OrderIntake<S: OrderStore> {
    store: S,
    outbox: Outbox,
}

impl<S: OrderStore> OrderIntake<S> {
    /// Creates an intake over the given store and outbox.
    pub fn new(store: S, outbox: Outbox) -> Self {
        Self { store, outbox }
    }

    /// Validates and accepts a new order.
    ///
    /// Rejects with a validation error before persisting anything if the
    /// request has no lines, a zero quantity, a negative unit price, or a
    /// total too large to represent.
    #[tracing::instrument(skip(self, request), fields(customer_id = %request.customer_id))]
    pub async fn create_order(&self, request: NewOrderRequest) -> Result<Order, DomainError> {
        let lines = validate_lines(request.lines)?;
        let order = Order::new(OrderId::new(), request.customer_id, lines);

        self.store.insert(order.clone()).await?;

        let fact = OrderCreated::from_order(&order);
        self.outbox
            .enqueue(TOPIC_ORDER_CREATED, &order.id().to_string(), &fact)
            .await?;

        metrics::counter!("orders_accepted_total").increment(1);
        tracing::info!(order_id = %order.id(), total = %order.total_amount(), "order accepted");

        Ok(order)
    }
}

fn validate_lines(lines: Vec<NewOrderLine>) -> Result<Vec<OrderLine>, OrderError> {
    if lines.is_empty() {
        return Err(OrderError::EmptyOrder);
    }

    let mut validated = Vec::with_capacity(lines.len());
    let mut total = Money::zero();
    for line in lines {
        let product_id = ProductId::from(line.product_id);
        if line.quantity == 0 {
            return Err(OrderError::InvalidQuantity {
                product_id,
                quantity: 0,
            });
        }
        if line.unit_price.is_negative() {
            return Err(OrderError::NegativeUnitPrice {
                product_id,
                price: line.unit_price,
            });
        }
        // The total is recomputed from the lines downstream, so it must
        // fit exactly.
        total = line
            .unit_price
            .checked_times(line.quantity)
            .and_then(|line_total| total.checked_add(line_total))
            .ok_or_else(|| OrderError::TotalOverflow {
                product_id: product_id.clone(),
            })?;
        validated.push(OrderLine::new(
            product_id,
            line.product_name,
            line.quantity,
            line.unit_price,
        ));
    }
    Ok(validated)
}
