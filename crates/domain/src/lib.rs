//! Order domain for the fulfillment system.
//!
//! This crate owns the order model and the intake side of the workflow:
//! - value objects (`CustomerId`, `ProductId`, `Money`)
//! - the `Order` / `OrderLine` model with derived totals
//! - the `OrderStatus` state machine (mutated only by the orchestrator
//!   after creation)
//! - `OrderIntake`, which validates a new-order command, persists the
//!   order as Pending, and hands an `order.created` fact to the outbox
//! - the outbox relay that publishes persisted facts to the bus, retrying
//!   until each one is delivered exactly once

pub mod error;
pub mod order;

pub use error::DomainError;
pub use order::{
    CustomerId, InMemoryOrderStore, Money, NewOrderLine, NewOrderRequest, Order, OrderCreated,
    OrderError, OrderFailed, OrderFulfilled, OrderIntake, OrderLine, OrderStatus, OrderStore,
    OrderStoreError, Outbox, OutboxEntry, OutboxRelay, ProductId, TOPIC_ORDER_CREATED,
    TOPIC_ORDER_FAILED, TOPIC_ORDER_FULFILLED,
};
