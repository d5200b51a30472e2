//! Order model, intake, persistence, and published facts.

pub mod facts;
pub mod intake;
pub mod model;
pub mod outbox;
pub mod status;
pub mod store;
pub mod value_objects;

pub use facts::{
    OrderCreated, OrderFailed, OrderFulfilled, TOPIC_ORDER_CREATED, TOPIC_ORDER_FAILED,
    TOPIC_ORDER_FULFILLED,
};
pub use intake::{NewOrderLine, NewOrderRequest, OrderIntake};
pub use model::{Order, OrderLine};
pub use outbox::{Outbox, OutboxEntry, OutboxRelay};
pub use status::OrderStatus;
pub use store::{InMemoryOrderStore, OrderStore, OrderStoreError};
pub use value_objects::{CustomerId, Money, ProductId};

use thiserror::Error;

/// Validation errors raised at intake, before any order is persisted.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrderError {
    /// An order must contain at least one line.
    #[error("order has no lines")]
    EmptyOrder,

    /// Line quantities must be positive.
    #[error("invalid quantity {quantity} for product {product_id}")]
    InvalidQuantity { product_id: ProductId, quantity: u32 },

    /// Unit prices must be non-negative.
    #[error("negative unit price {price} for product {product_id}")]
    NegativeUnitPrice { product_id: ProductId, price: Money },

    /// The order total must fit in the money representation.
    #[error("order total overflows at product {product_id}")]
    TotalOverflow { product_id: ProductId },
}
