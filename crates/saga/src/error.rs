//! Error types for the saga crate.

use common::OrderId;
use thiserror::Error;

use crate::step::SagaStep;

/// Errors produced by the saga state store.
#[derive(Debug, Error)]
pub enum SagaStoreError {
    /// The stored step no longer matches what the writer observed.
    /// Another worker advanced the saga first.
    #[error("stale saga step for order {order_id}: expected {expected}, found {actual}")]
    Conflict {
        order_id: OrderId,
        expected: SagaStep,
        actual: SagaStep,
    },

    #[error("saga not found for order {0}")]
    NotFound(OrderId),

    #[error("stored saga step is not recognized: {0}")]
    InvalidStep(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Errors produced by the saga orchestrator.
#[derive(Debug, Error)]
pub enum SagaError {
    #[error("illegal saga transition {from} -> {to} for order {order_id}")]
    IllegalTransition {
        order_id: OrderId,
        from: SagaStep,
        to: SagaStep,
    },

    #[error("saga for order {0} is in {1} but has no payment reference")]
    MissingPaymentRef(OrderId, SagaStep),

    #[error("saga store error: {0}")]
    Store(#[from] SagaStoreError),

    #[error("order store error: {0}")]
    OrderStore(#[from] domain::OrderStoreError),

    #[error("bus error: {0}")]
    Bus(#[from] bus::BusError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
