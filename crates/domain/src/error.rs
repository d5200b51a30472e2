//! Domain error types.

use bus::BusError;
use thiserror::Error;

use crate::order::{OrderError, OrderStoreError};

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Intake input was rejected before any saga started.
    #[error("order error: {0}")]
    Order(#[from] OrderError),

    /// An error occurred in the order store.
    #[error("order store error: {0}")]
    Store(#[from] OrderStoreError),

    /// An error occurred publishing to the message bus.
    #[error("bus error: {0}")]
    Bus(#[from] BusError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
