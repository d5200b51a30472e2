//! Clients for the collaborator services the saga calls.
//!
//! Each call distinguishes a transport failure ([`RpcError`], retryable)
//! from a definitive business answer (the outcome enums, never retried).

pub mod inventory;
pub mod payment;

pub use inventory::{
    InMemoryInventoryClient, InventoryClient, ReleaseOutcome, ReserveOutcome,
};
pub use payment::{
    ConfirmOutcome, InMemoryPaymentClient, InitiateOutcome, PaymentClient, VoidOutcome,
};

use thiserror::Error;

/// A transport-level failure. The request may or may not have reached
/// the service, so callers must be prepared for either on retry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RpcError {
    #[error("rpc timed out")]
    Timeout,

    #[error("service unreachable: {0}")]
    Unreachable(String),
}
