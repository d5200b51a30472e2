//! Order fulfillment saga: orchestrator, state store, and service clients.
//!
//! The saga coordinates three collaborators per order — inventory
//! reservation, payment escrow, order finalization — and undoes
//! completed steps in reverse when a later one fails definitively.
//! State lives in a [`SagaStore`] keyed by order id; every transition
//! is a compare-and-swap on the current step, which keeps concurrent
//! workers and redelivered triggers from double-driving a saga.

pub mod clients;
pub mod config;
pub mod error;
pub mod instance;
pub mod orchestrator;
pub mod postgres;
pub mod retry;
pub mod step;
pub mod store;
pub mod worker;

pub use clients::{
    ConfirmOutcome, InMemoryInventoryClient, InMemoryPaymentClient, InitiateOutcome,
    InventoryClient, PaymentClient, ReleaseOutcome, ReserveOutcome, RpcError, VoidOutcome,
};
pub use config::SagaConfig;
pub use error::{SagaError, SagaStoreError};
pub use instance::SagaInstance;
pub use orchestrator::{
    PaymentCheck, REASON_COMPENSATION_INCOMPLETE, REASON_FINALIZE_FAILED,
    REASON_INVENTORY_TIMEOUT, REASON_PAYMENT_TIMEOUT, SagaOrchestrator, TOPIC_PAYMENT_CHECK,
};
pub use postgres::PostgresSagaStore;
pub use retry::RetryPolicy;
pub use step::SagaStep;
pub use store::{InMemorySagaStore, SagaStore};
pub use worker::{GROUP_ORCHESTRATOR, SagaWorker};
