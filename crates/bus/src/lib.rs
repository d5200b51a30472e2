//! Message bus abstraction for publishing and consuming facts.
//!
//! Delivery assumptions match what the orchestrator needs: at-least-once
//! delivery, and FIFO ordering for messages sharing a key within a
//! consumer group. Cross-key ordering is not guaranteed.

pub mod bus;
pub mod error;
pub mod memory;
pub mod message;

pub use bus::{MessageBus, MessageStream};
pub use error::{BusError, Result};
pub use memory::InMemoryBus;
pub use message::Message;
