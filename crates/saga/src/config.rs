//! Orchestrator tuning knobs.

use std::time::Duration;

use crate::retry::RetryPolicy;

/// Tuning for one orchestrator: retry budgets, payment poll cadence,
/// and the lease window after which a stalled saga may be re-claimed.
#[derive(Debug, Clone, Copy)]
pub struct SagaConfig {
    /// Retries for transient failures while reserving inventory.
    pub reserve_retry: RetryPolicy,
    /// Retries for transient failures while initiating the payment escrow.
    pub payment_retry: RetryPolicy,
    /// Retries for release and void calls during compensation.
    pub compensation_retry: RetryPolicy,
    /// Delay between payment settlement checks.
    pub confirm_poll_delay: Duration,
    /// Settlement checks allowed before the payment is declared stuck.
    pub confirm_max_polls: u32,
    /// A non-terminal saga untouched for longer than this is presumed
    /// orphaned and may be resumed by whoever sees its trigger again.
    pub lease_window: Duration,
}

impl Default for SagaConfig {
    fn default() -> Self {
        Self {
            reserve_retry: RetryPolicy::default(),
            payment_retry: RetryPolicy::default(),
            compensation_retry: RetryPolicy::default(),
            confirm_poll_delay: Duration::from_millis(500),
            confirm_max_polls: 10,
            lease_window: Duration::from_secs(30),
        }
    }
}

impl SagaConfig {
    /// A configuration with no sleeps, for tests that drive the
    /// orchestrator under a paused tokio clock.
    pub fn immediate() -> Self {
        Self {
            reserve_retry: RetryPolicy::new(3, Duration::ZERO, Duration::ZERO),
            payment_retry: RetryPolicy::new(3, Duration::ZERO, Duration::ZERO),
            compensation_retry: RetryPolicy::new(3, Duration::ZERO, Duration::ZERO),
            confirm_poll_delay: Duration::ZERO,
            confirm_max_polls: 10,
            lease_window: Duration::from_secs(30),
        }
    }
}
