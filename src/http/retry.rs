//! Retry policy for platform requests.
//!
//! Transient failures (network errors, 502/503/504) are retried below the API
//! surface; everything else propagates on the first attempt.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::defaults;
use crate::error::{is_retryable_status, ErrorKind, SdkError};

/// What a single attempt produced, as seen by a retry predicate.
#[derive(Debug, Clone, Copy)]
pub enum Attempt<'a> {
    /// The transport failed before a response arrived.
    Failed(&'a SdkError),
    /// The platform answered with this status.
    Responded(u16),
}

/// Decides whether an attempt should be retried.
#[derive(Clone)]
pub struct RetryStrategy(Arc<dyn Fn(Attempt<'_>) -> bool + Send + Sync>);

impl RetryStrategy {
    pub fn new(predicate: impl Fn(Attempt<'_>) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(predicate))
    }

    /// Never retry.
    pub fn never() -> Self {
        Self::new(|_| false)
    }

    pub fn should_retry(&self, attempt: Attempt<'_>) -> bool {
        (self.0)(attempt)
    }
}

impl Default for RetryStrategy {
    /// Network errors and gateway statuses, unless `DEBUG=codefresh*` is set.
    fn default() -> Self {
        Self::new(|attempt| {
            if defaults::debug_enabled() {
                return false;
            }
            match attempt {
                Attempt::Failed(err) => err.kind() == ErrorKind::Network,
                Attempt::Responded(status) => is_retryable_status(status),
            }
        })
    }
}

impl fmt::Debug for RetryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RetryStrategy(..)")
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Pause between attempts
    pub retry_delay: Duration,
    pub strategy: RetryStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: defaults::max_attempts(),
            retry_delay: defaults::retry_delay(),
            strategy: RetryStrategy::default(),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retries.
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            retry_delay: Duration::ZERO,
            strategy: RetryStrategy::never(),
        }
    }

    /// Whether attempt number `attempt` (1-based) may be followed by another.
    pub fn should_retry(&self, attempt: u32, outcome: Attempt<'_>) -> bool {
        attempt < self.max_attempts && self.strategy.should_retry(outcome)
    }
}
