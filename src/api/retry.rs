//! Retry policy for gateway calls.
//!
//! Only transport timeouts are retried. The policy is a pure function of the
//! attempt number and the failure class, so it can be tested without a
//! network.

use std::time::Duration;

/// Total attempts per call, including the first.
pub const MAX_ATTEMPTS: u32 = 3;

/// Fixed pause between attempts.
pub const RETRY_DELAY: Duration = Duration::from_secs(2);

/// How a failed attempt failed, as far as retrying is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFailure {
    Timeout,
    Other,
}

impl TransportFailure {
    pub fn classify(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportFailure::Timeout
        } else {
            TransportFailure::Other
        }
    }
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { delay: Duration },
    GiveUp,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            delay: RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Decide whether attempt number `attempt` (1-indexed) should be followed
    /// by another one.
    pub fn decide(&self, attempt: u32, failure: TransportFailure) -> RetryDecision {
        match failure {
            TransportFailure::Timeout if attempt < self.max_attempts => {
                RetryDecision::Retry { delay: self.delay }
            }
            _ => RetryDecision::GiveUp,
        }
    }
}
