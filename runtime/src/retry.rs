//! Retry logic with exponential backoff for handling transport failures.
//!
//! The policy is a value that travels with a request: every retry carries the
//! *decremented* policy, and the lockout grows with the attempt number using
//! the expected-backoff formula `delay * (2^attempt - 1)`.
//!
//! # Example
//!
//! ```rust
//! use paykit_runtime::retry::{RetryPolicy, retry_with_policy};
//! use std::time::Duration;
//!
//! # async fn example() {
//! let policy = RetryPolicy::exponential_with(Duration::from_millis(10), 3);
//!
//! let value = retry_with_policy(
//!     Some(policy),
//!     || async { 42 },
//!     |value: &i32| *value != 42,
//! ).await;
//!
//! assert_eq!(value, 42);
//! # }
//! ```

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Retry policy carried by a request.
///
/// # Default Values
///
/// - base delay: 2 seconds
/// - attempt: 0 (the first request)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Exponential backoff: lockout is `delay * (2^attempt - 1)`
    Exponential {
        /// Base delay the lockout is scaled from
        delay: Duration,
        /// Zero-based number of the attempt this policy belongs to
        attempt: u32,
        /// Total number of attempts allowed, including the first request
        max_attempts: u32,
    },
}

impl RetryPolicy {
    /// Base delay used by [`RetryPolicy::exponential`].
    pub const DEFAULT_DELAY: Duration = Duration::from_secs(2);

    /// Exponential policy with the default base delay.
    #[must_use]
    pub const fn exponential(max_attempts: u32) -> Self {
        Self::exponential_with(Self::DEFAULT_DELAY, max_attempts)
    }

    /// Exponential policy with an explicit base delay.
    #[must_use]
    pub const fn exponential_with(delay: Duration, max_attempts: u32) -> Self {
        Self::Exponential {
            delay,
            attempt: 0,
            max_attempts,
        }
    }

    /// Zero-based attempt number.
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        match self {
            Self::Exponential { attempt, .. } => *attempt,
        }
    }

    /// The delay before the request carrying this policy may be retried.
    ///
    /// Based on <https://en.wikipedia.org/wiki/Exponential_backoff#Expected_backoff>.
    /// Saturates instead of overflowing for very large attempt numbers.
    #[must_use]
    pub fn lockout(&self) -> Duration {
        match self {
            Self::Exponential { delay, attempt, .. } => {
                let factor = 2_u32.checked_pow(*attempt).map_or(u32::MAX, |power| power - 1);
                delay.saturating_mul(factor)
            },
        }
    }

    /// The policy for the next attempt, or `None` when no attempts remain.
    #[must_use]
    pub const fn decrement(self) -> Option<Self> {
        match self {
            Self::Exponential {
                delay,
                attempt,
                max_attempts,
            } => {
                let next = attempt + 1;
                if next < max_attempts {
                    Some(Self::Exponential {
                        delay,
                        attempt: next,
                        max_attempts,
                    })
                } else {
                    None
                }
            },
        }
    }
}

/// Run `operation` until `should_retry` rejects its output or the policy is exhausted.
///
/// After a rejected attempt the task sleeps for the current policy's
/// [`lockout`](RetryPolicy::lockout) and continues with the decremented policy,
/// so the first retry is immediate. With `None` the operation runs exactly once.
///
/// Unlike `Result`-based retry helpers this returns the last output as-is: the
/// REST executor hands even a failed exchange to its caller for classification.
pub async fn retry_with_policy<F, Fut, T, P>(
    policy: Option<RetryPolicy>,
    mut operation: F,
    should_retry: P,
) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = T>,
    P: Fn(&T) -> bool,
{
    let mut policy = policy;

    loop {
        let output = operation().await;
        if !should_retry(&output) {
            return output;
        }

        let Some(current) = policy else {
            return output;
        };
        let Some(next) = current.decrement() else {
            tracing::error!(
                attempt = current.attempt(),
                "Operation failed after max retries"
            );
            return output;
        };

        let lockout = current.lockout();
        tracing::warn!(
            attempt = current.attempt(),
            delay_ms = lockout.as_millis(),
            "Operation failed, retrying..."
        );
        metrics::counter!("paykit.retry.attempt").increment(1);

        sleep(lockout).await;
        policy = Some(next);
    }
}
