//! Generic run-retry-give-up primitive for operations that can hit the
//! managed database while it is resuming from suspension.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{DbError, ErrorClass};

/// Bounded exponential backoff. The first attempt never waits; the delay
/// slept before retry attempt `k` (k >= 2) is `min(base * 2^(k-2), max)`.
/// No jitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// `max_attempts` is clamped to at least one.
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// Delay slept before retry attempt `attempt` (>= 2).
    pub fn delay_before(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(2).min(31);
        self.base_delay
            .saturating_mul(1u32 << exp)
            .min(self.max_delay)
    }
}

/// Terminal outcome of a retry loop that did not succeed.
#[derive(Debug)]
pub enum RetryError<E> {
    /// Classified fatal on some attempt; surfaced unchanged, never retried.
    Fatal(E),
    /// Still transient after the final attempt.
    Exhausted { attempts: u32, last: E },
}

impl RetryError<DbError> {
    pub fn into_db_error(self) -> DbError {
        match self {
            RetryError::Fatal(e) => e,
            RetryError::Exhausted { attempts, last } => DbError::RetriesExhausted {
                attempts,
                last: Box::new(last),
            },
        }
    }
}

/// Invoke `operation` until it succeeds, classifying each failure through
/// `classify`. Transient failures sleep the policy's backoff delay and retry
/// while attempts remain; fatal failures return immediately. One tracing
/// event is emitted per failed attempt (attempt number, total attempts,
/// delay chosen) -- diagnostic only.
pub async fn run_with_retry<T, E, F, Fut, C>(
    policy: &RetryPolicy,
    mut operation: F,
    classify: C,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> ErrorClass,
    E: std::fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        debug!("db_retry=attempt attempt={} max_attempts={}", attempt, max_attempts);

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    info!("db_retry=recovered attempts={} max_attempts={}", attempt, max_attempts);
                }
                return Ok(value);
            }
            Err(e) => match classify(&e) {
                ErrorClass::Fatal => return Err(RetryError::Fatal(e)),
                ErrorClass::Transient => {
                    if attempt >= max_attempts {
                        warn!("db_retry=exhausted attempts={} err={}", max_attempts, e);
                        return Err(RetryError::Exhausted {
                            attempts: max_attempts,
                            last: e,
                        });
                    }
                    let delay = policy.delay_before(attempt + 1);
                    warn!(
                        "db_retry=transient attempt={} max_attempts={} delay_ms={} err={}",
                        attempt,
                        max_attempts,
                        delay.as_millis(),
                        e
                    );
                    tokio::time::sleep(delay).await;
                }
            },
        }
    }
}
