// =============================================================================
// retry.rs — TRY, WAIT, TRY AGAIN (TWICE)
// =============================================================================
//
// Fixed attempts, fixed delay, no jitter, no backoff. The comparison site is
// either up or it is not, and the renderer is a single tab we drive serially,
// so a failed attempt simply sleeps the full delay before going again.
//
// Only transient errors (fetch, parse, timeout) are retried. Config and
// storage errors are handed straight back.
// =============================================================================

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::config::Config;
use crate::error::{RateError, RateResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, first try included.
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.retry_attempts, config.retry_delay)
    }

    /// Start tracking attempts for one operation.
    pub fn begin(&self, label: impl Into<String>) -> Attempts {
        Attempts {
            policy: *self,
            label: label.into(),
            attempt: 1,
        }
    }

    /// Run `op` until it succeeds, fails fatally, or runs out of attempts.
    ///
    /// Returns the value together with the number of retries it took.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> (RateResult<T>, u32)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = RateResult<T>>,
    {
        let mut attempts = self.begin(label);
        loop {
            match op().await {
                Ok(value) => return (Ok(value), attempts.retries()),
                Err(err) => {
                    if let Err(err) = attempts.absorb(err).await {
                        return (Err(err), attempts.retries());
                    }
                }
            }
        }
    }
}

/// Attempt bookkeeping for callers that cannot hand their work to a closure
/// (for example because each attempt needs `&mut` access to a browser tab).
#[derive(Debug)]
pub struct Attempts {
    policy: RetryPolicy,
    label: String,
    attempt: u32,
}

impl Attempts {
    /// Take a failure. Either sleeps and returns `Ok(())` so the caller can go
    /// again, or gives the error back when it is fatal or attempts are spent.
    pub async fn absorb(&mut self, err: RateError) -> RateResult<()> {
        if !err.is_retryable() || self.attempt >= self.policy.max_attempts {
            return Err(err);
        }

        warn!(
            operation = %self.label,
            attempt = self.attempt,
            max_attempts = self.policy.max_attempts,
            delay_secs = self.policy.delay.as_secs(),
            error = %err,
            "Attempt {}/{} failed, retrying",
            self.attempt,
            self.policy.max_attempts
        );

        if !self.policy.delay.is_zero() {
            tokio::time::sleep(self.policy.delay).await;
        }
        self.attempt += 1;
        Ok(())
    }

    /// Current attempt number, starting at 1.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn retries(&self) -> u32 {
        self.attempt - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::time::Instant;

    fn instant_policy(attempts: u32) -> RetryPolicy {
        RetryPolicy::new(attempts, Duration::ZERO)
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = Cell::new(0);
        let (result, retries) = instant_policy(3)
            .run("flaky", || {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move {
                    if n < 3 {
                        Err(RateError::Fetch("reset".into()))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(retries, 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = Cell::new(0);
        let (result, retries) = instant_policy(3)
            .run("dead", || {
                calls.set(calls.get() + 1);
                async { Err::<(), _>(RateError::Timeout { locator: "//dd".into(), seconds: 60 }) }
            })
            .await;
        assert!(matches!(result, Err(RateError::Timeout { .. })));
        assert_eq!(calls.get(), 3);
        assert_eq!(retries, 2);
    }

    #[tokio::test]
    async fn test_fatal_errors_are_not_retried() {
        let calls = Cell::new(0);
        let (result, _) = instant_policy(3)
            .run("fatal", || {
                calls.set(calls.get() + 1);
                async { Err::<(), _>(RateError::Storage("disk full".into())) }
            })
            .await;
        assert!(matches!(result, Err(RateError::Storage(_))));
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn test_waits_the_fixed_delay_between_attempts() {
        let policy = RetryPolicy::new(2, Duration::from_millis(30));
        let started = Instant::now();
        let (result, _) = policy
            .run("slow", || async { Err::<(), _>(RateError::parse("nope")) })
            .await;
        assert!(result.is_err());
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_at_least_one_attempt() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
        assert_eq!(RetryPolicy::default().max_attempts, 3);
    }
}
