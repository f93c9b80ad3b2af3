//! Bounded retry with linear backoff and a per-attempt deadline.
//!
//! The executor never inspects the error: every failure, including an
//! expired attempt deadline, consumes one attempt. The last failure is the
//! one propagated.
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{sleep, timeout};
use tracing::warn;

/// Retry budget for a single unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub attempts: usize,
    /// Delay after the first failed attempt; later delays grow linearly.
    pub base_backoff: Duration,
    /// Wall-clock limit applied to every attempt.
    pub attempt_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 2,
            base_backoff: Duration::from_millis(500),
            attempt_timeout: Some(Duration::from_millis(30_000)),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub const fn new(
        attempts: usize,
        base_backoff: Duration,
        attempt_timeout: Option<Duration>,
    ) -> Self {
        Self {
            attempts,
            base_backoff,
            attempt_timeout,
        }
    }

    /// Delay inserted between attempt `attempt` and `attempt + 1` (0-indexed).
    #[must_use]
    pub fn backoff_after(&self, attempt: usize) -> Duration {
        let factor = u32::try_from(attempt.saturating_add(1)).unwrap_or(u32::MAX);
        self.base_backoff.saturating_mul(factor)
    }

    /// Longest time one call under this policy can take: every attempt
    /// running into its deadline plus every backoff. `None` without a
    /// per-attempt deadline.
    #[must_use]
    pub fn worst_case_duration(&self) -> Option<Duration> {
        let limit = self.attempt_timeout?;
        let attempts = self.max_attempts();
        let deadlines = limit.saturating_mul(u32::try_from(attempts).unwrap_or(u32::MAX));
        let backoffs = (0..attempts - 1)
            .map(|attempt| self.backoff_after(attempt))
            .fold(Duration::ZERO, Duration::saturating_add);
        Some(deadlines.saturating_add(backoffs))
    }

    fn max_attempts(&self) -> usize {
        self.attempts.max(1)
    }
}

/// Failure of a single attempt.
#[derive(Debug, Error)]
pub enum AttemptError<E> {
    #[error("attempt timed out after {}ms", .0.as_millis())]
    TimedOut(Duration),
    #[error("{0}")]
    Failed(E),
}

/// Runs `operation` under `policy`, returning the first success or the last
/// failure.
///
/// `operation` receives the 0-indexed attempt number.
///
/// # Errors
/// Returns the final attempt's error once the attempt budget is exhausted.
pub async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy, operation: F) -> Result<T, AttemptError<E>>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    with_retry_observed(policy, operation, |_, _| {}).await
}

/// Same as [`with_retry`], calling `on_retry` before every backoff sleep.
///
/// # Errors
/// Returns the final attempt's error once the attempt budget is exhausted.
pub async fn with_retry_observed<T, E, F, Fut, O>(
    policy: &RetryPolicy,
    mut operation: F,
    mut on_retry: O,
) -> Result<T, AttemptError<E>>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    O: FnMut(usize, &AttemptError<E>),
{
    let max_attempts = policy.max_attempts();
    let mut attempt = 0;

    loop {
        let outcome = match policy.attempt_timeout {
            Some(limit) => match timeout(limit, operation(attempt)).await {
                Ok(result) => result.map_err(AttemptError::Failed),
                Err(_) => Err(AttemptError::TimedOut(limit)),
            },
            None => operation(attempt).await.map_err(AttemptError::Failed),
        };

        let error = match outcome {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        if attempt + 1 >= max_attempts {
            return Err(error);
        }

        let delay = policy.backoff_after(attempt);
        warn!(
            attempt = attempt + 1,
            max_attempts,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %error,
            "attempt failed, backing off"
        );
        on_retry(attempt, &error);
        sleep(delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    fn policy(attempts: usize, timeout_ms: Option<u64>) -> RetryPolicy {
        RetryPolicy::new(
            attempts,
            Duration::from_millis(500),
            timeout_ms.map(Duration::from_millis),
        )
    }

    #[test]
    fn backoff_grows_linearly() {
        let policy = policy(4, None);
        assert_eq!(policy.backoff_after(0), Duration::from_millis(500));
        assert_eq!(policy.backoff_after(1), Duration::from_millis(1000));
        assert_eq!(policy.backoff_after(2), Duration::from_millis(1500));
    }

    #[test]
    fn worst_case_covers_deadlines_and_backoffs() {
        assert_eq!(
            RetryPolicy::default().worst_case_duration(),
            Some(Duration::from_millis(60_500))
        );
        assert_eq!(
            policy(3, Some(1_000)).worst_case_duration(),
            Some(Duration::from_millis(3_000 + 500 + 1_000))
        );
        assert_eq!(policy(3, None).worst_case_duration(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn fail_once_then_succeed_sleeps_once() {
        let mut calls = 0;
        let mut retries = 0;
        let started = Instant::now();

        let result = with_retry_observed(
            &policy(2, None),
            |attempt| {
                calls += 1;
                async move {
                    if attempt == 0 {
                        Err("transient")
                    } else {
                        Ok(42)
                    }
                }
            },
            |_, _| retries += 1,
        )
        .await;

        assert_eq!(result.expect("second attempt succeeds"), 42);
        assert_eq!(calls, 2);
        assert_eq!(retries, 1);
        assert_eq!(started.elapsed(), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_attempts_propagate_last_error() {
        let started = Instant::now();

        let result: Result<(), _> = with_retry(&policy(3, None), |attempt| async move {
            Err(format!("failure #{attempt}"))
        })
        .await;

        let error = result.expect_err("all attempts fail");
        assert_eq!(error.to_string(), "failure #2");
        assert_eq!(started.elapsed(), Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_attempt_counts_as_failure() {
        let mut calls = 0;

        let result = with_retry(&policy(2, Some(1_000)), |attempt| {
            calls += 1;
            async move {
                if attempt == 0 {
                    sleep(Duration::from_secs(60)).await;
                }
                Ok::<_, String>("done")
            }
        })
        .await;

        assert_eq!(result.expect("retry after timeout succeeds"), "done");
        assert_eq!(calls, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn timeouts_on_every_attempt_surface_as_timed_out() {
        let result: Result<(), AttemptError<String>> =
            with_retry(&policy(2, Some(1_000)), |_| std::future::pending()).await;

        assert!(matches!(result, Err(AttemptError::TimedOut(limit)) if limit == Duration::from_secs(1)));
    }

    #[tokio::test]
    async fn zero_attempts_still_runs_once() {
        let mut calls = 0;
        let result: Result<(), _> = with_retry(&policy(0, None), |_| {
            calls += 1;
            async { Err("nope") }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls, 1);
    }
}
