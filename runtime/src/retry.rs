//! Bounded retry with a fixed delay for dependencies that become ready on their own.
//!
//! Both boot-time loops in the system use this primitive: waiting for the database
//! to accept the schema, and waiting for the broker topic to exist. Neither needs
//! exponential growth or jitter, because the dependency is polled by a single
//! process and becomes ready independently of it.
//!
//! With `max_attempts = N` and delay `D`, the operation runs at most `N` times with
//! exactly `D` between consecutive attempts, so exhaustion takes `N - 1` delays.
//!
//! # Example
//!
//! ```rust
//! use loginapp_runtime::retry::{RetryPolicy, retry_with_fixed_delay};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let policy = RetryPolicy::fixed(30, Duration::from_secs(2));
//!
//! let value = retry_with_fixed_delay("database init", &policy, || async {
//!     // Your fallible, repeatable operation here
//!     Ok::<_, String>(42)
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

/// Default attempt ceiling for boot-time readiness loops.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 30;

/// Default delay between boot-time readiness attempts.
pub const DEFAULT_DELAY: Duration = Duration::from_secs(2);

/// Retry policy configuration: a fixed ceiling and a constant delay.
///
/// # Default Values
///
/// - `max_attempts`: 30
/// - `delay`: 2 seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(DEFAULT_MAX_ATTEMPTS, DEFAULT_DELAY)
    }
}

impl RetryPolicy {
    /// Policy with `max_attempts` attempts and a constant `delay`.
    ///
    /// A ceiling of zero is clamped to one attempt.
    #[must_use]
    pub const fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: if max_attempts == 0 { 1 } else { max_attempts },
            delay,
        }
    }

    /// Create a new policy builder.
    #[must_use]
    pub const fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder {
            max_attempts: None,
            delay: None,
        }
    }

    /// Maximum number of attempts (always at least one).
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay between consecutive attempts.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }
}

/// Builder for [`RetryPolicy`].
#[derive(Debug, Clone, Default)]
pub struct RetryPolicyBuilder {
    max_attempts: Option<u32>,
    delay: Option<Duration>,
}

impl RetryPolicyBuilder {
    /// Set maximum number of attempts.
    #[must_use]
    pub const fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Set the delay between attempts.
    #[must_use]
    pub const fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Build the [`RetryPolicy`].
    #[must_use]
    pub fn build(self) -> RetryPolicy {
        RetryPolicy::fixed(
            self.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
            self.delay.unwrap_or(DEFAULT_DELAY),
        )
    }
}

/// Progress of one retry loop, handed to observers after each failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    /// 1-based index of the attempt that just failed
    pub attempt: u32,
    /// Attempt ceiling
    pub max_attempts: u32,
    /// Delay before the next attempt
    pub delay: Duration,
}

impl RetryState {
    /// Whether the failed attempt was the last one allowed.
    #[must_use]
    pub const fn is_final(&self) -> bool {
        self.attempt >= self.max_attempts
    }
}

/// Terminal outcome of a retry loop that never succeeded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("gave up after {attempts} attempts: {last_error}")]
pub struct RetryError<E: fmt::Display> {
    /// Number of attempts made
    pub attempts: u32,
    /// Error returned by the final attempt
    pub last_error: E,
}

impl<E: fmt::Display> RetryError<E> {
    /// Consume the error, returning the final attempt's error.
    pub fn into_inner(self) -> E {
        self.last_error
    }
}

/// Retry an async operation with a fixed delay.
///
/// Each failed attempt is logged as a warning with the `attempt` and
/// `max_attempts` fields so operators can see a dependency is still unreachable.
///
/// # Arguments
///
/// * `label` - Operation name used in log lines
/// * `policy` - Attempt ceiling and delay
/// * `operation` - Async operation to retry; it must be safe to repeat
///
/// # Errors
///
/// Returns [`RetryError`] carrying the last error once every attempt has failed.
pub async fn retry_with_fixed_delay<F, Fut, T, E>(
    label: &str,
    policy: &RetryPolicy,
    operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    retry_with_observer(label, policy, operation, |_: &RetryState, _: &E| {}).await
}

/// Retry an async operation with a fixed delay, reporting every failure.
///
/// `observer` runs after each failed attempt, before the delay.
///
/// # Errors
///
/// Returns [`RetryError`] carrying the last error once every attempt has failed.
///
/// # Example
///
/// ```rust
/// use loginapp_runtime::retry::{RetryPolicy, RetryState, retry_with_observer};
/// use std::time::Duration;
///
/// # async fn example() {
/// let policy = RetryPolicy::fixed(3, Duration::from_millis(10));
/// let mut seen = Vec::new();
///
/// let result = retry_with_observer(
///     "probe",
///     &policy,
///     || async { Err::<(), _>("not yet") },
///     |state: &RetryState, _err: &&str| seen.push(state.attempt),
/// )
/// .await;
///
/// assert!(result.is_err());
/// assert_eq!(seen, vec![1, 2, 3]);
/// # }
/// ```
pub async fn retry_with_observer<F, Fut, T, E, O>(
    label: &str,
    policy: &RetryPolicy,
    mut operation: F,
    mut observer: O,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
    O: FnMut(&RetryState, &E),
{
    let max_attempts = policy.max_attempts();
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(operation = label, attempt, max_attempts, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(err) => {
                let state = RetryState {
                    attempt,
                    max_attempts,
                    delay: policy.delay(),
                };
                tracing::warn!(
                    operation = label,
                    attempt,
                    max_attempts,
                    error = %err,
                    "Attempt failed ({attempt}/{max_attempts})"
                );
                observer(&state, &err);

                if state.is_final() {
                    tracing::error!(operation = label, attempts = attempt, error = %err, "Retry budget exhausted");
                    return Err(RetryError {
                        attempts: attempt,
                        last_error: err,
                    });
                }

                sleep(policy.delay()).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn counting_failure(counter: &Arc<AtomicU32>) -> impl FnMut() -> std::future::Ready<Result<(), String>> + use<> {
        let counter = Arc::clone(counter);
        move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            std::future::ready(Err(format!("attempt {n} failed")))
        }
    }

    #[test]
    fn zero_attempts_clamped_to_one() {
        assert_eq!(RetryPolicy::fixed(0, Duration::ZERO).max_attempts(), 1);
        assert_eq!(RetryPolicy::builder().max_attempts(0).build().max_attempts(), 1);
    }

    #[test]
    fn builder_defaults() {
        let policy = RetryPolicy::builder().build();
        assert_eq!(policy, RetryPolicy::default());
        assert_eq!(policy.max_attempts(), 30);
        assert_eq!(policy.delay(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_first_try_without_delay() {
        let policy = RetryPolicy::fixed(5, Duration::from_secs(2));
        let start = Instant::now();

        let result = retry_with_fixed_delay("probe", &policy, || async { Ok::<_, String>(42) }).await;

        assert_eq!(result, Ok(42));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_failures() {
        let policy = RetryPolicy::fixed(5, Duration::from_secs(2));
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);
        let start = Instant::now();

        let result = retry_with_fixed_delay("probe", &policy, || {
            let c = Arc::clone(&counter_clone);
            async move {
                let attempt = c.fetch_add(1, Ordering::SeqCst) + 1;
                if attempt < 3 { Err(format!("attempt {attempt}")) } else { Ok(attempt) }
            }
        })
        .await;

        assert_eq!(result, Ok(3));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn single_attempt_policy_never_sleeps() {
        let policy = RetryPolicy::fixed(1, Duration::from_secs(2));
        let counter = Arc::new(AtomicU32::new(0));
        let start = Instant::now();

        let result = retry_with_fixed_delay("probe", &policy, counting_failure(&counter)).await;

        let err = result.unwrap_err();
        assert_eq!(err.attempts, 1);
        assert_eq!(err.last_error, "attempt 1 failed");
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn observer_sees_every_failed_attempt() {
        let policy = RetryPolicy::fixed(3, Duration::from_millis(500));
        let counter = Arc::new(AtomicU32::new(0));
        let mut seen = Vec::new();

        let result = retry_with_observer("probe", &policy, counting_failure(&counter), |state, _| {
            seen.push((state.attempt, state.max_attempts, state.is_final()));
        })
        .await;

        assert!(result.is_err());
        assert_eq!(seen, vec![(1, 3, false), (2, 3, false), (3, 3, true)]);
    }

    proptest::proptest! {
        #[test]
        fn exhaustion_takes_n_attempts_and_n_minus_one_delays(max_attempts in 1u32..25, delay_ms in 1u64..5_000) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .start_paused(true)
                .build()
                .unwrap();

            let (attempts, elapsed, reported) = runtime.block_on(async {
                let policy = RetryPolicy::fixed(max_attempts, Duration::from_millis(delay_ms));
                let counter = Arc::new(AtomicU32::new(0));
                let start = Instant::now();
                let err = retry_with_fixed_delay("probe", &policy, counting_failure(&counter))
                    .await
                    .unwrap_err();
                (counter.load(Ordering::SeqCst), start.elapsed(), err.attempts)
            });

            proptest::prop_assert_eq!(attempts, max_attempts);
            proptest::prop_assert_eq!(reported, max_attempts);
            proptest::prop_assert_eq!(elapsed, Duration::from_millis(delay_ms) * (max_attempts - 1));
        }
    }
}
