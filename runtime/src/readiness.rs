//! Boot-time readiness gate for dependencies that may come up after the service.
//!
//! A [`ReadinessGate`] retries an initialization step (typically schema creation)
//! with the fixed-delay retrier. Exhausting the budget is not an error: the gate
//! logs a warning, reports [`Readiness::Degraded`] and lets the process keep serving.
//! The outcome is mirrored into a [`ReadinessFlag`] that health endpoints read.

use crate::retry::{RetryPolicy, retry_with_observer};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Outcome of a readiness gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// The step succeeded
    Ready {
        /// Attempts it took
        attempts: u32,
    },
    /// Every attempt failed; the service continues without the guarantee
    Degraded {
        /// Attempts made
        attempts: u32,
    },
}

impl Readiness {
    /// Whether the step succeeded.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }
}

/// Readiness as reported by health checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessStatus {
    /// Gate still running
    Pending,
    /// Gate succeeded
    Ready,
    /// Gate gave up
    Degraded,
}

impl ReadinessStatus {
    /// Lowercase name used in health responses.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Ready => "ready",
            Self::Degraded => "degraded",
        }
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Ready,
            2 => Self::Degraded,
            _ => Self::Pending,
        }
    }

    const fn to_u8(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Ready => 1,
            Self::Degraded => 2,
        }
    }
}

impl fmt::Display for ReadinessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Readiness> for ReadinessStatus {
    fn from(readiness: Readiness) -> Self {
        match readiness {
            Readiness::Ready { .. } => Self::Ready,
            Readiness::Degraded { .. } => Self::Degraded,
        }
    }
}

/// Shared, cheaply cloneable readiness status.
#[derive(Debug, Clone, Default)]
pub struct ReadinessFlag(Arc<AtomicU8>);

impl ReadinessFlag {
    /// New flag in the `Pending` state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> ReadinessStatus {
        ReadinessStatus::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Record `status`.
    pub fn set(&self, status: ReadinessStatus) {
        self.0.store(status.to_u8(), Ordering::Release);
    }
}

/// Retries a startup step, degrading instead of failing.
#[derive(Debug, Clone)]
pub struct ReadinessGate {
    name: String,
    policy: RetryPolicy,
    flag: ReadinessFlag,
}

impl ReadinessGate {
    /// Gate called `name` using `policy`.
    #[must_use]
    pub fn new(name: impl Into<String>, policy: RetryPolicy) -> Self {
        Self {
            name: name.into(),
            policy,
            flag: ReadinessFlag::new(),
        }
    }

    /// Report into `flag` instead of a private one.
    #[must_use]
    pub fn with_flag(mut self, flag: ReadinessFlag) -> Self {
        self.flag = flag;
        self
    }

    /// Flag updated when the gate finishes.
    #[must_use]
    pub fn flag(&self) -> ReadinessFlag {
        self.flag.clone()
    }

    /// Run `operation` until it succeeds or the budget is spent.
    pub async fn run<F, Fut, T, E>(&self, operation: F) -> Readiness
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let mut failures = 0_u32;
        let result = retry_with_observer(&self.name, &self.policy, operation, |_, _: &E| {
            failures += 1;
        })
        .await;

        let readiness = match result {
            Ok(_) => {
                let attempts = failures + 1;
                info!(gate = %self.name, attempts, "Dependency ready");
                Readiness::Ready { attempts }
            }
            Err(exhausted) => {
                warn!(
                    gate = %self.name,
                    attempts = exhausted.attempts,
                    error = %exhausted.last_error,
                    "Dependency not ready after retries, continuing without guaranteed initialization"
                );
                Readiness::Degraded {
                    attempts: exhausted.attempts,
                }
            }
        };

        self.flag.set(readiness.into());
        readiness
    }

    /// Run the gate on a background task.
    pub fn spawn<F, Fut, T, E>(self, operation: F) -> JoinHandle<Readiness>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        tokio::spawn(async move { self.run(operation).await })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn ready_on_third_attempt() {
        let gate = ReadinessGate::new("schema", RetryPolicy::fixed(5, Duration::from_secs(2)));
        let flag = gate.flag();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let readiness = gate
            .run(|| {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                async move { if n < 3 { Err("connection refused") } else { Ok(()) } }
            })
            .await;

        assert_eq!(readiness, Readiness::Ready { attempts: 3 });
        assert_eq!(flag.status(), ReadinessStatus::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn degrades_instead_of_failing() {
        let gate = ReadinessGate::new("schema", RetryPolicy::fixed(30, Duration::from_secs(2)));
        let flag = gate.flag();
        assert_eq!(flag.status(), ReadinessStatus::Pending);
        let start = Instant::now();

        let readiness = gate.run(|| async { Err::<(), _>("connection refused") }).await;

        assert_eq!(readiness, Readiness::Degraded { attempts: 30 });
        assert!(!readiness.is_ready());
        assert_eq!(flag.status(), ReadinessStatus::Degraded);
        assert_eq!(start.elapsed(), Duration::from_secs(58));
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_gate_reports_through_shared_flag() {
        let flag = ReadinessFlag::new();
        let gate = ReadinessGate::new("schema", RetryPolicy::fixed(2, Duration::from_millis(10)))
            .with_flag(flag.clone());

        let handle = gate.spawn(|| async { Ok::<_, String>(()) });

        assert_eq!(handle.await.unwrap(), Readiness::Ready { attempts: 1 });
        assert_eq!(flag.status().as_str(), "ready");
    }
}
