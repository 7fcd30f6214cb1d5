//! Signal-driven graceful shutdown.
//!
//! Coordinates shutdown across the components a service owns (the event publisher,
//! the event subscriber) with a per-component timeout.
//!
//! ## Architecture
//!
//! - **`ShutdownHandler` trait**: components implement this to release their connection
//! - **`ShutdownCoordinator`**: broadcasts the shutdown signal, then runs every handler once
//! - **`wait_for_signal()`**: waits for SIGINT, SIGTERM or SIGUSR2
//! - **`run_until_shutdown()`**: races the service's main work against the signal
//!
//! ## Usage
//!
//! ```ignore
//! use loginapp_runtime::lifecycle::*;
//! use std::time::Duration;
//!
//! let mut coordinator = ShutdownCoordinator::new(Duration::from_secs(10));
//! coordinator.register(publisher.clone());
//!
//! let shutdown_rx = coordinator.subscribe();
//! let status = run_until_shutdown(&coordinator, serve(shutdown_rx)).await;
//!
//! std::process::ExitCode::from(status)
//! ```

use async_trait::async_trait;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::io;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinError;
use tracing::{error, info, warn};

/// Process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Graceful exit (code 0)
    Success,
    /// Fatal boot failure or unhandled fault (code 1)
    Failure,
}

impl ExitStatus {
    /// Numeric process exit code.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
        }
    }
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        Self::from(status.code())
    }
}

/// What started the shutdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownTrigger {
    /// A termination signal, by name
    Signal(&'static str),
    /// The service's main work finished on its own
    Completed,
    /// An unhandled error or panic
    Fault(String),
}

impl ShutdownTrigger {
    /// Exit status implied by this trigger.
    ///
    /// A fault exits with failure even if every component disconnects cleanly.
    #[must_use]
    pub const fn exit_status(&self) -> ExitStatus {
        match self {
            Self::Signal(_) | Self::Completed => ExitStatus::Success,
            Self::Fault(_) => ExitStatus::Failure,
        }
    }
}

impl fmt::Display for ShutdownTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signal(name) => write!(f, "signal {name}"),
            Self::Completed => write!(f, "work completed"),
            Self::Fault(reason) => write!(f, "fault: {reason}"),
        }
    }
}

/// Trait for components that need graceful shutdown
///
/// Implemented by the event publisher and the event subscriber so their broker
/// connections are closed before the process exits.
#[async_trait]
pub trait ShutdownHandler: Send + Sync {
    /// Component name for logging
    fn name(&self) -> &str;

    /// Gracefully shut down this component
    ///
    /// # Errors
    ///
    /// Returns a description of the failure if the component could not release
    /// its resources cleanly.
    async fn shutdown(&self) -> Result<(), String>;
}

/// Coordinates shutdown across multiple components
///
/// - Broadcast signal (notify every task holding a receiver)
/// - Parallel shutdown of registered handlers, each bounded by the timeout
/// - Runs at most once per process
pub struct ShutdownCoordinator {
    handlers: Vec<Arc<dyn ShutdownHandler>>,
    shutdown_tx: broadcast::Sender<()>,
    timeout_duration: Duration,
    started: AtomicBool,
}

impl ShutdownCoordinator {
    /// Create new shutdown coordinator
    ///
    /// # Arguments
    ///
    /// * `timeout` - Maximum time to wait for each component to shut down
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        let (shutdown_tx, _) = broadcast::channel(16);

        Self {
            handlers: Vec::new(),
            shutdown_tx,
            timeout_duration: timeout,
            started: AtomicBool::new(false),
        }
    }

    /// Register a shutdown handler
    ///
    /// Handlers are shut down in parallel, not in registration order.
    pub fn register(&mut self, handler: Arc<dyn ShutdownHandler>) {
        info!(component = handler.name(), "Registered shutdown handler");
        self.handlers.push(handler);
    }

    /// Get a receiver for the shutdown broadcast
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Per-component timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout_duration
    }

    /// Whether shutdown has been initiated.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Get number of registered handlers
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Initiate graceful shutdown
    ///
    /// 1. Send broadcast signal to all subscribers
    /// 2. Shut down all handlers in parallel, each with the timeout
    /// 3. Log any failure
    ///
    /// Only the first call does any work; later calls return the exit status of
    /// their own trigger.
    pub async fn shutdown(&self, trigger: ShutdownTrigger) -> ExitStatus {
        let status = trigger.exit_status();

        if self.started.swap(true, Ordering::SeqCst) {
            info!(trigger = %trigger, "Shutdown already in progress, ignoring trigger");
            return status;
        }

        info!(
            trigger = %trigger,
            components = self.handlers.len(),
            timeout = ?self.timeout_duration,
            "Initiating graceful shutdown"
        );

        if self.shutdown_tx.send(()).is_err() {
            warn!("No active shutdown signal receivers");
        }

        let shutdown_futures = self.handlers.iter().map(|handler| async move {
            let name = handler.name();
            info!(component = name, "Shutting down component");

            match tokio::time::timeout(self.timeout_duration, handler.shutdown()).await {
                Ok(Ok(())) => {
                    info!(component = name, "Component shut down successfully");
                    true
                }
                Ok(Err(e)) => {
                    error!(component = name, error = %e, "Component shutdown failed");
                    false
                }
                Err(_) => {
                    error!(component = name, timeout = ?self.timeout_duration, "Component shutdown timed out");
                    false
                }
            }
        });

        let failures = futures::future::join_all(shutdown_futures)
            .await
            .into_iter()
            .filter(|ok| !ok)
            .count();

        if failures == 0 {
            info!(exit_code = status.code(), "All components shut down successfully");
        } else {
            warn!(failures, exit_code = status.code(), "Shutdown completed with errors");
        }

        status
    }
}

/// Wait for a termination signal and return its name.
///
/// Listens for SIGINT, SIGTERM and SIGUSR2 on unix, Ctrl+C elsewhere.
///
/// # Errors
///
/// Returns the I/O error if a signal handler cannot be installed.
pub async fn wait_for_signal() -> Result<&'static str, io::Error> {
    let name = os_signal().await?;
    info!(signal = name, "Received shutdown signal");
    Ok(name)
}

#[cfg(unix)]
async fn os_signal() -> Result<&'static str, io::Error> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigusr2 = signal(SignalKind::user_defined2())?;

    let name = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
        _ = sigusr2.recv() => "SIGUSR2",
    };
    Ok(name)
}

#[cfg(not(unix))]
async fn os_signal() -> Result<&'static str, io::Error> {
    tokio::signal::ctrl_c().await?;
    Ok("ctrl-c")
}

/// Run `work` until it finishes or a termination signal arrives, then shut down.
///
/// See [`run_until_shutdown_with`].
pub async fn run_until_shutdown<W, E>(coordinator: &ShutdownCoordinator, work: W) -> ExitStatus
where
    W: Future<Output = Result<(), E>> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    run_until_shutdown_with(coordinator, work, wait_for_signal()).await
}

/// Run `work` until it finishes or `signal` resolves, then shut down.
///
/// - work `Ok` → [`ShutdownTrigger::Completed`]
/// - work `Err` or panic → [`ShutdownTrigger::Fault`]
/// - signal → [`ShutdownTrigger::Signal`]; a signal-handler error is a fault
///
/// After the coordinator finishes, waits up to its timeout for the work task and
/// aborts it if it is still running.
pub async fn run_until_shutdown_with<W, E, S>(
    coordinator: &ShutdownCoordinator,
    work: W,
    signal: S,
) -> ExitStatus
where
    W: Future<Output = Result<(), E>> + Send + 'static,
    E: fmt::Display + Send + 'static,
    S: Future<Output = Result<&'static str, io::Error>>,
{
    let mut task = tokio::spawn(work);

    let (trigger, work_done) = tokio::select! {
        joined = &mut task => (trigger_for(joined), true),
        signal = signal => match signal {
            Ok(name) => (ShutdownTrigger::Signal(name), false),
            Err(err) => (ShutdownTrigger::Fault(format!("signal handler failed: {err}")), false),
        },
    };

    let status = coordinator.shutdown(trigger).await;

    if !work_done {
        match tokio::time::timeout(coordinator.timeout(), &mut task).await {
            Ok(joined) => {
                if let ShutdownTrigger::Fault(reason) = trigger_for(joined) {
                    warn!(reason = %reason, "Work failed while shutting down");
                }
            }
            Err(_) => {
                warn!(timeout = ?coordinator.timeout(), "Work did not stop in time, aborting");
                task.abort();
            }
        }
    }

    status
}

fn trigger_for<E: fmt::Display>(joined: Result<Result<(), E>, JoinError>) -> ShutdownTrigger {
    match joined {
        Ok(Ok(())) => ShutdownTrigger::Completed,
        Ok(Err(err)) => {
            error!(error = %err, "Service work failed");
            ShutdownTrigger::Fault(err.to_string())
        }
        Err(join_err) if join_err.is_panic() => {
            let reason = panic_message(join_err.into_panic().as_ref());
            error!(panic = %reason, "Service work panicked");
            ShutdownTrigger::Fault(reason)
        }
        Err(join_err) => ShutdownTrigger::Fault(join_err.to_string()),
    }
}

/// Route panics from any thread through `tracing` before the default hook runs.
pub fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()));
        error!(
            panic = %panic_message(info.payload()),
            location = location.as_deref().unwrap_or("unknown"),
            "Unhandled panic"
        );
        default_hook(info);
    }));
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
