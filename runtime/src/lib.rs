//! # Login App Runtime
//!
//! The resilient bootstrap and event-propagation machinery shared by the services.
//!
//! ## Core Components
//!
//! - **[`retry`]**: bounded retry with a fixed delay
//! - **[`publisher`]**: lazily connected, best-effort registration publisher with a
//!   fire-and-forget dispatcher
//! - **[`subscriber`]**: subscribe-with-retry and the receive loop
//! - **[`lifecycle`]**: signal handling and coordinated shutdown
//! - **[`readiness`]**: boot-time gate that degrades instead of failing
//! - **[`config`]**: environment configuration shared by the services
//!
//! ## Example
//!
//! ```ignore
//! use loginapp_runtime::{EventSubscriber, ShutdownCoordinator, run_until_shutdown};
//!
//! let subscriber = Arc::new(EventSubscriber::new(transport, handler));
//! let mut coordinator = ShutdownCoordinator::new(Duration::from_secs(10));
//! coordinator.register(subscriber.clone());
//!
//! let shutdown_rx = coordinator.subscribe();
//! let work = async move { subscriber.start(shutdown_rx).await };
//! let status = run_until_shutdown(&coordinator, work).await;
//! ```

pub mod config;
pub mod lifecycle;
pub mod publisher;
pub mod readiness;
pub mod retry;
pub mod subscriber;

pub use lifecycle::{
    ExitStatus, ShutdownCoordinator, ShutdownHandler, ShutdownTrigger, install_panic_hook,
    run_until_shutdown, run_until_shutdown_with, wait_for_signal,
};
pub use publisher::{ConnectionState, EventPublisher, PublishDispatcher};
pub use readiness::{Readiness, ReadinessFlag, ReadinessGate, ReadinessStatus};
pub use retry::{RetryError, RetryPolicy, RetryState, retry_with_fixed_delay, retry_with_observer};
pub use subscriber::{
    EventSubscriber, HandlerError, MessageMeta, RegistrationHandler, SubscriberError,
    SubscriberState,
};
