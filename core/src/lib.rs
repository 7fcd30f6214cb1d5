//! # Login App Core
//!
//! Core traits and types shared by every login app service.
//!
//! This crate provides the abstractions the services are wired from:
//!
//! - **Registration events**: the immutable fact published after a user registers
//! - **Transports**: producer/consumer traits implemented by Kafka and in-memory brokers
//! - **Stores**: credential and catalog repositories
//! - **Environment**: injected dependencies such as the clock
//!
//! ## Architecture Principles
//!
//! - The credential write is the source of truth; the event is a best-effort echo
//! - Dependencies are injected via traits so tests run without a broker or database
//! - Every trait is dyn compatible and shared behind `Arc`
//!
//! ## Example
//!
//! ```
//! use loginapp_core::environment::{Clock, SystemClock};
//! use loginapp_core::event::RegistrationEvent;
//!
//! let clock = SystemClock;
//! let event = RegistrationEvent::new("alice@example.com", clock.now());
//! assert_eq!(event.username(), "alice");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

// Re-export commonly used types
pub use chrono::{DateTime, Utc};

pub mod catalog;
pub mod event;
pub mod event_bus;
pub mod timestamp;
pub mod users;

/// Environment module - injected dependencies
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```ignore
    /// // Test - fixed time for deterministic tests
    /// struct FixedClock { time: DateTime<Utc> }
    /// impl Clock for FixedClock {
    ///     fn now(&self) -> DateTime<Utc> {
    ///         self.time
    ///     }
    /// }
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
