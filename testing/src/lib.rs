//! # Login App Testing
//!
//! Testing utilities for the login app services.
//!
//! This crate provides:
//! - An in-memory broker implementing both transport traits, with failure injection
//! - In-memory credential and catalog stores
//! - A fixed clock for deterministic timestamps
//! - A tracing initializer for test output
//!
//! ## Example
//!
//! ```ignore
//! use loginapp_testing::{InMemoryBroker, test_clock};
//!
//! #[tokio::test]
//! async fn registration_is_published() {
//!     let broker = InMemoryBroker::new();
//!     let publisher = EventPublisher::new(Arc::new(broker.producer()), Arc::new(test_clock()));
//!
//!     publisher.publish_registration("a@x.com").await;
//!
//!     assert_eq!(broker.keys("Login"), vec!["a@x.com"]);
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use chrono::{DateTime, Utc};
use loginapp_core::environment::Clock;

pub mod broker;
pub mod stores;

/// Mock implementations for testing.
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use loginapp_testing::mocks::FixedClock;
    /// use loginapp_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(DateTime::from_timestamp(1_735_689_600, 0).unwrap_or_default())
    }
}

/// Install a `tracing` subscriber that writes through the test harness.
///
/// Safe to call from every test; only the first call installs the subscriber.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use broker::{InMemoryBroker, InMemoryConsumer, InMemoryProducer};
pub use mocks::{FixedClock, test_clock};
pub use stores::{InMemoryCatalog, InMemoryUserStore};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
        assert_eq!(time1.to_rfc3339(), "2025-01-01T00:00:00+00:00");
    }
}
