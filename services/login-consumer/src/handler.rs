//! Registration handler that logs each event.

use async_trait::async_trait;
use loginapp_core::event::RegistrationEvent;
use loginapp_runtime::{HandlerError, MessageMeta, RegistrationHandler};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Logs every registration with its broker coordinates.
///
/// Logging is idempotent, so redelivered events are simply logged again.
#[derive(Debug, Default)]
pub struct LoggingRegistrationHandler {
    handled: AtomicU64,
}

impl LoggingRegistrationHandler {
    /// New handler.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            handled: AtomicU64::new(0),
        }
    }

    /// Events logged so far.
    #[must_use]
    pub fn handled(&self) -> u64 {
        self.handled.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl RegistrationHandler for LoggingRegistrationHandler {
    async fn handle(&self, event: &RegistrationEvent, meta: &MessageMeta) -> Result<(), HandlerError> {
        info!(
            username = event.username(),
            email = event.email(),
            timestamp = %loginapp_core::timestamp::format(&event.timestamp()),
            topic = %meta.topic,
            partition = meta.partition,
            offset = meta.offset,
            "New user registration event received"
        );
        self.handled.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("loginapp_registrations_logged_total").increment(1);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn counts_handled_events() {
        let handler = LoggingRegistrationHandler::new();
        let event = RegistrationEvent::new("a@x.com", DateTime::from_timestamp(0, 0).expect("epoch"));
        let meta = MessageMeta {
            topic: "Login".to_string(),
            partition: 0,
            offset: 4,
        };

        assert!(handler.handle(&event, &meta).await.is_ok());
        assert!(handler.handle(&event, &meta).await.is_ok());
        assert_eq!(handler.handled(), 2);
    }
}
