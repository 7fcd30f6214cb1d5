//! Best-effort publisher for registration events.
//!
//! The [`EventPublisher`] owns the process's outbound broker connection. The
//! connection is opened lazily by the first publish and the transition happens
//! while holding an async mutex, so concurrent first publishes connect exactly once.
//!
//! Delivery is best effort: a failure to connect, encode or send is logged and
//! counted, never returned. The registration that produced the event has already
//! been committed and must not be failed by the broker.
//!
//! Callers on the request path use a [`PublishDispatcher`], which hands the email to
//! a single background worker through a bounded FIFO queue and returns immediately.
//!
//! # Example
//!
//! ```ignore
//! let publisher = Arc::new(EventPublisher::new(transport, Arc::new(SystemClock)));
//! let (dispatcher, worker) = publisher.spawn_dispatcher(1024, coordinator.subscribe());
//!
//! dispatcher.dispatch("alice@example.com");
//! ```

use crate::lifecycle::ShutdownHandler;
use async_trait::async_trait;
use loginapp_core::environment::Clock;
use loginapp_core::event::{EventError, LOGIN_TOPIC, RegistrationEvent};
use loginapp_core::event_bus::{Delivery, EventBusError, ProducerTransport};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Publisher-side connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection yet, or the last connect failed
    Disconnected,
    /// Connected and able to send
    Connected,
    /// Shut down; publishes are dropped
    Closed,
}

#[derive(Error, Debug)]
enum PublishError {
    #[error("publisher is closed")]
    Closed,

    #[error(transparent)]
    Encode(#[from] EventError),

    #[error(transparent)]
    Transport(#[from] EventBusError),
}

impl PublishError {
    const fn stage(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Encode(_) => "encode",
            Self::Transport(_) => "transport",
        }
    }
}

/// Lazily connected, best-effort publisher of registration events.
pub struct EventPublisher {
    transport: Arc<dyn ProducerTransport>,
    clock: Arc<dyn Clock>,
    topic: String,
    state: Mutex<ConnectionState>,
}

impl EventPublisher {
    /// Publisher sending to the default `Login` topic.
    #[must_use]
    pub fn new(transport: Arc<dyn ProducerTransport>, clock: Arc<dyn Clock>) -> Self {
        Self {
            transport,
            clock,
            topic: LOGIN_TOPIC.to_string(),
            state: Mutex::new(ConnectionState::Disconnected),
        }
    }

    /// Send to `topic` instead of the default.
    #[must_use]
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    /// Topic events are sent to.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Current connection state.
    pub async fn state(&self) -> ConnectionState {
        *self.state.lock().await
    }

    /// Whether the outbound connection is open.
    pub async fn is_connected(&self) -> bool {
        self.state().await == ConnectionState::Connected
    }

    /// Publish a registration for `email`, stamped with the current time.
    pub async fn publish_registration(&self, email: &str) {
        let event = RegistrationEvent::new(email, self.clock.now());
        self.publish(&event).await;
    }

    /// Publish `event`, keyed by its email.
    ///
    /// Never fails: errors are logged and counted in
    /// `loginapp_events_dropped_total`.
    pub async fn publish(&self, event: &RegistrationEvent) {
        match self.try_publish(event).await {
            Ok(delivery) => {
                metrics::counter!("loginapp_events_published_total").increment(1);
                debug!(
                    topic = %self.topic,
                    email = %event.email(),
                    partition = delivery.partition,
                    offset = delivery.offset,
                    "Published registration event"
                );
            }
            Err(err) => {
                metrics::counter!("loginapp_events_dropped_total", "stage" => err.stage()).increment(1);
                warn!(
                    topic = %self.topic,
                    email = %event.email(),
                    error = %err,
                    "Failed to publish registration event, dropping it"
                );
            }
        }
    }

    async fn try_publish(&self, event: &RegistrationEvent) -> Result<Delivery, PublishError> {
        let payload = event.to_json()?;
        self.ensure_connected().await?;
        Ok(self.transport.send(&self.topic, event.key(), &payload).await?)
    }

    async fn ensure_connected(&self) -> Result<(), PublishError> {
        let mut state = self.state.lock().await;
        match *state {
            ConnectionState::Connected => Ok(()),
            ConnectionState::Closed => Err(PublishError::Closed),
            ConnectionState::Disconnected => {
                self.transport.connect().await?;
                *state = ConnectionState::Connected;
                info!(topic = %self.topic, "Producer connected");
                Ok(())
            }
        }
    }

    /// Close the connection if open and refuse further publishes.
    ///
    /// Idempotent.
    ///
    /// # Errors
    ///
    /// Returns the transport error if flushing or disconnecting fails; the
    /// publisher is closed either way.
    pub async fn shutdown(&self) -> Result<(), EventBusError> {
        let mut state = self.state.lock().await;
        let previous = std::mem::replace(&mut *state, ConnectionState::Closed);
        if previous == ConnectionState::Connected {
            info!(topic = %self.topic, "Disconnecting producer");
            self.transport.disconnect().await?;
        }
        Ok(())
    }

    /// Start the fire-and-forget front end.
    ///
    /// Returns a cloneable [`PublishDispatcher`] and the handle of the single worker
    /// draining its queue. The worker stops when `shutdown` fires or every
    /// dispatcher has been dropped; events still queued at shutdown are dropped.
    #[must_use]
    pub fn spawn_dispatcher(
        self: &Arc<Self>,
        capacity: usize,
        mut shutdown: broadcast::Receiver<()>,
    ) -> (PublishDispatcher, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<String>(capacity.max(1));
        let publisher = Arc::clone(self);

        let worker = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.recv() => {
                        rx.close();
                        let mut pending = 0_u64;
                        while rx.try_recv().is_ok() {
                            pending += 1;
                        }
                        if pending > 0 {
                            metrics::counter!("loginapp_events_dropped_total", "stage" => "queue").increment(pending);
                            warn!(pending, "Dropping queued registration events at shutdown");
                        }
                        break;
                    }
                    next = rx.recv() => match next {
                        Some(email) => publisher.publish_registration(&email).await,
                        None => break,
                    },
                }
            }
            debug!("Publish dispatcher stopped");
        });

        (PublishDispatcher { tx }, worker)
    }
}

#[async_trait]
impl ShutdownHandler for EventPublisher {
    fn name(&self) -> &str {
        "event-publisher"
    }

    async fn shutdown(&self) -> Result<(), String> {
        Self::shutdown(self).await.map_err(|e| e.to_string())
    }
}

/// Non-blocking handle for publishing registrations from request handlers.
#[derive(Clone, Debug)]
pub struct PublishDispatcher {
    tx: mpsc::Sender<String>,
}

impl PublishDispatcher {
    /// Queue a registration for `email`.
    ///
    /// Never blocks and never fails. A full or closed queue drops the event with
    /// a warning.
    pub fn dispatch(&self, email: impl Into<String>) {
        match self.tx.try_send(email.into()) {
            Ok(()) => {}
            Err(TrySendError::Full(email)) => {
                metrics::counter!("loginapp_events_dropped_total", "stage" => "queue").increment(1);
                warn!(email = %email, "Publish queue full, dropping registration event");
            }
            Err(TrySendError::Closed(email)) => {
                metrics::counter!("loginapp_events_dropped_total", "stage" => "queue").increment(1);
                warn!(email = %email, "Publish queue closed, dropping registration event");
            }
        }
    }
}
