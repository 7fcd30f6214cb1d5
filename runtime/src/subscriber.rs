//! Registration event subscriber.
//!
//! The [`EventSubscriber`] drives the consumer side of the pipeline:
//!
//! ```text
//! Disconnected → Connected → SubscribePending{n} → Running → ShuttingDown → Terminated
//!      │                           │
//!      └────────── FailedBoot ◄────┘
//! ```
//!
//! - Connecting is attempted once; failure is fatal.
//! - Subscribing retries with a fixed delay while the topic does not exist yet.
//! - The receive loop handles one message at a time, skips malformed payloads and
//!   survives handler errors and panics.
//! - The shutdown broadcast is checked before every message.

use crate::lifecycle::{ExitStatus, ShutdownHandler, panic_message};
use crate::retry::{RetryPolicy, RetryState, retry_with_observer};
use async_trait::async_trait;
use futures::{FutureExt, StreamExt};
use loginapp_core::event::{LOGIN_TOPIC, RegistrationEvent};
use loginapp_core::event_bus::{ConsumerTransport, EventBusError, InboundMessage, SubscribeRequest};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

/// Subscriber lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberState {
    /// Not started
    Disconnected,
    /// Connected, not yet subscribed
    Connected,
    /// Subscribe attempt `attempt` in flight
    SubscribePending {
        /// 1-based attempt number
        attempt: u32,
    },
    /// Receive loop active
    Running,
    /// Disconnect in progress
    ShuttingDown,
    /// Disconnected after shutdown
    Terminated,
    /// Connect failed or the subscribe budget was exhausted
    FailedBoot,
}

impl SubscriberState {
    const fn is_stopping(self) -> bool {
        matches!(self, Self::ShuttingDown | Self::Terminated)
    }
}

/// Where a message came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageMeta {
    /// Topic
    pub topic: String,
    /// Partition
    pub partition: i32,
    /// Offset within the partition
    pub offset: i64,
}

impl From<&InboundMessage> for MessageMeta {
    fn from(message: &InboundMessage) -> Self {
        Self {
            topic: message.topic.clone(),
            partition: message.partition,
            offset: message.offset,
        }
    }
}

/// A handler failed to process one event.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("handler failed: {0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    /// Error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Processes one registration event.
///
/// Events may be delivered more than once; implementations must tolerate
/// duplicates.
#[async_trait]
pub trait RegistrationHandler: Send + Sync {
    /// Handle `event`.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError`] if the event could not be processed. The
    /// subscriber logs it and moves on to the next message.
    async fn handle(&self, event: &RegistrationEvent, meta: &MessageMeta) -> Result<(), HandlerError>;
}

/// Fatal subscriber failures.
#[derive(Error, Debug)]
pub enum SubscriberError {
    /// The initial connect failed
    #[error("failed to connect consumer: {0}")]
    Connect(#[source] EventBusError),

    /// The topic never became available
    #[error("subscription to '{topic}' failed after {attempts} attempts: {last_error}")]
    SubscribeExhausted {
        /// Topic
        topic: String,
        /// Attempts made
        attempts: u32,
        /// Error from the final attempt
        #[source]
        last_error: EventBusError,
    },

    /// The message stream could not be opened
    #[error("failed to open message stream: {0}")]
    Stream(#[source] EventBusError),
}

impl SubscriberError {
    /// Process exit status for this failure.
    #[must_use]
    pub const fn exit_status(&self) -> ExitStatus {
        ExitStatus::Failure
    }
}

/// Consumer of registration events.
pub struct EventSubscriber {
    transport: Arc<dyn ConsumerTransport>,
    handler: Arc<dyn RegistrationHandler>,
    topic: String,
    policy: RetryPolicy,
    state: watch::Sender<SubscriberState>,
}

impl EventSubscriber {
    /// Subscriber on the default `Login` topic with the default subscribe policy
    /// (30 attempts, 2 s apart).
    #[must_use]
    pub fn new(transport: Arc<dyn ConsumerTransport>, handler: Arc<dyn RegistrationHandler>) -> Self {
        let (state, _) = watch::channel(SubscriberState::Disconnected);
        Self {
            transport,
            handler,
            topic: LOGIN_TOPIC.to_string(),
            policy: RetryPolicy::default(),
            state,
        }
    }

    /// Subscribe to `topic` instead of the default.
    #[must_use]
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    /// Use `policy` for the subscribe retry loop.
    #[must_use]
    pub const fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SubscriberState {
        *self.state.borrow()
    }

    /// Receiver notified on every state change.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<SubscriberState> {
        self.state.subscribe()
    }

    /// Move to `next` unless shutdown has begun. Returns whether the move happened.
    fn advance(&self, next: SubscriberState) -> bool {
        self.state.send_if_modified(|state| {
            if state.is_stopping() {
                false
            } else {
                *state = next;
                true
            }
        })
    }

    fn fail_boot(&self) {
        self.advance(SubscriberState::FailedBoot);
    }

    /// Connect, subscribe with retry, then process messages until shutdown.
    ///
    /// Returns `Ok(())` when the shutdown broadcast fires or the stream ends.
    ///
    /// # Errors
    ///
    /// - [`SubscriberError::Connect`] if the connect fails (not retried)
    /// - [`SubscriberError::SubscribeExhausted`] if the topic never appears
    /// - [`SubscriberError::Stream`] if the message stream cannot be opened
    pub async fn start(&self, mut shutdown: broadcast::Receiver<()>) -> Result<(), SubscriberError> {
        if let Err(err) = self.transport.connect().await {
            error!(error = %err, "Consumer connect failed");
            self.fail_boot();
            return Err(SubscriberError::Connect(err));
        }
        if !self.advance(SubscriberState::Connected) {
            return Ok(());
        }
        info!(topic = %self.topic, "Consumer connected");

        let request = SubscribeRequest::from_beginning(&self.topic);
        let request = &request;
        let transport = &*self.transport;
        let this = self;
        let mut attempt = 0;
        let subscribe = retry_with_observer(
            "subscribe",
            &self.policy,
            move || {
                attempt += 1;
                this.advance(SubscriberState::SubscribePending { attempt });
                transport.subscribe(request)
            },
            |state: &RetryState, err: &EventBusError| {
                if !state.is_final() {
                    info!(
                        topic = %self.topic,
                        attempt = state.attempt,
                        max_attempts = state.max_attempts,
                        error = %err,
                        "Topic not ready, retrying in {:?}",
                        state.delay
                    );
                }
            },
        );

        let subscribed = tokio::select! {
            biased;
            _ = shutdown.recv() => {
                info!("Shutdown requested before subscription completed");
                return Ok(());
            }
            result = subscribe => result,
        };

        if let Err(exhausted) = subscribed {
            error!(topic = %self.topic, attempts = exhausted.attempts, "Giving up on subscription");
            self.fail_boot();
            return Err(SubscriberError::SubscribeExhausted {
                topic: self.topic.clone(),
                attempts: exhausted.attempts,
                last_error: exhausted.last_error,
            });
        }

        let mut stream = match self.transport.messages().await {
            Ok(stream) => stream,
            Err(err) => {
                self.fail_boot();
                return Err(SubscriberError::Stream(err));
            }
        };

        if !self.advance(SubscriberState::Running) {
            return Ok(());
        }
        info!(topic = %self.topic, "Subscribed, receiving registration events");

        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    info!("Shutdown signal received, leaving receive loop");
                    break;
                }
                next = stream.next() => next,
            };

            if self.state().is_stopping() {
                break;
            }

            match next {
                Some(Ok(message)) => self.process(&message).await,
                Some(Err(err)) => warn!(error = %err, "Error receiving message"),
                None => {
                    info!("Message stream ended");
                    break;
                }
            }
        }

        Ok(())
    }

    async fn process(&self, message: &InboundMessage) {
        let meta = MessageMeta::from(message);

        let event = match RegistrationEvent::from_payload(message.payload.as_deref()) {
            Ok(event) => event,
            Err(err) => {
                metrics::counter!("loginapp_events_rejected_total").increment(1);
                warn!(
                    topic = %meta.topic,
                    partition = meta.partition,
                    offset = meta.offset,
                    error = %err,
                    "Skipping malformed message"
                );
                return;
            }
        };
        metrics::counter!("loginapp_events_received_total").increment(1);

        match AssertUnwindSafe(self.handler.handle(&event, &meta)).catch_unwind().await {
            Ok(Ok(())) => debug!(email = %event.email(), offset = meta.offset, "Handled registration event"),
            Ok(Err(err)) => error!(email = %event.email(), offset = meta.offset, error = %err, "Handler failed"),
            Err(panic) => error!(
                email = %event.email(),
                offset = meta.offset,
                panic = %panic_message(panic.as_ref()),
                "Handler panicked"
            ),
        }
    }

    /// Disconnect and move to `Terminated`.
    ///
    /// Idempotent. From `FailedBoot` the disconnect is still attempted and the
    /// state stays `FailedBoot`.
    ///
    /// # Errors
    ///
    /// Returns the transport error if the disconnect fails.
    pub async fn shutdown(&self) -> Result<(), EventBusError> {
        let mut failed_boot = false;
        let proceed = self.state.send_if_modified(|state| match state {
            SubscriberState::ShuttingDown | SubscriberState::Terminated => false,
            SubscriberState::FailedBoot => {
                failed_boot = true;
                false
            }
            _ => {
                *state = SubscriberState::ShuttingDown;
                true
            }
        });

        if failed_boot {
            return self.transport.disconnect().await;
        }
        if !proceed {
            return Ok(());
        }

        info!(topic = %self.topic, "Disconnecting consumer");
        let result = self.transport.disconnect().await;
        self.state.send_replace(SubscriberState::Terminated);
        result
    }
}

#[async_trait]
impl ShutdownHandler for EventSubscriber {
    fn name(&self) -> &str {
        "event-subscriber"
    }

    async fn shutdown(&self) -> Result<(), String> {
        Self::shutdown(self).await.map_err(|e| e.to_string())
    }
}
