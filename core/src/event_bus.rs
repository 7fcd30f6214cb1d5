//! Broker transport abstraction used by the event publisher and subscriber.
//!
//! The publishing and consuming sides are split into two traits because each
//! service process only ever plays one role:
//!
//! - [`ProducerTransport`]: connect, send keyed payloads, disconnect
//! - [`ConsumerTransport`]: connect, subscribe to a topic, stream messages, disconnect
//!
//! Both traits are dyn compatible (explicit `Pin<Box<dyn Future>>` returns) so the
//! runtime can hold them as `Arc<dyn ProducerTransport>` and swap the Kafka
//! implementation for an in-memory one in tests.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐                       ┌───────────────────┐
//! │  auth-backend    │                       │  login-consumer   │
//! │  EventPublisher  │                       │  EventSubscriber  │
//! └────────┬─────────┘                       └─────────▲─────────┘
//!          │ ProducerTransport                         │ ConsumerTransport
//!          ▼                                           │
//! ┌─────────────────────────────────────────────────────┴─────────┐
//! │                    Broker topic "Login"                        │
//! │         key = email → partition (per-key ordering)             │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Delivery Semantics
//!
//! - **Best effort** on the producer side: callers decide whether to surface errors
//! - **Ordered within partition**: messages with the same key keep their order
//! - **Duplicates possible**: consumers must tolerate redelivery

use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during broker transport operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventBusError {
    /// Failed to connect to the broker
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Operation attempted before `connect` succeeded
    #[error("Not connected to broker")]
    NotConnected,

    /// Failed to publish a message to a topic
    #[error("Publish failed for topic '{topic}': {reason}")]
    PublishFailed {
        /// The topic that failed
        topic: String,
        /// The reason for failure
        reason: String,
    },

    /// Failed to subscribe to a topic
    #[error("Subscription failed for topic '{topic}': {reason}")]
    SubscriptionFailed {
        /// The topic that failed to subscribe
        topic: String,
        /// The reason for failure
        reason: String,
    },

    /// Topic not found (yet)
    #[error("Invalid topic: {0}")]
    InvalidTopic(String),

    /// Network or transport error
    #[error("Transport error: {0}")]
    TransportError(String),

    /// Failed to disconnect cleanly
    #[error("Disconnect failed: {0}")]
    DisconnectFailed(String),
}

/// Where the broker stored a sent message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    /// Partition the message was written to
    pub partition: i32,
    /// Offset within that partition
    pub offset: i64,
}

/// A raw message read from a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Topic the message arrived on
    pub topic: String,
    /// Partition the message arrived on
    pub partition: i32,
    /// Offset within the partition
    pub offset: i64,
    /// Message key, if any
    pub key: Option<Vec<u8>>,
    /// Message payload, if any
    pub payload: Option<Vec<u8>>,
}

/// Subscription parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeRequest {
    /// Topic to subscribe to
    pub topic: String,
    /// Replay the topic's full history for a fresh consumer group
    pub from_beginning: bool,
}

impl SubscribeRequest {
    /// Subscribe to `topic`, replaying from the earliest retained message.
    #[must_use]
    pub fn from_beginning(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            from_beginning: true,
        }
    }

    /// Subscribe to `topic`, receiving only new messages.
    #[must_use]
    pub fn latest(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            from_beginning: false,
        }
    }
}

/// Stream of inbound messages.
///
/// Each item is a `Result`: a transport error for one poll does not end the stream.
/// The stream ends when the transport disconnects.
pub type MessageStream = Pin<Box<dyn Stream<Item = Result<InboundMessage, EventBusError>> + Send>>;

/// Boxed future returned by transport operations.
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, EventBusError>> + Send + 'a>>;

/// Outbound side of the broker.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; one instance is shared by every
/// in-flight registration request of a process.
pub trait ProducerTransport: Send + Sync {
    /// Establish the broker connection.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::ConnectionFailed`] if the broker is unreachable.
    fn connect(&self) -> TransportFuture<'_, ()>;

    /// Send `payload` to `topic` under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::PublishFailed`] if the broker rejects or times out
    /// the message.
    fn send<'a>(&'a self, topic: &'a str, key: &'a [u8], payload: &'a [u8]) -> TransportFuture<'a, Delivery>;

    /// Flush and close the connection.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::DisconnectFailed`] if pending messages could not
    /// be flushed.
    fn disconnect(&self) -> TransportFuture<'_, ()>;
}

/// Inbound side of the broker.
pub trait ConsumerTransport: Send + Sync {
    /// Establish the broker connection.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::ConnectionFailed`] if the broker is unreachable.
    fn connect(&self) -> TransportFuture<'_, ()>;

    /// Subscribe to a topic.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::InvalidTopic`] while the topic does not exist yet,
    /// or [`EventBusError::SubscriptionFailed`] for other failures.
    fn subscribe<'a>(&'a self, request: &'a SubscribeRequest) -> TransportFuture<'a, ()>;

    /// Start streaming messages for the current subscription.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::NotConnected`] if there is no active subscription.
    fn messages(&self) -> TransportFuture<'_, MessageStream>;

    /// Leave the consumer group and close the connection.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::DisconnectFailed`] if the close fails.
    fn disconnect(&self) -> TransportFuture<'_, ()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_request_constructors() {
        let replay = SubscribeRequest::from_beginning("Login");
        assert!(replay.from_beginning);
        assert_eq!(replay.topic, "Login");

        let tail = SubscribeRequest::latest("Login");
        assert!(!tail.from_beginning);
    }

    #[test]
    fn errors_render_context() {
        let err = EventBusError::PublishFailed {
            topic: "Login".to_string(),
            reason: "broker down".to_string(),
        };
        assert_eq!(err.to_string(), "Publish failed for topic 'Login': broker down");
    }

    #[test]
    fn transports_are_dyn_compatible() {
        fn assert_dyn_producer(_: Option<&dyn ProducerTransport>) {}
        fn assert_dyn_consumer(_: Option<&dyn ConsumerTransport>) {}
        assert_dyn_producer(None);
        assert_dyn_consumer(None);
    }
}
