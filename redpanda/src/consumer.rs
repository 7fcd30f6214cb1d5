//! Consumer transport over rdkafka's `StreamConsumer`.

use crate::{DEFAULT_METADATA_TIMEOUT, blocking, probe_brokers, topic_exists};
use loginapp_core::event_bus::{
    ConsumerTransport, EventBusError, InboundMessage, MessageStream, SubscribeRequest, TransportFuture,
};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{BaseConsumer, Consumer, StreamConsumer};
use rdkafka::message::Message;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Default)]
struct ConsumerSlot {
    /// Group-less client used for metadata probes
    probe: Option<Arc<BaseConsumer>>,
    /// Group member created by `subscribe`
    consumer: Option<Arc<StreamConsumer>>,
    /// Task forwarding messages into the current stream
    forwarder: Option<JoinHandle<()>>,
}

/// Kafka consumer implementing [`ConsumerTransport`].
///
/// - `connect` creates a probe client and fetches cluster metadata (fails fast on
///   an unreachable broker).
/// - `subscribe` checks that the topic exists, then joins the consumer group with
///   `auto.offset.reset` chosen by the request.
/// - `messages` spawns a task that owns the message stream and forwards it through
///   a bounded channel.
/// - `disconnect` stops the forwarder and leaves the group.
///
/// Offsets are committed automatically.
pub struct RedpandaConsumer {
    brokers: String,
    group_id: String,
    client_id: String,
    session_timeout: Duration,
    metadata_timeout: Duration,
    buffer_size: usize,
    slot: Mutex<ConsumerSlot>,
}

impl RedpandaConsumer {
    /// Create a new builder for configuring the consumer.
    #[must_use]
    pub fn builder() -> RedpandaConsumerBuilder {
        RedpandaConsumerBuilder::default()
    }

    /// Consumer group id.
    #[must_use]
    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    fn slot(&self) -> MutexGuard<'_, ConsumerSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn base_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.brokers)
            .set("client.id", &self.client_id);
        config
    }
}

/// Builder for configuring a [`RedpandaConsumer`].
#[derive(Default)]
pub struct RedpandaConsumerBuilder {
    brokers: Option<String>,
    group_id: Option<String>,
    client_id: Option<String>,
    session_timeout: Option<Duration>,
    metadata_timeout: Option<Duration>,
    buffer_size: Option<usize>,
}

impl RedpandaConsumerBuilder {
    /// Set the broker addresses (comma-separated).
    #[must_use]
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = Some(brokers.into());
        self
    }

    /// Set the consumer group id.
    ///
    /// Default: `login-consumer-group`
    #[must_use]
    pub fn group_id(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    /// Set the client id reported to the broker.
    ///
    /// Default: `login-consumer`
    #[must_use]
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Set the group session timeout.
    ///
    /// Default: 30 seconds
    #[must_use]
    pub const fn session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = Some(timeout);
        self
    }

    /// Set the timeout for metadata probes.
    ///
    /// Default: 5 seconds
    #[must_use]
    pub const fn metadata_timeout(mut self, timeout: Duration) -> Self {
        self.metadata_timeout = Some(timeout);
        self
    }

    /// Set how many messages may be buffered between the broker and the receive loop.
    ///
    /// Default: 256. Zero is treated as one.
    #[must_use]
    pub const fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = Some(buffer_size);
        self
    }

    /// Build the [`RedpandaConsumer`]. No network traffic happens until `connect`.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::ConnectionFailed`] if brokers are not set.
    pub fn build(self) -> Result<RedpandaConsumer, EventBusError> {
        let brokers = self
            .brokers
            .ok_or_else(|| EventBusError::ConnectionFailed("Brokers not configured".to_string()))?;

        Ok(RedpandaConsumer {
            brokers,
            group_id: self.group_id.unwrap_or_else(|| "login-consumer-group".to_string()),
            client_id: self.client_id.unwrap_or_else(|| "login-consumer".to_string()),
            session_timeout: self.session_timeout.unwrap_or(Duration::from_secs(30)),
            metadata_timeout: self.metadata_timeout.unwrap_or(DEFAULT_METADATA_TIMEOUT),
            buffer_size: self.buffer_size.unwrap_or(256).max(1),
            slot: Mutex::new(ConsumerSlot::default()),
        })
    }
}

impl ConsumerTransport for RedpandaConsumer {
    fn connect(&self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            let probe: BaseConsumer = self
                .base_config()
                .create()
                .map_err(|e| EventBusError::ConnectionFailed(format!("Failed to create consumer: {e}")))?;
            let probe = Arc::new(probe);

            let client = Arc::clone(&probe);
            let timeout = self.metadata_timeout;
            let brokers = blocking(move || probe_brokers(client.client(), timeout)).await?;

            self.slot().probe = Some(probe);
            tracing::info!(brokers = %self.brokers, reachable = brokers, group_id = %self.group_id, "Consumer connected");
            Ok(())
        })
    }

    fn subscribe<'a>(&'a self, request: &'a SubscribeRequest) -> TransportFuture<'a, ()> {
        Box::pin(async move {
            let probe = self.slot().probe.clone().ok_or(EventBusError::NotConnected)?;

            let topic = request.topic.clone();
            let timeout = self.metadata_timeout;
            let exists = blocking(move || topic_exists(probe.client(), &topic, timeout)).await?;
            if !exists {
                return Err(EventBusError::InvalidTopic(request.topic.clone()));
            }

            let offset_reset = if request.from_beginning { "earliest" } else { "latest" };
            let consumer: StreamConsumer = self
                .base_config()
                .set("group.id", &self.group_id)
                .set("enable.auto.commit", "true")
                .set("auto.offset.reset", offset_reset)
                .set("session.timeout.ms", self.session_timeout.as_millis().to_string())
                .set("enable.partition.eof", "false")
                .create()
                .map_err(|e| EventBusError::SubscriptionFailed {
                    topic: request.topic.clone(),
                    reason: format!("Failed to create consumer: {e}"),
                })?;

            consumer
                .subscribe(&[request.topic.as_str()])
                .map_err(|e| EventBusError::SubscriptionFailed {
                    topic: request.topic.clone(),
                    reason: e.to_string(),
                })?;

            tracing::info!(
                topic = %request.topic,
                group_id = %self.group_id,
                auto_offset_reset = offset_reset,
                "Subscribed to topic"
            );

            let mut slot = self.slot();
            if let Some(previous) = slot.forwarder.take() {
                previous.abort();
            }
            slot.consumer = Some(Arc::new(consumer));
            Ok(())
        })
    }

    fn messages(&self) -> TransportFuture<'_, MessageStream> {
        Box::pin(async move {
            let consumer = self.slot().consumer.clone().ok_or(EventBusError::NotConnected)?;
            let (tx, mut rx) = tokio::sync::mpsc::channel(self.buffer_size);

            // The task owns the consumer handle and forwards messages until the
            // receiver is dropped or the task is aborted by `disconnect`.
            let forwarder = tokio::spawn(async move {
                use futures::StreamExt;

                let mut stream = consumer.stream();
                while let Some(result) = stream.next().await {
                    let item = match result {
                        Ok(message) => Ok(InboundMessage {
                            topic: message.topic().to_string(),
                            partition: message.partition(),
                            offset: message.offset(),
                            key: message.key().map(<[u8]>::to_vec),
                            payload: message.payload().map(<[u8]>::to_vec),
                        }),
                        Err(e) => Err(EventBusError::TransportError(format!("Failed to receive message: {e}"))),
                    };
                    if tx.send(item).await.is_err() {
                        tracing::debug!("Receiver dropped, exiting consumer task");
                        break;
                    }
                }
                tracing::debug!("Consumer task exiting");
            });

            if let Some(previous) = self.slot().forwarder.replace(forwarder) {
                previous.abort();
            }

            let stream = async_stream::stream! {
                while let Some(result) = rx.recv().await {
                    yield result;
                }
            };

            Ok(Box::pin(stream) as MessageStream)
        })
    }

    fn disconnect(&self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            let (forwarder, consumer) = {
                let mut slot = self.slot();
                slot.probe = None;
                (slot.forwarder.take(), slot.consumer.take())
            };

            if let Some(forwarder) = forwarder {
                forwarder.abort();
            }
            if let Some(consumer) = consumer {
                consumer.unsubscribe();
            }

            tracing::info!(group_id = %self.group_id, "Consumer disconnected");
            Ok(())
        })
    }
}
