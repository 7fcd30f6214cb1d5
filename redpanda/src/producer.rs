//! Producer transport over rdkafka's `FutureProducer`.

use crate::{DEFAULT_METADATA_TIMEOUT, blocking, probe_brokers};
use loginapp_core::event_bus::{Delivery, EventBusError, ProducerTransport, TransportFuture};
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use std::time::Duration;

/// Kafka producer implementing [`ProducerTransport`].
///
/// Building the producer does not touch the network; [`connect`](ProducerTransport::connect)
/// probes the cluster with a metadata request so an unreachable broker is reported
/// up front instead of on the first send.
///
/// # Configuration
///
/// - **Brokers**: bootstrap servers (required)
/// - **Client id**: reported to the broker (default `login-backend`)
/// - **Acks**: `all` by default, required by idempotence
/// - **Idempotence**: on by default; keeps same-key order across internal retries
/// - **Timeout**: per-message delivery timeout (default 5 s)
///
/// # Example
///
/// ```no_run
/// use loginapp_redpanda::RedpandaProducer;
/// use std::time::Duration;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let producer = RedpandaProducer::builder()
///     .brokers("localhost:9092,localhost:9093")
///     .client_id("login-backend")
///     .compression("lz4")
///     .timeout(Duration::from_secs(10))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct RedpandaProducer {
    /// Kafka producer for publishing events
    producer: FutureProducer,
    /// Broker addresses
    brokers: String,
    /// Delivery timeout
    timeout: Duration,
}

impl RedpandaProducer {
    /// Producer with default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::ConnectionFailed`] if the client cannot be created.
    pub fn new(brokers: &str) -> Result<Self, EventBusError> {
        Self::builder().brokers(brokers).build()
    }

    /// Create a new builder for configuring the producer.
    #[must_use]
    pub fn builder() -> RedpandaProducerBuilder {
        RedpandaProducerBuilder::default()
    }

    /// Get a reference to the brokers string.
    #[must_use]
    pub fn brokers(&self) -> &str {
        &self.brokers
    }
}

/// Builder for configuring a [`RedpandaProducer`].
#[derive(Default)]
pub struct RedpandaProducerBuilder {
    brokers: Option<String>,
    client_id: Option<String>,
    producer_acks: Option<String>,
    compression: Option<String>,
    timeout: Option<Duration>,
    idempotence: Option<bool>,
}

impl RedpandaProducerBuilder {
    /// Set the broker addresses (comma-separated).
    #[must_use]
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = Some(brokers.into());
        self
    }

    /// Set the client id reported to the broker.
    ///
    /// Default: `login-backend`
    #[must_use]
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Set the producer acknowledgment mode.
    ///
    /// - `acks`: "0" (no acks), "1" (leader ack), "all" (all replicas ack)
    ///
    /// Default: "all". Anything else requires [`idempotence(false)`](Self::idempotence).
    #[must_use]
    pub fn producer_acks(mut self, acks: impl Into<String>) -> Self {
        self.producer_acks = Some(acks.into());
        self
    }

    /// Set the compression codec: "none", "gzip", "snappy", "lz4", "zstd".
    ///
    /// Default: "none"
    #[must_use]
    pub fn compression(mut self, compression: impl Into<String>) -> Self {
        self.compression = Some(compression.into());
        self
    }

    /// Set the per-message delivery timeout.
    ///
    /// Default: 5 seconds
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Enable or disable the idempotent producer.
    ///
    /// Default: enabled
    #[must_use]
    pub const fn idempotence(mut self, enabled: bool) -> Self {
        self.idempotence = Some(enabled);
        self
    }

    /// Build the [`RedpandaProducer`].
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::ConnectionFailed`] if:
    /// - Brokers not set
    /// - The configuration is rejected by librdkafka
    pub fn build(self) -> Result<RedpandaProducer, EventBusError> {
        let brokers = self
            .brokers
            .ok_or_else(|| EventBusError::ConnectionFailed("Brokers not configured".to_string()))?;
        let timeout = self.timeout.unwrap_or(Duration::from_secs(5));
        let client_id = self.client_id.as_deref().unwrap_or("login-backend");
        let acks = self.producer_acks.as_deref().unwrap_or("all");
        let compression = self.compression.as_deref().unwrap_or("none");
        let idempotence = self.idempotence.unwrap_or(true);

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &brokers)
            .set("client.id", client_id)
            .set("message.timeout.ms", timeout.as_millis().to_string())
            .set("acks", acks)
            .set("enable.idempotence", idempotence.to_string())
            .set("partitioner", "murmur2_random")
            .set("compression.type", compression)
            .create()
            .map_err(|e| EventBusError::ConnectionFailed(format!("Failed to create producer: {e}")))?;

        tracing::info!(
            brokers = %brokers,
            client_id,
            acks,
            compression,
            idempotence,
            "RedpandaProducer created"
        );

        Ok(RedpandaProducer {
            producer,
            brokers,
            timeout,
        })
    }
}

impl ProducerTransport for RedpandaProducer {
    fn connect(&self) -> TransportFuture<'_, ()> {
        let producer = self.producer.clone();
        let timeout = self.timeout.max(DEFAULT_METADATA_TIMEOUT);

        Box::pin(async move {
            let brokers = blocking(move || probe_brokers(producer.client(), timeout)).await?;
            tracing::info!(brokers = %self.brokers, reachable = brokers, "Producer connected");
            Ok(())
        })
    }

    fn send<'a>(&'a self, topic: &'a str, key: &'a [u8], payload: &'a [u8]) -> TransportFuture<'a, Delivery> {
        Box::pin(async move {
            let record = FutureRecord::to(topic).key(key).payload(payload);

            match self.producer.send(record, Timeout::After(self.timeout)).await {
                Ok((partition, offset)) => {
                    tracing::debug!(topic, partition, offset, "Message delivered");
                    Ok(Delivery { partition, offset })
                }
                Err((kafka_error, _)) => {
                    tracing::error!(topic, error = %kafka_error, "Failed to deliver message");
                    Err(EventBusError::PublishFailed {
                        topic: topic.to_string(),
                        reason: kafka_error.to_string(),
                    })
                }
            }
        })
    }

    fn disconnect(&self) -> TransportFuture<'_, ()> {
        let producer = self.producer.clone();
        let timeout = self.timeout;

        Box::pin(async move {
            blocking(move || {
                producer
                    .flush(Timeout::After(timeout))
                    .map_err(|e| EventBusError::DisconnectFailed(format!("Flush failed: {e}")))
            })
            .await?;
            tracing::info!(brokers = %self.brokers, "Producer flushed and disconnected");
            Ok(())
        })
    }
}
