//! Kafka/Redpanda transports for the login app.
//!
//! This crate implements the broker transport traits from `loginapp-core` on top of
//! rdkafka:
//!
//! - [`RedpandaProducer`]: [`ProducerTransport`](loginapp_core::event_bus::ProducerTransport)
//!   over a `FutureProducer`
//! - [`RedpandaConsumer`]: [`ConsumerTransport`](loginapp_core::event_bus::ConsumerTransport)
//!   over a `StreamConsumer` in a consumer group
//!
//! Any Kafka-compatible broker works (Redpanda, Apache Kafka, MSK, ...).
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐   key = email    ┌──────────────┐    group     ┌──────────────────┐
//! │ RedpandaProducer │ ───────────────► │ topic "Login"│ ───────────► │ RedpandaConsumer │
//! │ (idempotent,     │                  │ (partitioned)│  "login-     │ (auto-commit,    │
//! │  acks=all)       │                  └──────────────┘  consumer-   │  from earliest)  │
//! └──────────────────┘                                    group"      └──────────────────┘
//! ```
//!
//! # Delivery Semantics
//!
//! - The producer is idempotent with `acks=all` and the murmur2 partitioner, so
//!   same-key messages keep their order within a partition.
//! - The consumer commits offsets automatically; after a crash, messages since the
//!   last commit are redelivered. Handlers must tolerate duplicates.
//!
//! # Example
//!
//! ```no_run
//! use loginapp_core::event_bus::{ProducerTransport, EventBusError};
//! use loginapp_redpanda::RedpandaProducer;
//!
//! # async fn example() -> Result<(), EventBusError> {
//! let producer = RedpandaProducer::builder()
//!     .brokers("localhost:9092")
//!     .client_id("login-backend")
//!     .build()?;
//!
//! producer.connect().await?;
//! producer.send("Login", b"alice@example.com", br#"{"username":"alice"}"#).await?;
//! producer.disconnect().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod consumer;
mod producer;

pub use consumer::{RedpandaConsumer, RedpandaConsumerBuilder};
pub use producer::{RedpandaProducer, RedpandaProducerBuilder};

use loginapp_core::event_bus::EventBusError;
use rdkafka::client::{Client, ClientContext};
use rdkafka::util::Timeout;
use std::time::Duration;

/// Default timeout for metadata requests and flushes.
pub const DEFAULT_METADATA_TIMEOUT: Duration = Duration::from_secs(5);

/// Whether `topic` exists on the cluster `client` talks to.
///
/// Blocking; call from `spawn_blocking`.
fn topic_exists<C: ClientContext>(client: &Client<C>, topic: &str, timeout: Duration) -> Result<bool, EventBusError> {
    let metadata = client
        .fetch_metadata(Some(topic), Timeout::After(timeout))
        .map_err(|e| EventBusError::TransportError(format!("Failed to fetch metadata: {e}")))?;

    Ok(metadata
        .topics()
        .iter()
        .any(|t| t.name() == topic && t.error().is_none() && !t.partitions().is_empty()))
}

/// Probe the cluster with a metadata request.
///
/// Blocking; call from `spawn_blocking`.
fn probe_brokers<C: ClientContext>(client: &Client<C>, timeout: Duration) -> Result<usize, EventBusError> {
    client
        .fetch_metadata(None, Timeout::After(timeout))
        .map(|metadata| metadata.brokers().len())
        .map_err(|e| EventBusError::ConnectionFailed(format!("Broker unreachable: {e}")))
}

/// Run a blocking rdkafka call off the async runtime.
async fn blocking<T, F>(f: F) -> Result<T, EventBusError>
where
    F: FnOnce() -> Result<T, EventBusError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| EventBusError::TransportError(format!("Blocking task failed: {e}")))?
}
