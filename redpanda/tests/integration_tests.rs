//! Integration tests for the Kafka transports against a real broker.
//!
//! These tests use testcontainers to spin up Kafka and validate:
//! - Keyed publish followed by a from-beginning subscription
//! - Subscribing to a topic that does not exist yet
//! - Same-key ordering
//! - The full publisher → subscriber pipeline
//!
//! # Running These Tests
//!
//! These tests are marked as `#[ignore]` by default because they require Docker
//! and take 15-60 seconds each to start Kafka.
//!
//! ```bash
//! cargo test -p loginapp-redpanda --test integration_tests -- --ignored
//! ```

#![allow(clippy::expect_used)]
#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]

use async_trait::async_trait;
use futures::StreamExt;
use loginapp_core::environment::SystemClock;
use loginapp_core::event::RegistrationEvent;
use loginapp_core::event_bus::{ConsumerTransport, EventBusError, ProducerTransport, SubscribeRequest};
use loginapp_redpanda::{RedpandaConsumer, RedpandaProducer};
use loginapp_runtime::{
    EventPublisher, EventSubscriber, HandlerError, MessageMeta, RegistrationHandler, RetryPolicy,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::kafka::{KAFKA_PORT, Kafka};

async fn start_kafka() -> (ContainerAsync<Kafka>, String) {
    let kafka = Kafka::default()
        .with_env_var("KAFKA_AUTO_CREATE_TOPICS_ENABLE", "true")
        .start()
        .await
        .expect("Failed to start Kafka container");

    let host = kafka.get_host().await.expect("Failed to get host");
    let port = kafka
        .get_host_port_ipv4(KAFKA_PORT)
        .await
        .expect("Failed to get port");
    let brokers = format!("{host}:{port}");
    wait_for_kafka_ready(&brokers).await;
    (kafka, brokers)
}

/// Helper to wait for Kafka to accept writes
async fn wait_for_kafka_ready(brokers: &str) {
    let max_attempts = 60;
    for attempt in 1..=max_attempts {
        if let Ok(producer) = RedpandaProducer::new(brokers) {
            if producer.connect().await.is_ok()
                && producer.send("warmup-topic", b"warmup", b"{}").await.is_ok()
            {
                tokio::time::sleep(Duration::from_millis(500)).await;
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(
            attempt != max_attempts,
            "Kafka failed to become ready after {max_attempts} attempts"
        );
    }
}

fn consumer(brokers: &str, group: &str) -> RedpandaConsumer {
    RedpandaConsumer::builder()
        .brokers(brokers)
        .group_id(group)
        .build()
        .expect("Failed to build consumer")
}

#[tokio::test]
#[ignore]
async fn test_publish_then_read_from_beginning() {
    let (_kafka, brokers) = start_kafka().await;

    let producer = RedpandaProducer::new(&brokers).expect("Failed to build producer");
    producer.connect().await.expect("connect");
    let first = producer
        .send("Login", b"a@x.com", b"first")
        .await
        .expect("send first");
    let second = producer
        .send("Login", b"a@x.com", b"second")
        .await
        .expect("send second");
    assert_eq!(first.partition, second.partition);
    assert!(second.offset > first.offset);

    let consumer = consumer(&brokers, "test-read-from-beginning");
    consumer.connect().await.expect("consumer connect");
    consumer
        .subscribe(&SubscribeRequest::from_beginning("Login"))
        .await
        .expect("subscribe");
    let mut stream = consumer.messages().await.expect("messages");

    let mut payloads = Vec::new();
    tokio::time::timeout(Duration::from_secs(30), async {
        while payloads.len() < 2 {
            if let Some(Ok(message)) = stream.next().await {
                assert_eq!(message.key.as_deref(), Some(&b"a@x.com"[..]));
                payloads.push(message.payload.unwrap_or_default());
            }
        }
    })
    .await
    .expect("Timeout waiting for messages");

    assert_eq!(payloads, vec![b"first".to_vec(), b"second".to_vec()]);

    consumer.disconnect().await.expect("disconnect");
    producer.disconnect().await.expect("flush");
}

#[tokio::test]
#[ignore]
async fn test_subscribe_to_missing_topic_is_invalid() {
    let (_kafka, brokers) = start_kafka().await;

    let consumer = consumer(&brokers, "test-missing-topic");
    consumer.connect().await.expect("consumer connect");
    let result = consumer
        .subscribe(&SubscribeRequest::from_beginning("does-not-exist"))
        .await;

    assert_eq!(result, Err(EventBusError::InvalidTopic("does-not-exist".to_string())));
}

#[tokio::test]
#[ignore]
async fn test_connect_to_unreachable_broker_fails() {
    let producer = RedpandaProducer::builder()
        .brokers("127.0.0.1:1")
        .timeout(Duration::from_millis(500))
        .build()
        .expect("build");

    let result = producer.connect().await;
    assert!(matches!(result, Err(EventBusError::ConnectionFailed(_))));
}

#[derive(Default)]
struct Collect(Mutex<Vec<String>>);

#[async_trait]
impl RegistrationHandler for Collect {
    async fn handle(&self, event: &RegistrationEvent, _meta: &MessageMeta) -> Result<(), HandlerError> {
        self.0.lock().unwrap().push(event.email().to_string());
        Ok(())
    }
}

#[tokio::test]
#[ignore]
async fn test_registration_pipeline_end_to_end() {
    let (_kafka, brokers) = start_kafka().await;

    let publisher = EventPublisher::new(
        Arc::new(RedpandaProducer::new(&brokers).expect("producer")),
        Arc::new(SystemClock),
    );
    publisher.publish_registration("a@x.com").await;
    publisher.publish_registration("b@x.com").await;
    publisher.publish_registration("a@x.com").await;

    let handler = Arc::new(Collect::default());
    let subscriber = Arc::new(
        EventSubscriber::new(Arc::new(consumer(&brokers, "test-pipeline")), handler.clone())
            .with_retry_policy(RetryPolicy::fixed(10, Duration::from_secs(1))),
    );
    let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
    let task = tokio::spawn({
        let subscriber = Arc::clone(&subscriber);
        async move { subscriber.start(shutdown_rx).await }
    });

    tokio::time::timeout(Duration::from_secs(30), async {
        while handler.0.lock().unwrap().len() < 3 {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    })
    .await
    .expect("Timeout waiting for registrations");

    let seen = handler.0.lock().unwrap().clone();
    let a_only: Vec<_> = seen.iter().filter(|e| *e == "a@x.com").collect();
    assert_eq!(a_only.len(), 2);

    shutdown_tx.send(()).expect("broadcast");
    task.await.expect("join").expect("subscriber");
    subscriber.shutdown().await.expect("disconnect");
    publisher.shutdown().await.expect("flush");
}
