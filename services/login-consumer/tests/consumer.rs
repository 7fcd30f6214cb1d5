//! End-to-end consumer tests against the in-memory broker.

#![allow(clippy::expect_used)]

use login_consumer::LoggingRegistrationHandler;
use loginapp_core::environment::Clock;
use loginapp_core::event::RegistrationEvent;
use loginapp_core::event_bus::EventBusError;
use loginapp_runtime::{
    EventSubscriber, ExitStatus, RetryPolicy, ShutdownCoordinator, SubscriberError, SubscriberState,
    run_until_shutdown_with,
};
use loginapp_testing::{InMemoryBroker, init_test_tracing, test_clock};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

fn publish(broker: &InMemoryBroker, email: &str) {
    let event = RegistrationEvent::new(email, test_clock().now());
    let payload = event.to_json().expect("encode");
    broker
        .append("Login", Some(event.key()), Some(&payload))
        .expect("append");
}

async fn wait_for(handler: &LoggingRegistrationHandler, expected: u64) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while handler.handled() < expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("events handled");
}

#[tokio::test]
async fn logs_backlog_and_live_events() {
    init_test_tracing();
    let broker = InMemoryBroker::new();
    publish(&broker, "a@x.com");

    let handler = Arc::new(LoggingRegistrationHandler::new());
    let subscriber = Arc::new(EventSubscriber::new(Arc::new(broker.consumer()), handler.clone()));
    let (shutdown, rx) = broadcast::channel(1);
    let task = tokio::spawn({
        let subscriber = Arc::clone(&subscriber);
        async move { subscriber.start(rx).await }
    });

    wait_for(&handler, 1).await;
    publish(&broker, "b@x.com");
    wait_for(&handler, 2).await;

    shutdown.send(()).expect("subscriber listening");
    let result = task.await.expect("join");
    assert!(result.is_ok());
    assert_eq!(handler.handled(), 2);
}

#[tokio::test]
async fn malformed_messages_are_skipped() {
    init_test_tracing();
    let broker = InMemoryBroker::new();
    broker.append("Login", None, Some(b"not json")).expect("append");
    broker.append("Login", None, None).expect("append");
    publish(&broker, "a@x.com");

    let handler = Arc::new(LoggingRegistrationHandler::new());
    let subscriber = EventSubscriber::new(Arc::new(broker.consumer()), handler.clone());
    let (shutdown, rx) = broadcast::channel(1);
    let task = tokio::spawn(async move { subscriber.start(rx).await });

    wait_for(&handler, 1).await;
    shutdown.send(()).expect("subscriber listening");
    assert!(task.await.expect("join").is_ok());
    assert_eq!(handler.handled(), 1);
}

#[tokio::test]
async fn waits_for_topic_then_consumes() {
    init_test_tracing();
    let broker = InMemoryBroker::without_auto_create();
    let handler = Arc::new(LoggingRegistrationHandler::new());
    let subscriber = Arc::new(
        EventSubscriber::new(Arc::new(broker.consumer().failing_subscribes(2)), handler.clone())
            .with_retry_policy(RetryPolicy::fixed(5, Duration::from_millis(10))),
    );
    broker.create_topic("Login");
    publish(&broker, "a@x.com");

    let (shutdown, rx) = broadcast::channel(1);
    let task = tokio::spawn({
        let subscriber = Arc::clone(&subscriber);
        async move { subscriber.start(rx).await }
    });

    wait_for(&handler, 1).await;
    assert_eq!(subscriber.state(), SubscriberState::Running);
    shutdown.send(()).expect("subscriber listening");
    assert!(task.await.expect("join").is_ok());
}

#[tokio::test]
async fn exhausted_subscription_exits_with_failure() {
    init_test_tracing();
    let broker = InMemoryBroker::new();
    let consumer = broker.consumer().failing_subscribes(10);
    let subscriber = Arc::new(
        EventSubscriber::new(Arc::new(consumer), Arc::new(LoggingRegistrationHandler::new()))
            .with_retry_policy(RetryPolicy::fixed(3, Duration::from_millis(5))),
    );

    let mut coordinator = ShutdownCoordinator::new(Duration::from_secs(1));
    coordinator.register(subscriber.clone());
    let rx = coordinator.subscribe();
    let work = {
        let subscriber = Arc::clone(&subscriber);
        async move { subscriber.start(rx).await }
    };

    let status = run_until_shutdown_with(&coordinator, work, std::future::pending::<std::io::Result<&'static str>>()).await;

    assert_eq!(status, ExitStatus::Failure);
    assert_eq!(subscriber.state(), SubscriberState::FailedBoot);
}

#[tokio::test]
async fn signal_stops_consumer_cleanly() {
    init_test_tracing();
    let broker = InMemoryBroker::new();
    let handler = Arc::new(LoggingRegistrationHandler::new());
    let subscriber = Arc::new(EventSubscriber::new(Arc::new(broker.consumer()), handler.clone()));
    publish(&broker, "a@x.com");

    let mut coordinator = ShutdownCoordinator::new(Duration::from_secs(1));
    coordinator.register(subscriber.clone());
    let rx = coordinator.subscribe();
    let work = {
        let subscriber = Arc::clone(&subscriber);
        async move { subscriber.start(rx).await }
    };
    let signal = {
        let handler = Arc::clone(&handler);
        async move {
            wait_for(&handler, 1).await;
            Ok::<_, std::io::Error>("SIGTERM")
        }
    };

    let status = run_until_shutdown_with(&coordinator, work, signal).await;

    assert_eq!(status, ExitStatus::Success);
    assert_eq!(subscriber.state(), SubscriberState::Terminated);
    assert_eq!(broker.subscriber_count("Login"), 0);
}

#[test]
fn connect_error_is_reported() {
    let err = SubscriberError::Connect(EventBusError::ConnectionFailed("down".into()));
    assert_eq!(err.exit_status(), ExitStatus::Failure);
}
