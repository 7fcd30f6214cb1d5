//! Consumer service entry point.

use login_consumer::{Config, LoggingRegistrationHandler};
use loginapp_redpanda::RedpandaConsumer;
use loginapp_runtime::{EventSubscriber, ExitStatus, ShutdownCoordinator, install_panic_hook, run_until_shutdown};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "login_consumer=info,loginapp_runtime=info,loginapp_redpanda=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    install_panic_hook();

    match run().await {
        Ok(status) => status.into(),
        Err(e) => {
            error!(error = %format!("{e:#}"), "login-consumer failed to start");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<ExitStatus> {
    let config = Config::from_env();
    info!(
        brokers = %config.kafka.brokers,
        topic = %config.kafka.topic,
        group_id = %config.kafka.consumer_group,
        max_attempts = config.subscribe.max_attempts,
        "Starting login-consumer"
    );

    let consumer = RedpandaConsumer::builder()
        .brokers(&config.kafka.brokers)
        .group_id(&config.kafka.consumer_group)
        .client_id(&config.kafka.client_id)
        .build()?;

    let subscriber = Arc::new(
        EventSubscriber::new(Arc::new(consumer), Arc::new(LoggingRegistrationHandler::new()))
            .with_topic(config.kafka.topic.clone())
            .with_retry_policy(config.subscribe.policy()),
    );

    let mut coordinator = ShutdownCoordinator::new(config.shutdown_timeout);
    coordinator.register(subscriber.clone());

    let shutdown = coordinator.subscribe();
    let work = {
        let subscriber = Arc::clone(&subscriber);
        async move { subscriber.start(shutdown).await }
    };

    let status = run_until_shutdown(&coordinator, work).await;
    info!(exit_code = status.code(), state = ?subscriber.state(), "login-consumer stopped");
    Ok(status)
}
