//! Credential service HTTP server.

use anyhow::Context;
use auth_backend::{AppState, Config, TokenIssuer, build_router};
use loginapp_core::environment::SystemClock;
use loginapp_postgres::{PostgresUserStore, init_user_schema, lazy_pool};
use loginapp_redpanda::RedpandaProducer;
use loginapp_runtime::{
    EventPublisher, ExitStatus, ReadinessGate, ShutdownCoordinator, install_panic_hook, run_until_shutdown,
};
use loginapp_web::{serve, with_http_layers};
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
                "auth_backend=info,loginapp_runtime=info,loginapp_postgres=info,loginapp_redpanda=info,tower_http=info"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    install_panic_hook();

    match run().await {
        Ok(status) => status.into(),
        Err(e) => {
            error!(error = %format!("{e:#}"), "auth-backend failed to start");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<ExitStatus> {
    info!("Starting auth-backend");

    let config = Config::from_env();
    info!(
        address = %format!("{}:{}", config.http.host, config.http.port),
        brokers = %config.kafka.brokers,
        topic = %config.kafka.topic,
        "Configuration loaded"
    );

    // Storage comes up in the background; requests made before then fail with 500.
    let pool = lazy_pool(&config.database.url, config.database.max_connections)?;
    let gate = ReadinessGate::new("users schema", config.db_init.policy());
    let storage = gate.flag();
    let schema_pool = pool.clone();
    let schema_task = gate.spawn(move || {
        let pool = schema_pool.clone();
        async move { init_user_schema(&pool).await }
    });

    let producer = RedpandaProducer::builder()
        .brokers(&config.kafka.brokers)
        .client_id(&config.kafka.client_id)
        .timeout(config.kafka.send_timeout)
        .build()?;
    let publisher = Arc::new(
        EventPublisher::new(Arc::new(producer), Arc::new(SystemClock)).with_topic(config.kafka.topic.clone()),
    );

    let mut coordinator = ShutdownCoordinator::new(config.shutdown_timeout);
    coordinator.register(publisher.clone());

    let (events, dispatcher) = publisher.spawn_dispatcher(config.publish_queue_capacity, coordinator.subscribe());

    let state = AppState::new(
        Arc::new(PostgresUserStore::new(pool)),
        events,
        TokenIssuer::new(&config.jwt_secret, Arc::new(SystemClock)),
    );
    let app = with_http_layers(build_router(state, storage));

    let addr = config.http.socket_addr().await?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    let status = run_until_shutdown(&coordinator, serve(listener, app, coordinator.subscribe())).await;

    schema_task.abort();
    dispatcher.abort();
    info!(exit_code = status.code(), "auth-backend stopped");
    Ok(status)
}
