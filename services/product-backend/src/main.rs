//! Catalog service HTTP server.

use anyhow::Context;
use loginapp_postgres::{PostgresCatalog, init_product_schema, lazy_pool};
use loginapp_runtime::{ExitStatus, ReadinessGate, ShutdownCoordinator, install_panic_hook, run_until_shutdown};
use loginapp_web::{serve, with_http_layers};
use product_backend::{Config, build_router};
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
                "product_backend=info,loginapp_runtime=info,loginapp_postgres=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    install_panic_hook();

    match run().await {
        Ok(status) => status.into(),
        Err(e) => {
            error!(error = %format!("{e:#}"), "product-backend failed to start");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<ExitStatus> {
    info!("Starting product-backend");

    let config = Config::from_env();
    let pool = lazy_pool(&config.database.url, config.database.max_connections)?;

    let gate = ReadinessGate::new("products schema", config.db_init.policy());
    let storage = gate.flag();
    let schema_pool = pool.clone();
    let schema_task = gate.spawn(move || {
        let pool = schema_pool.clone();
        async move { init_product_schema(&pool).await }
    });

    let coordinator = ShutdownCoordinator::new(config.shutdown_timeout);
    let app = with_http_layers(build_router(Arc::new(PostgresCatalog::new(pool)), storage));

    let addr = config.http.socket_addr().await?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    let status = run_until_shutdown(&coordinator, serve(listener, app, coordinator.subscribe())).await;

    schema_task.abort();
    info!(exit_code = status.code(), "product-backend stopped");
    Ok(status)
}
