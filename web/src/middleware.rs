//! Shared HTTP layers and the graceful server loop.
//!
//! # Example
//!
//! ```ignore
//! use loginapp_web::middleware::{serve, with_http_layers};
//!
//! let app = with_http_layers(build_router(state));
//! let listener = tokio::net::TcpListener::bind(addr).await?;
//! serve(listener, app, coordinator.subscribe()).await?;
//! ```

use axum::Router;
use axum::extract::{MatchedPath, Request};
use axum::middleware::{self, Next};
use axum::response::Response;
use metrics::{describe_counter, describe_histogram};
use std::sync::Once;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Request latency histogram, labelled by `method`, `route` and `status_code`.
pub const HTTP_REQUEST_DURATION: &str = "http_request_duration_seconds";

/// Request counter, labelled like [`HTTP_REQUEST_DURATION`].
pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";

/// Route label for requests that matched no route.
const UNMATCHED_ROUTE: &str = "unmatched";

static DESCRIBE: Once = Once::new();

fn describe_http_metrics() {
    DESCRIBE.call_once(|| {
        describe_histogram!(HTTP_REQUEST_DURATION, "Duration of HTTP requests in seconds");
        describe_counter!(HTTP_REQUESTS_TOTAL, "Total number of HTTP requests");
    });
}

/// Wrap a router with request metrics, request tracing and permissive CORS.
#[must_use]
pub fn with_http_layers(router: Router) -> Router {
    describe_http_metrics();
    router
        .layer(middleware::from_fn(track_http_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Record [`HTTP_REQUEST_DURATION`] and [`HTTP_REQUESTS_TOTAL`] for one request.
///
/// The route label is the matched route template (`/api/products/:id`), never
/// the raw path.
pub async fn track_http_metrics(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| UNMATCHED_ROUTE.to_string(), |path| path.as_str().to_string());
    let started = Instant::now();

    let response = next.run(request).await;

    let status_code = response.status().as_u16().to_string();
    metrics::histogram!(
        HTTP_REQUEST_DURATION,
        "method" => method.clone(),
        "route" => route.clone(),
        "status_code" => status_code.clone()
    )
    .record(started.elapsed().as_secs_f64());
    metrics::counter!(
        HTTP_REQUESTS_TOTAL,
        "method" => method,
        "route" => route,
        "status_code" => status_code
    )
    .increment(1);

    response
}

/// Serve `app` until the shutdown broadcast fires.
///
/// In-flight requests are allowed to finish; new connections are refused once
/// the signal arrives. A closed channel counts as a signal.
///
/// # Errors
///
/// Returns the I/O error that stopped the accept loop.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    mut shutdown: broadcast::Receiver<()>,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(address = %addr, "HTTP server listening");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server draining");
        })
        .await?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use axum::routing::get;
    use std::time::Duration;

    #[tokio::test]
    async fn test_serve_stops_on_broadcast() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let app = with_http_layers(Router::new().route("/", get(|| async { "ok" })));
        let (tx, rx) = broadcast::channel(1);

        let server = tokio::spawn(serve(listener, app, rx));
        tx.send(()).expect("send");

        let result = tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("server stopped")
            .expect("join");
        assert!(result.is_ok());
    }
}
