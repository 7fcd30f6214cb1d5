//! Health check endpoint.
//!
//! Liveness only: the endpoint answers 200 while the process runs and reports the
//! storage readiness gate as a field instead of failing the probe.

use axum::{Json, Router, extract::State, routing::get};
use loginapp_runtime::ReadinessFlag;
use serde::Serialize;

/// Health check response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    /// Always `ok`
    pub status: &'static str,
    /// Service name
    pub service: &'static str,
    /// `pending`, `ready` or `degraded`
    pub storage: &'static str,
}

#[derive(Clone)]
struct HealthState {
    service: &'static str,
    storage: ReadinessFlag,
}

/// Health check handler.
///
/// ```bash
/// curl http://localhost:4000/health
/// # {"status":"ok","service":"auth-backend","storage":"ready"}
/// ```
#[allow(clippy::unused_async)]
async fn health_check(State(state): State<HealthState>) -> Json<HealthReport> {
    Json(HealthReport {
        status: "ok",
        service: state.service,
        storage: state.storage.status().as_str(),
    })
}

/// `GET /health` as a stateless router, ready to merge into a service router.
pub fn health_routes(service: &'static str, storage: ReadinessFlag) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .with_state(HealthState { service, storage })
}
