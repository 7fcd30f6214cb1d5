//! Axum integration shared by the login app HTTP services.
//!
//! - [`AppError`]: error type rendered as `{"error": ..., "code": ...}`
//! - [`extractors::BearerToken`]: `Authorization: Bearer` extractor
//! - [`handlers::health_routes`]: `GET /health` with storage readiness
//! - [`middleware`]: request metrics, tracing and CORS layers plus the graceful serve loop
//!
//! # Example
//!
//! ```ignore
//! use loginapp_web::{AppError, handlers::health_routes, middleware::{serve, with_http_layers}};
//!
//! let app = Router::new()
//!     .route("/api/products", get(list_products))
//!     .with_state(state)
//!     .merge(health_routes("product-backend", readiness));
//!
//! serve(listener, with_http_layers(app), coordinator.subscribe()).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;

// Re-export key types for convenience
pub use error::AppError;
pub use extractors::BearerToken;
pub use handlers::{HealthReport, health_routes};
pub use middleware::{serve, with_http_layers};

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
