//! Catalog service for the login app.
//!
//! Serves the product table read-only. The table is created and seeded at boot
//! behind a readiness gate; until then listing fails with 500.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod routes;

pub use config::Config;
pub use routes::build_router;
