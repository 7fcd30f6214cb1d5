//! Consumer service for the login app.
//!
//! Reads the registration topic from the beginning under the
//! `login-consumer-group` group and logs every event. The service has no HTTP
//! surface; it exits 0 on a termination signal and 1 when it cannot subscribe.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod handler;

pub use config::Config;
pub use handler::LoggingRegistrationHandler;
