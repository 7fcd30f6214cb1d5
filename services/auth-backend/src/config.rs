//! Configuration management for the credential service.
//!
//! Loads configuration from environment variables with sensible defaults.

use loginapp_runtime::config::{
    DatabaseConfig, HttpConfig, KafkaConfig, RetryConfig, env_lookup, parse_or, shutdown_timeout,
    var_or,
};
use std::time::Duration;

/// Port used when `PORT` is unset.
pub const DEFAULT_PORT: u16 = 4000;

/// Broker client id used when `KAFKA_CLIENT_ID` is unset.
pub const DEFAULT_CLIENT_ID: &str = "login-backend";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Listener
    pub http: HttpConfig,
    /// Credential database
    pub database: DatabaseConfig,
    /// Registration event producer
    pub kafka: KafkaConfig,
    /// Schema initialization retry budget (`DB_INIT_*`)
    pub db_init: RetryConfig,
    /// HMAC secret for issued tokens, `JWT_SECRET`
    pub jwt_secret: String,
    /// Registration events that may wait for the publisher, `PUBLISH_QUEUE_CAPACITY`
    pub publish_queue_capacity: usize,
    /// Per-component shutdown timeout
    pub shutdown_timeout: Duration,
}

impl Config {
    /// Load from `lookup`.
    pub fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Self {
        Self {
            http: HttpConfig::from_lookup(lookup, DEFAULT_PORT),
            database: DatabaseConfig::from_lookup(lookup),
            kafka: KafkaConfig::from_lookup(lookup, DEFAULT_CLIENT_ID),
            db_init: RetryConfig::from_lookup(lookup, "DB_INIT"),
            jwt_secret: var_or(lookup, "JWT_SECRET", "devsecret"),
            publish_queue_capacity: parse_or(lookup, "PUBLISH_QUEUE_CAPACITY", 1024),
            shutdown_timeout: shutdown_timeout(lookup),
        }
    }

    /// Load from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(&env_lookup)
    }
}
