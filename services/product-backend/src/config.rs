//! Configuration for the catalog service.

use loginapp_runtime::config::{DatabaseConfig, HttpConfig, RetryConfig, env_lookup, shutdown_timeout};
use std::time::Duration;

/// Port used when `PORT` is unset.
pub const DEFAULT_PORT: u16 = 5000;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Listener
    pub http: HttpConfig,
    /// Catalog database
    pub database: DatabaseConfig,
    /// Schema and seed retry budget (`DB_INIT_*`)
    pub db_init: RetryConfig,
    /// Per-component shutdown timeout
    pub shutdown_timeout: Duration,
}

impl Config {
    /// Load from `lookup`.
    pub fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Self {
        Self {
            http: HttpConfig::from_lookup(lookup, DEFAULT_PORT),
            database: DatabaseConfig::from_lookup(lookup),
            db_init: RetryConfig::from_lookup(lookup, "DB_INIT"),
            shutdown_timeout: shutdown_timeout(lookup),
        }
    }

    /// Load from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(&env_lookup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::from_lookup(&|_: &str| None);
        assert_eq!(config.http.port, 5000);
        assert_eq!(config.http.host, "0.0.0.0");
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.db_init.max_attempts, 30);
    }
}
