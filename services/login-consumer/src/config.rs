//! Configuration for the consumer service.

use loginapp_runtime::config::{KafkaConfig, RetryConfig, env_lookup, shutdown_timeout};
use std::time::Duration;

/// Broker client id used when `KAFKA_CLIENT_ID` is unset.
pub const DEFAULT_CLIENT_ID: &str = "login-consumer";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Broker, topic and group
    pub kafka: KafkaConfig,
    /// Subscription retry budget (`SUBSCRIBE_*`)
    pub subscribe: RetryConfig,
    /// Disconnect timeout
    pub shutdown_timeout: Duration,
}

impl Config {
    /// Load from `lookup`.
    pub fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Self {
        Self {
            kafka: KafkaConfig::from_lookup(lookup, DEFAULT_CLIENT_ID),
            subscribe: RetryConfig::from_lookup(lookup, "SUBSCRIBE"),
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
        assert_eq!(config.kafka.client_id, "login-consumer");
        assert_eq!(config.kafka.consumer_group, "login-consumer-group");
        assert_eq!(config.kafka.topic, "Login");
        assert_eq!(config.subscribe.max_attempts, 30);
        assert_eq!(config.subscribe.delay, Duration::from_millis(2000));
    }

    #[test]
    fn subscribe_budget_override() {
        let lookup = |name: &str| match name {
            "SUBSCRIBE_MAX_ATTEMPTS" => Some("3".to_string()),
            "SUBSCRIBE_RETRY_DELAY_MS" => Some("100".to_string()),
            _ => None,
        };
        let config = Config::from_lookup(&lookup);
        assert_eq!(config.subscribe.max_attempts, 3);
        assert_eq!(config.subscribe.delay, Duration::from_millis(100));
    }
}
