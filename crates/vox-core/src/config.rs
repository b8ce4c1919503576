//! Publisher and subscriber configuration.
//!
//! Configuration can be loaded from:
//! - Environment variables (VOX_*), used as defaults for missing keys
//! - TOML configuration file with `[publisher]` and `[subscriber]` sections

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Default locations searched by [`Config::load`].
const CONFIG_PATHS: [&str; 2] = ["vox.toml", "/etc/vox/vox.toml"];

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Publisher settings.
    #[serde(default)]
    pub publisher: PublisherConfig,

    /// Defaults for subscribers.
    #[serde(default)]
    pub subscriber: SubscriberConfig,
}

/// Publisher configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublisherConfig {
    /// How long a delivery may wait on a full mailbox, in milliseconds.
    /// `0` waits until the subscriber drains, closes, or the publisher shuts down.
    #[serde(default = "default_delivery_timeout")]
    pub delivery_timeout_ms: u64,

    /// Maximum number of deliveries attempted at once across all
    /// subscribers. `0` is unlimited.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

/// Subscriber configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberConfig {
    /// Number of messages a mailbox buffers before deliveries wait.
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,
}

fn env_or<T: std::str::FromStr>(key: &str, fallback: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(fallback)
}

fn default_delivery_timeout() -> u64 {
    env_or("VOX_DELIVERY_TIMEOUT_MS", 0)
}

fn default_max_in_flight() -> usize {
    env_or("VOX_MAX_IN_FLIGHT", 0)
}

fn default_mailbox_capacity() -> usize {
    // One slot keeps the hand-off close to a rendezvous.
    env_or("VOX_MAILBOX_CAPACITY", 1)
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            delivery_timeout_ms: default_delivery_timeout(),
            max_in_flight: default_max_in_flight(),
        }
    }
}

impl PublisherConfig {
    /// Delivery timeout, or `None` when deliveries may wait indefinitely.
    #[must_use]
    pub fn delivery_timeout(&self) -> Option<Duration> {
        (self.delivery_timeout_ms > 0).then(|| Duration::from_millis(self.delivery_timeout_ms))
    }

    /// In-flight limit, or `None` when unlimited.
    #[must_use]
    pub fn in_flight_limit(&self) -> Option<usize> {
        (self.max_in_flight > 0).then_some(self.max_in_flight)
    }

    /// Set the delivery timeout.
    #[must_use]
    pub fn with_delivery_timeout(mut self, timeout: Duration) -> Self {
        self.delivery_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the in-flight limit.
    #[must_use]
    pub fn with_max_in_flight(mut self, max: usize) -> Self {
        self.max_in_flight = max;
        self
    }
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: default_mailbox_capacity(),
        }
    }
}

impl SubscriberConfig {
    /// Create a config with the given mailbox capacity.
    #[must_use]
    pub fn with_capacity(mailbox_capacity: usize) -> Self {
        Self { mailbox_capacity }
    }
}

impl Config {
    /// Load configuration from the first default path that exists, or
    /// fall back to defaults with environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be read or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        for path in CONFIG_PATHS {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        debug!(path = %path.display(), "Loading config file");
        Self::from_toml_str(&contents)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not valid or fails validation.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that deserialize fine but cannot be used.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a zero mailbox capacity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.subscriber.mailbox_capacity == 0 {
            return Err(ConfigError::Invalid("mailbox_capacity must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const ENV_KEYS: [&str; 3] = [
        "VOX_DELIVERY_TIMEOUT_MS",
        "VOX_MAX_IN_FLIGHT",
        "VOX_MAILBOX_CAPACITY",
    ];

    #[test]
    #[serial]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(config.subscriber.mailbox_capacity >= 1);
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
            [publisher]
            delivery_timeout_ms = 250
            max_in_flight = 32

            [subscriber]
            mailbox_capacity = 8
        "#;

        let config = Config::from_toml_str(toml_str).unwrap();
        assert_eq!(
            config.publisher.delivery_timeout(),
            Some(Duration::from_millis(250))
        );
        assert_eq!(config.publisher.in_flight_limit(), Some(32));
        assert_eq!(config.subscriber.mailbox_capacity, 8);
    }

    #[test]
    fn test_zero_means_unlimited() {
        let config = PublisherConfig {
            delivery_timeout_ms: 0,
            max_in_flight: 0,
        };
        assert_eq!(config.delivery_timeout(), None);
        assert_eq!(config.in_flight_limit(), None);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let toml_str = r#"
            [subscriber]
            mailbox_capacity = 0
        "#;

        assert!(matches!(
            Config::from_toml_str(toml_str),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            Config::from_toml_str("[publisher]\nmax_in_flight = \"many\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            Config::from_file("/nonexistent/vox.toml"),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_builders() {
        let config = PublisherConfig::default()
            .with_delivery_timeout(Duration::from_secs(2))
            .with_max_in_flight(4);
        assert_eq!(config.delivery_timeout_ms, 2000);
        assert_eq!(config.max_in_flight, 4);
    }

    #[test]
    #[serial]
    fn test_env_fills_missing_keys() {
        temp_env::with_vars(
            [
                ("VOX_DELIVERY_TIMEOUT_MS", Some("750")),
                ("VOX_MAX_IN_FLIGHT", Some("3")),
                ("VOX_MAILBOX_CAPACITY", Some("8")),
            ],
            || {
                let config = Config::from_toml_str("").unwrap();
                assert_eq!(config.publisher.delivery_timeout_ms, 750);
                assert_eq!(config.publisher.max_in_flight, 3);
                assert_eq!(config.subscriber.mailbox_capacity, 8);
            },
        );
    }

    #[test]
    #[serial]
    fn test_file_value_wins_over_env() {
        temp_env::with_vars(
            [
                ("VOX_DELIVERY_TIMEOUT_MS", Some("750")),
                ("VOX_MAX_IN_FLIGHT", Some("3")),
            ],
            || {
                let config = Config::from_toml_str("[publisher]\nmax_in_flight = 9").unwrap();
                assert_eq!(config.publisher.max_in_flight, 9);
                // Keys missing from the section still come from the environment.
                assert_eq!(config.publisher.delivery_timeout_ms, 750);
            },
        );
    }

    #[test]
    #[serial]
    fn test_unparsable_env_falls_back() {
        temp_env::with_vars(
            [
                ("VOX_DELIVERY_TIMEOUT_MS", Some("soon")),
                ("VOX_MAX_IN_FLIGHT", Some("many")),
                ("VOX_MAILBOX_CAPACITY", Some("-1")),
            ],
            || {
                let publisher = PublisherConfig::default();
                assert_eq!(publisher.delivery_timeout_ms, 0);
                assert_eq!(publisher.max_in_flight, 0);
                assert_eq!(SubscriberConfig::default().mailbox_capacity, 1);
            },
        );
    }

    #[test]
    #[serial]
    fn test_unset_env_uses_builtin_defaults() {
        temp_env::with_vars_unset(ENV_KEYS, || {
            let config = Config::from_toml_str("").unwrap();
            assert_eq!(config.publisher.delivery_timeout(), None);
            assert_eq!(config.publisher.in_flight_limit(), None);
            assert_eq!(config.subscriber.mailbox_capacity, 1);
        });
    }
}
