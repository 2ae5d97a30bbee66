//! # Runtime Configuration
//!
//! Retry cadence and budget plus runtime switches, read from the
//! environment.
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `LEADLINE_MAX_RETRIES` | `3` | Retry budget per dead-letter entry |
//! | `LEADLINE_RETRY_INTERVAL_SECS` | `30` | Seconds between retry passes |
//! | `LEADLINE_RETRY_ENABLED` | `true` | Run the retry scheduler at all |
//! | `LEADLINE_DEMO_EVENTS` | `true` | Emit one sample event per topic on startup |

use std::env;
use std::time::Duration;

use shared_bus::DEFAULT_MAX_RETRIES;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable was set to something that does not parse.
    #[error("Invalid value for {key}: '{value}' ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    /// Retries are enabled but would run in a tight loop.
    #[error("Retry interval must be greater than zero when retries are enabled")]
    ZeroRetryInterval,
}

/// Complete runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Dead-letter retry configuration.
    pub retry: RetryConfig,
    /// Emit one sample event per topic on startup.
    pub demo_events: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            demo_events: true,
        }
    }
}

impl RuntimeConfig {
    /// Load and validate the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load and validate the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self {
            retry: RetryConfig::from_lookup(&lookup)?,
            demo_events: parse_bool(&lookup, "LEADLINE_DEMO_EVENTS", true)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.retry.validate()
    }
}

/// Dead-letter retry configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Attempts allowed per entry before it is dropped and reported.
    pub max_retries: u32,
    /// Time between scheduler passes.
    pub interval: Duration,
    /// Whether the scheduler runs.
    pub enabled: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            interval: Duration::from_secs(30),
            enabled: true,
        }
    }
}

impl RetryConfig {
    fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let max_retries = parse_number(lookup, "LEADLINE_MAX_RETRIES")?
            .map_or(Ok(defaults.max_retries), |v: u64| {
                u32::try_from(v).map_err(|e| ConfigError::InvalidValue {
                    key: "LEADLINE_MAX_RETRIES",
                    value: v.to_string(),
                    reason: e.to_string(),
                })
            })?;

        let interval = parse_number(lookup, "LEADLINE_RETRY_INTERVAL_SECS")?
            .map_or(defaults.interval, Duration::from_secs);

        Ok(Self {
            max_retries,
            interval,
            enabled: parse_bool(lookup, "LEADLINE_RETRY_ENABLED", defaults.enabled)?,
        })
    }

    /// A zero interval is only allowed when the scheduler is off.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled && self.interval.is_zero() {
            return Err(ConfigError::ZeroRetryInterval);
        }
        Ok(())
    }
}

fn parse_number<F>(lookup: &F, key: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| {
            value
                .trim()
                .parse::<u64>()
                .map_err(|e| ConfigError::InvalidValue {
                    key,
                    reason: e.to_string(),
                    value,
                })
        })
        .transpose()
}

fn parse_bool<F>(lookup: &F, key: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(value) = lookup(key) else {
        return Ok(default);
    };

    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value,
            reason: "expected true or false".to_string(),
        }),
    }
}
