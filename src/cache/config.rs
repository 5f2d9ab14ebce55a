//! Cache configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Instant;

/// Errors produced while building or loading a [`CacheConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("ttl must be greater than zero")]
    ZeroTtl,

    #[error("sweep interval must be greater than zero")]
    ZeroSweepInterval,

    #[error("{setting} of {value:?} is too far in the future to schedule")]
    OutOfRange {
        setting: &'static str,
        value: Duration,
    },

    #[error("invalid cache configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Settings for a [`TtlCache`](super::TtlCache).
///
/// Durations are expressed in milliseconds when (de)serialized.
///
/// | Setting             | Default             |
/// |---------------------|---------------------|
/// | `ttl`               | *(required)*        |
/// | `sweep_interval`    | same as `ttl`       |
/// | `simulated_latency` | zero                |
///
/// Because a sweep only runs once per `sweep_interval`, an entry can stay
/// readable for up to `ttl + sweep_interval` after it was written.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use rttp_cache::cache::CacheConfig;
///
/// let config = CacheConfig::new(Duration::from_secs(30))
///     .with_simulated_latency(Duration::from_millis(5));
/// assert_eq!(config.sweep_interval(), Duration::from_secs(30));
///
/// let loaded = CacheConfig::from_json(r#"{ "ttl_ms": 1000, "sweep_interval_ms": 250 }"#).unwrap();
/// assert_eq!(loaded.ttl(), Duration::from_secs(1));
/// assert_eq!(loaded.sweep_interval(), Duration::from_millis(250));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(rename = "ttl_ms", with = "millis")]
    ttl: Duration,

    #[serde(
        rename = "sweep_interval_ms",
        with = "opt_millis",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    sweep_interval: Option<Duration>,

    #[serde(rename = "simulated_latency_ms", with = "millis", default)]
    simulated_latency: Duration,
}

impl CacheConfig {
    /// Creates a configuration with the given TTL and all other settings at
    /// their defaults.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sweep_interval: None,
            simulated_latency: Duration::ZERO,
        }
    }

    /// Parses and validates a JSON document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Overrides how often the sweeper scans for expired entries.
    #[must_use]
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = Some(interval);
        self
    }

    /// Adds a fixed delay before every read and write, emulating a remote
    /// cache layer.
    #[must_use]
    pub fn with_simulated_latency(mut self, latency: Duration) -> Self {
        self.simulated_latency = latency;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval.unwrap_or(self.ttl)
    }

    pub fn simulated_latency(&self) -> Duration {
        self.simulated_latency
    }

    /// Rejects settings the sweeper cannot run with.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::ZeroTtl`] if the TTL is zero.
    /// - [`ConfigError::ZeroSweepInterval`] if the effective sweep interval is zero.
    /// - [`ConfigError::OutOfRange`] if the TTL or sweep interval, counted
    ///   from now, overflows the clock.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ttl.is_zero() {
            return Err(ConfigError::ZeroTtl);
        }
        let interval = self.sweep_interval();
        if interval.is_zero() {
            return Err(ConfigError::ZeroSweepInterval);
        }

        let now = Instant::now();
        for (setting, value) in [("ttl", self.ttl), ("sweep interval", interval)] {
            if now.checked_add(value).is_none() {
                return Err(ConfigError::OutOfRange { setting, value });
            }
        }
        Ok(())
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

mod opt_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => super::millis::serialize(d, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(deserializer).map(|ms| ms.map(Duration::from_millis))
    }
}
