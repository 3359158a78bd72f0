//! Controller configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use xds_core::{XdsError, XdsResult};

/// Tunables shared by both controllers.
///
/// Durations are written in seconds (fractions allowed).
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use xds_revision::ControllerConfig;
///
/// let config = ControllerConfig::default().with_revision_retention(3);
/// assert_eq!(config.revision_retention, 3);
/// assert_eq!(config.tainted_retry_delay, Duration::from_secs(30));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControllerConfig {
    /// Maximum number of revisions kept in a node's history.
    pub revision_retention: usize,
    /// Delay before a revision that failed to load is retried.
    #[serde(with = "seconds")]
    pub tainted_retry_delay: Duration,
    /// First delay after a transient failure.
    #[serde(with = "seconds")]
    pub error_backoff_base: Duration,
    /// Upper bound of the transient failure backoff.
    #[serde(with = "seconds")]
    pub error_backoff_max: Duration,
    /// Capacity of the store event channel.
    pub event_buffer: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            revision_retention: 10,
            tainted_retry_delay: Duration::from_secs(30),
            error_backoff_base: Duration::from_secs(1),
            error_backoff_max: Duration::from_secs(60),
            event_buffer: 1024,
        }
    }
}

impl ControllerConfig {
    /// Load from a YAML or JSON file (chosen by extension, YAML otherwise).
    pub fn from_path(path: impl AsRef<Path>) -> XdsResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            XdsError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        let config: Self = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&raw)
                .map_err(|e| XdsError::Configuration(format!("{}: {e}", path.display())))?
        } else {
            serde_yaml::from_str(&raw)
                .map_err(|e| XdsError::Configuration(format!("{}: {e}", path.display())))?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> XdsResult<()> {
        if self.revision_retention == 0 {
            return Err(XdsError::Configuration(
                "revision_retention must be at least 1".to_string(),
            ));
        }
        if self.event_buffer == 0 {
            return Err(XdsError::Configuration(
                "event_buffer must be at least 1".to_string(),
            ));
        }
        if self.error_backoff_base.is_zero() || self.error_backoff_base > self.error_backoff_max {
            return Err(XdsError::Configuration(
                "error_backoff_base must be non-zero and not exceed error_backoff_max".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_revision_retention(mut self, retention: usize) -> Self {
        self.revision_retention = retention;
        self
    }

    pub fn with_tainted_retry_delay(mut self, delay: Duration) -> Self {
        self.tainted_retry_delay = delay;
        self
    }

    pub fn with_error_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.error_backoff_base = base;
        self.error_backoff_max = max;
        self
    }

    pub fn with_event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity;
        self
    }

    /// Delay after the `failures`-th consecutive transient failure.
    pub fn backoff(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(16);
        self.error_backoff_base
            .saturating_mul(1u32 << exponent)
            .min(self.error_backoff_max)
    }
}

mod seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
