//! Configuration for the synchrony streamer.

use crate::core::correlation::DEFAULT_MIN_SAMPLES;
use crate::sensor::types::SensorKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the frame server binds to
    pub host: String,

    /// Port the frame server binds to (0 for random)
    pub port: u16,

    /// Maximum session length; zero disables the limit
    #[serde(with = "duration_secs")]
    pub session_duration: Duration,

    /// Cadence of the compute-and-broadcast tick
    #[serde(with = "duration_millis")]
    pub tick_interval: Duration,

    /// Samples retained per channel in live mode
    pub window_capacity: usize,

    /// Minimum samples per window before a correlation is computed
    pub min_samples: usize,

    /// Kind of live sensor feeding channel A
    pub sensor_kind: SensorKind,

    /// Noise of the synthetic companion channel; falls back to the kind's default
    pub companion_noise_std: Option<f64>,

    /// Seed for the companion noise, for reproducible sessions
    pub seed: Option<u64>,

    /// Frames buffered per subscriber before it is considered too slow
    pub subscriber_queue: usize,

    /// Notifications buffered between the sensor and the scheduler
    pub ingest_queue: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            session_duration: Duration::from_secs(600),
            tick_interval: Duration::from_secs(1),
            window_capacity: 30,
            min_samples: DEFAULT_MIN_SAMPLES,
            sensor_kind: SensorKind::HeartRate,
            companion_noise_std: None,
            seed: None,
            subscriber_queue: 16,
            ingest_queue: 1024,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(&config_path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pulse-sync")
            .join("config.json")
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_capacity == 0 {
            return Err(ConfigError::Invalid("window_capacity must be positive".into()));
        }
        if self.tick_interval.is_zero() {
            return Err(ConfigError::Invalid("tick_interval must be positive".into()));
        }
        if self.min_samples < 2 {
            return Err(ConfigError::Invalid("min_samples must be at least 2".into()));
        }
        if self.min_samples > self.window_capacity {
            return Err(ConfigError::Invalid(format!(
                "min_samples ({}) exceeds window_capacity ({})",
                self.min_samples, self.window_capacity
            )));
        }
        if let Some(std) = self.companion_noise_std {
            if !std.is_finite() || std < 0.0 {
                return Err(ConfigError::Invalid(
                    "companion_noise_std must be a non-negative number".into(),
                ));
            }
        }
        if self.subscriber_queue == 0 || self.ingest_queue == 0 {
            return Err(ConfigError::Invalid("queue sizes must be positive".into()));
        }
        Ok(())
    }

    /// Session limit, if any.
    pub fn max_session(&self) -> Option<Duration> {
        if self.session_duration.is_zero() {
            None
        } else {
            Some(self.session_duration)
        }
    }

    /// Effective companion noise for the configured sensor kind.
    pub fn noise_std(&self) -> f64 {
        self.companion_noise_std
            .unwrap_or_else(|| self.sensor_kind.default_noise_std())
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Serialize error: {0}")]
    SerializeError(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Serde support for Duration as whole seconds.
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

/// Serde support for Duration as milliseconds.
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
