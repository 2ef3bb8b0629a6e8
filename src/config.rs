//! Configuration
//!
//! All pipeline tunables in one serde struct, loadable from a TOML file.
//! Every field has an explicit default and validation runs at startup,
//! reporting every invalid field at once rather than stopping at the first.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::slow_task::SlowTaskConfig;
use crate::workload::WorkloadConfig;

/// Pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowgateConfig {
    /// Sustained admission rate in requests per second (0 = unlimited).
    #[serde(default = "default_rate_per_second")]
    pub rate_per_second: u32,

    /// Maximum burst admitted above the sustained rate.
    #[serde(default = "default_burst_capacity")]
    pub burst_capacity: u32,

    /// Maximum admitted-but-unprocessed tasks.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Maximum simultaneously executing tasks.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Wall-clock bound on a single task's execution (ms).
    #[serde(default = "default_task_timeout_ms")]
    pub task_timeout_ms: u64,

    /// Interval between observer status lines (ms).
    #[serde(default = "default_observer_interval_ms")]
    pub observer_interval_ms: u64,

    /// Utilization percentage at which load status becomes Warning.
    #[serde(default = "default_warning_threshold_percent")]
    pub warning_threshold_percent: u8,

    /// Utilization percentage at which load status becomes Critical.
    #[serde(default = "default_critical_threshold_percent")]
    pub critical_threshold_percent: u8,

    /// Slow task tracking.
    #[serde(default)]
    pub slow_task: SlowTaskConfig,

    /// Simulated workload used by the demo driver.
    #[serde(default)]
    pub workload: WorkloadConfig,
}

fn default_rate_per_second() -> u32 {
    100
}

fn default_burst_capacity() -> u32 {
    20
}

fn default_queue_capacity() -> usize {
    64
}

fn default_max_concurrency() -> usize {
    8
}

fn default_task_timeout_ms() -> u64 {
    1000
}

fn default_observer_interval_ms() -> u64 {
    1000
}

fn default_warning_threshold_percent() -> u8 {
    75
}

fn default_critical_threshold_percent() -> u8 {
    90
}

impl Default for FlowgateConfig {
    fn default() -> Self {
        Self {
            rate_per_second: default_rate_per_second(),
            burst_capacity: default_burst_capacity(),
            queue_capacity: default_queue_capacity(),
            max_concurrency: default_max_concurrency(),
            task_timeout_ms: default_task_timeout_ms(),
            observer_interval_ms: default_observer_interval_ms(),
            warning_threshold_percent: default_warning_threshold_percent(),
            critical_threshold_percent: default_critical_threshold_percent(),
            slow_task: SlowTaskConfig::default(),
            workload: WorkloadConfig::default(),
        }
    }
}

impl FlowgateConfig {
    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        config.validate().map_err(ConfigError::Invalid)?;
        Ok(config)
    }

    /// Load a configuration file, or fall back to defaults when it does not
    /// exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate every field, collecting all errors.
    pub fn validate(&self) -> Result<(), Vec<ConfigValidationError>> {
        let mut validator = ConfigValidator::new();

        if self.rate_per_second > 0 {
            validator.validate_positive("burst_capacity", self.burst_capacity as i64);
        }
        validator.validate_positive("queue_capacity", self.queue_capacity as i64);
        validator.validate_positive("max_concurrency", self.max_concurrency as i64);
        validator.validate_positive("task_timeout_ms", self.task_timeout_ms as i64);
        validator.validate_positive("observer_interval_ms", self.observer_interval_ms as i64);
        validator.validate_range(
            "warning_threshold_percent",
            self.warning_threshold_percent as i64,
            1,
            100,
        );
        validator.validate_range(
            "critical_threshold_percent",
            self.critical_threshold_percent as i64,
            1,
            100,
        );
        validator.validate_below(
            "warning_threshold_percent",
            self.warning_threshold_percent as i64,
            "critical_threshold_percent",
            self.critical_threshold_percent as i64,
        );
        validator.validate_range("failure_percent", self.workload.failure_percent as i64, 0, 100);
        if self.workload.max_latency_ms < self.workload.min_latency_ms {
            validator.error(
                "max_latency_ms",
                self.workload.max_latency_ms,
                "Must not be below min_latency_ms",
            );
        }

        validator.finish()
    }
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {}", .path.display(), .source)]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid configuration: {} error(s)", .0.len())]
    Invalid(Vec<ConfigValidationError>),
}

/// A single rejected configuration field.
#[derive(Debug)]
pub struct ConfigValidationError {
    pub field: String,
    pub value: String,
    pub message: String,
}

impl fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid configuration for '{}': {} (value: {})",
            self.field, self.message, self.value
        )
    }
}

impl std::error::Error for ConfigValidationError {}

/// Accumulating validator: reports every invalid field, not just the first.
pub struct ConfigValidator {
    errors: Vec<ConfigValidationError>,
}

impl ConfigValidator {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    fn error(&mut self, field: &str, value: impl fmt::Display, message: &str) {
        self.errors.push(ConfigValidationError {
            field: field.to_string(),
            value: value.to_string(),
            message: message.to_string(),
        });
    }

    /// Validate strictly positive integer.
    pub fn validate_positive(&mut self, field: &str, value: i64) -> &mut Self {
        if value <= 0 {
            self.error(field, value, "Value must be positive");
        }
        self
    }

    /// Validate range (inclusive).
    pub fn validate_range(&mut self, field: &str, value: i64, min: i64, max: i64) -> &mut Self {
        if value < min || value > max {
            self.error(
                field,
                value,
                &format!("Value must be between {} and {}", min, max),
            );
        }
        self
    }

    /// Validate that one field stays strictly below another.
    pub fn validate_below(
        &mut self,
        field: &str,
        value: i64,
        other_field: &str,
        other_value: i64,
    ) -> &mut Self {
        if value >= other_value {
            self.error(
                field,
                value,
                &format!("Value must be below {} ({})", other_field, other_value),
            );
        }
        self
    }

    pub fn finish(self) -> Result<(), Vec<ConfigValidationError>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}
