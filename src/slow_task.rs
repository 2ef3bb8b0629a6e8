//! Slow Task Tracking
//!
//! Threshold-based slow task detection.
//! - Detection is based on an explicit, configured threshold
//! - Opt-in: disabled by default
//! - Deterministic: same duration + threshold produces same decision

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Slow task configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlowTaskConfig {
    /// Whether slow task tracking is enabled.
    #[serde(default)]
    pub enabled: bool,

    /// Slow task threshold in milliseconds.
    ///
    /// Tasks whose execution exceeds this duration are logged as slow.
    #[serde(default = "default_threshold_ms")]
    pub threshold_ms: u64,
}

fn default_threshold_ms() -> u64 {
    100
}

impl Default for SlowTaskConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold_ms: default_threshold_ms(),
        }
    }
}

impl SlowTaskConfig {
    /// Create a disabled configuration.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Create an enabled configuration with a custom threshold.
    pub fn with_threshold_ms(threshold_ms: u64) -> Self {
        Self {
            enabled: true,
            threshold_ms,
        }
    }

    /// Whether an execution of `elapsed` counts as slow.
    pub fn is_slow(&self, elapsed: Duration) -> bool {
        self.enabled && elapsed.as_millis() as u64 > self.threshold_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_never_slow() {
        let config = SlowTaskConfig::disabled();
        assert!(!config.is_slow(Duration::from_secs(3600)));
    }

    #[test]
    fn test_threshold_boundary() {
        let config = SlowTaskConfig::with_threshold_ms(100);
        assert!(!config.is_slow(Duration::from_millis(99)));
        assert!(!config.is_slow(Duration::from_millis(100)));
        assert!(config.is_slow(Duration::from_millis(101)));
    }

    #[test]
    fn test_default_is_disabled() {
        let config = SlowTaskConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.threshold_ms, 100);
    }
}
