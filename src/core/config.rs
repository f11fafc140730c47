//! Watchdog options
//!
//! Recognized options and their JSON representation. Field names on disk
//! follow the option names used by the host SDK (`pollInterval`,
//! `thresholdMs`, `errorThreshold`, `inspect`, ...).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::watchdog::monitor::{MonitorConfig, DEFAULT_TICK_INTERVAL_MS};
use crate::watchdog::HEARTBEAT_INTERVAL_MS;

/// Default delay above the poll interval that counts as a stall
pub const DEFAULT_WARNING_THRESHOLD_MS: u64 = 200;

/// Default delay above the poll interval that counts as hung
pub const DEFAULT_HUNG_THRESHOLD_MS: u64 = 5000;

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration result type
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Watchdog options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnrOptions {
    /// Expected heartbeat cadence
    #[serde(rename = "pollInterval")]
    pub poll_interval_ms: u64,

    /// Delay above the poll interval reported as a stall
    #[serde(rename = "warningThreshold", alias = "thresholdMs")]
    pub warning_threshold_ms: u64,

    /// Delay above the poll interval after which a stack capture is attempted
    #[serde(rename = "hungThreshold", alias = "errorThreshold")]
    pub hung_threshold_ms: u64,

    /// Whether to hand a debugger endpoint to the monitoring side
    #[serde(rename = "captureStackTrace", alias = "inspect")]
    pub capture_stack_trace: bool,

    /// Monitor evaluation period
    #[serde(rename = "tickInterval")]
    pub tick_interval_ms: u64,
}

impl Default for AnrOptions {
    fn default() -> Self {
        Self {
            poll_interval_ms: HEARTBEAT_INTERVAL_MS,
            warning_threshold_ms: DEFAULT_WARNING_THRESHOLD_MS,
            hung_threshold_ms: DEFAULT_HUNG_THRESHOLD_MS,
            capture_stack_trace: false,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
        }
    }
}

impl AnrOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    pub fn with_warning_threshold(mut self, ms: u64) -> Self {
        self.warning_threshold_ms = ms;
        self
    }

    pub fn with_hung_threshold(mut self, ms: u64) -> Self {
        self.hung_threshold_ms = ms;
        self
    }

    pub fn with_capture_stack_trace(mut self, enabled: bool) -> Self {
        self.capture_stack_trace = enabled;
        self
    }

    pub fn with_tick_interval(mut self, ms: u64) -> Self {
        self.tick_interval_ms = ms;
        self
    }

    /// Check the options for values the monitor cannot work with
    pub fn validate(&self) -> ConfigResult<()> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("pollInterval must be non-zero".to_string()));
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid("tickInterval must be non-zero".to_string()));
        }
        if self.poll_interval_ms.checked_add(self.hung_threshold_ms).is_none() {
            return Err(ConfigError::Invalid(format!(
                "pollInterval ({}ms) plus hungThreshold ({}ms) is out of range",
                self.poll_interval_ms, self.hung_threshold_ms
            )));
        }
        if self.hung_threshold_ms < self.warning_threshold_ms {
            return Err(ConfigError::Invalid(format!(
                "hungThreshold ({}ms) is below warningThreshold ({}ms)",
                self.hung_threshold_ms, self.warning_threshold_ms
            )));
        }
        Ok(())
    }

    /// Load options from a JSON file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path)?;
        let options: Self = serde_json::from_str(&content)?;
        options.validate()?;

        tracing::debug!("Loaded watchdog options from {:?}", path);
        Ok(options)
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            poll_interval_ms: self.poll_interval_ms,
            warning_threshold_ms: self.warning_threshold_ms,
            hung_threshold_ms: self.hung_threshold_ms,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let options = AnrOptions::default();
        assert_eq!(options.poll_interval_ms, 50);
        assert_eq!(options.warning_threshold_ms, 200);
        assert_eq!(options.hung_threshold_ms, 5000);
        assert_eq!(options.tick_interval_ms, 10);
        assert!(!options.capture_stack_trace);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_aliases_are_accepted() {
        let options: AnrOptions = serde_json::from_str(
            r#"{"pollInterval": 100, "thresholdMs": 300, "errorThreshold": 2000, "inspect": true}"#,
        )
        .unwrap();

        assert_eq!(options.poll_interval_ms, 100);
        assert_eq!(options.warning_threshold_ms, 300);
        assert_eq!(options.hung_threshold_ms, 2000);
        assert!(options.capture_stack_trace);
        assert_eq!(options.tick_interval_ms, DEFAULT_TICK_INTERVAL_MS);
    }

    #[test]
    fn test_validation() {
        assert!(AnrOptions::new().with_poll_interval(0).validate().is_err());
        assert!(AnrOptions::new().with_tick_interval(0).validate().is_err());
        assert!(AnrOptions::new()
            .with_warning_threshold(500)
            .with_hung_threshold(100)
            .validate()
            .is_err());
    }

    #[test]
    fn test_overflowing_limits_rejected() {
        let options = AnrOptions::new()
            .with_poll_interval(u64::MAX)
            .with_warning_threshold(10)
            .with_hung_threshold(20);
        assert!(matches!(options.validate(), Err(ConfigError::Invalid(_))));

        let options = AnrOptions::new()
            .with_poll_interval(50)
            .with_hung_threshold(u64::MAX - 49);
        assert!(options.validate().is_ok());
        assert!(options.with_poll_interval(51).validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("anr.json");
        std::fs::write(&path, r#"{"pollInterval": 20, "captureStackTrace": true}"#).unwrap();

        let options = AnrOptions::load(&path).unwrap();
        assert_eq!(options.poll_interval_ms, 20);
        assert!(options.capture_stack_trace);
        assert_eq!(options.hung_threshold_ms, DEFAULT_HUNG_THRESHOLD_MS);
    }

    #[test]
    fn test_load_missing_and_invalid() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing.json");
        assert!(matches!(AnrOptions::load(&missing), Err(ConfigError::NotFound(_))));

        let invalid = temp_dir.path().join("invalid.json");
        std::fs::write(&invalid, r#"{"pollInterval": 0}"#).unwrap();
        assert!(matches!(AnrOptions::load(&invalid), Err(ConfigError::Invalid(_))));
    }
}
