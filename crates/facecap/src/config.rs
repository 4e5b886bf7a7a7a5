//! Configuration management for facecap.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::session::SessionSettings;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default config directory name.
const APP_DIR_NAME: &str = "facecap";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `FACECAP_`, with `__` between
///    the section and the key: `FACECAP_CAPTURE__BUFFER_CAPACITY`)
/// 2. TOML config file at `~/.config/facecap/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Capture configuration.
    pub capture: CaptureConfig,
    /// Training configuration.
    pub training: TrainingConfig,
    /// Attendance endpoint configuration.
    pub attendance: AttendanceConfig,
}

/// Capture-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Maximum number of captures retained; oldest are evicted first.
    pub buffer_capacity: usize,
    /// Minimum frames per capture batch.
    pub batch_min: usize,
    /// Maximum frames per capture batch.
    pub batch_max: usize,
    /// Delay before auto-advancing to the next stage, in milliseconds.
    pub advance_delay_ms: u64,
    /// Delay before recapturing after a retry, in milliseconds.
    pub retry_delay_ms: u64,
}

/// Training-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// How long the simulated trainer takes, in milliseconds.
    pub simulated_duration_ms: u64,
}

/// Attendance endpoint configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttendanceConfig {
    /// Base URL of the recognition backend.
    pub base_url: String,
    /// Per-request timeout, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 7,
            batch_min: 1,
            batch_max: 3,
            advance_delay_ms: 1500,
            retry_delay_ms: 500,
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            simulated_duration_ms: 3000,
        }
    }
}

impl Default for AttendanceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://192.168.0.100:8000".to_string(),
            request_timeout_secs: 10,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file (if exists)
    /// 3. Environment variables (prefixed with `FACECAP_`, `__`-separated)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file).nested())
            .merge(Env::prefixed("FACECAP_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(APP_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.capture.buffer_capacity == 0 {
            return Err(Error::ConfigValidation {
                message: "buffer_capacity must be greater than 0".to_string(),
            });
        }

        if self.capture.batch_min == 0 {
            return Err(Error::ConfigValidation {
                message: "batch_min must be greater than 0".to_string(),
            });
        }

        if self.capture.batch_min > self.capture.batch_max {
            return Err(Error::ConfigValidation {
                message: format!(
                    "batch_min ({}) cannot be greater than batch_max ({})",
                    self.capture.batch_min, self.capture.batch_max
                ),
            });
        }

        if self.attendance.base_url.is_empty() {
            return Err(Error::ConfigValidation {
                message: "attendance base_url must not be empty".to_string(),
            });
        }

        if self.attendance.request_timeout_secs == 0 {
            return Err(Error::ConfigValidation {
                message: "request_timeout_secs must be greater than 0".to_string(),
            });
        }

        Ok(())
    }

    /// Get the auto-advance delay as a Duration.
    #[must_use]
    pub fn advance_delay(&self) -> Duration {
        Duration::from_millis(self.capture.advance_delay_ms)
    }

    /// Get the retry delay as a Duration.
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.capture.retry_delay_ms)
    }

    /// Get the simulated training duration as a Duration.
    #[must_use]
    pub fn simulated_training_duration(&self) -> Duration {
        Duration::from_millis(self.training.simulated_duration_ms)
    }

    /// Session settings derived from this configuration.
    #[must_use]
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            buffer_capacity: self.capture.buffer_capacity,
            advance_delay: self.advance_delay(),
            retry_delay: self.retry_delay(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.capture.buffer_capacity, 7);
        assert_eq!(config.capture.batch_min, 1);
        assert_eq!(config.capture.batch_max, 3);
        assert_eq!(config.capture.advance_delay_ms, 1500);
        assert_eq!(config.capture.retry_delay_ms, 500);
        assert_eq!(config.training.simulated_duration_ms, 3000);
    }

    #[test]
    fn test_validate_valid_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_capacity() {
        let mut config = Config::default();
        config.capture.buffer_capacity = 0;

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("buffer_capacity"));
    }

    #[test]
    fn test_validate_zero_batch_min() {
        let mut config = Config::default();
        config.capture.batch_min = 0;

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("batch_min"));
    }

    #[test]
    fn test_validate_batch_range() {
        let mut config = Config::default();
        config.capture.batch_min = 5;
        config.capture.batch_max = 2;

        let result = config.validate();
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("batch_min"));
        assert!(err.contains("batch_max"));
    }

    #[test]
    fn test_validate_empty_base_url() {
        let mut config = Config::default();
        config.attendance.base_url = String::new();

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_timeout() {
        let mut config = Config::default();
        config.attendance.request_timeout_secs = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_advance_delay() {
        let config = Config::default();
        assert_eq!(config.advance_delay(), Duration::from_millis(1500));
    }

    #[test]
    fn test_retry_delay() {
        let config = Config::default();
        assert_eq!(config.retry_delay(), Duration::from_millis(500));
    }

    #[test]
    fn test_simulated_training_duration() {
        let config = Config::default();
        assert_eq!(
            config.simulated_training_duration(),
            Duration::from_secs(3)
        );
    }

    #[test]
    fn test_session_settings() {
        let config = Config::default();
        let settings = config.session_settings();

        assert_eq!(settings.buffer_capacity, 7);
        assert_eq!(settings.advance_delay, Duration::from_millis(1500));
        assert_eq!(settings.retry_delay, Duration::from_millis(500));
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("facecap"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        // Loading from a nonexistent path should work (uses defaults)
        let result = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml")));
        assert!(result.is_ok());

        let config = result.unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_env_overrides_nested_key() {
        // Keys with underscores in their names need the double-underscore
        // section separator to survive the split.
        figment::Jail::expect_with(|jail| {
            jail.set_env("FACECAP_CAPTURE__BUFFER_CAPACITY", "9");
            jail.set_env("FACECAP_ATTENDANCE__BASE_URL", "http://10.0.0.1:9000");

            let config = Config::load_from(Some(PathBuf::from("missing.toml")))
                .expect("config should load from env + defaults");
            assert_eq!(config.capture.buffer_capacity, 9);
            assert_eq!(config.attendance.base_url, "http://10.0.0.1:9000");
            Ok(())
        });
    }

    #[test]
    fn test_env_override_is_validated() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("FACECAP_CAPTURE__BUFFER_CAPACITY", "0");

            let result = Config::load_from(Some(PathBuf::from("missing.toml")));
            assert!(result.is_err());
            Ok(())
        });
    }

    #[test]
    fn test_capture_config_serialize() {
        let capture = CaptureConfig::default();
        let json = serde_json::to_string(&capture).unwrap();
        assert!(json.contains("buffer_capacity"));
    }

    #[test]
    fn test_capture_config_deserialize() {
        let json = r#"{"buffer_capacity": 10, "advance_delay_ms": 2000}"#;
        let capture: CaptureConfig = serde_json::from_str(json).unwrap();
        assert_eq!(capture.buffer_capacity, 10);
        assert_eq!(capture.advance_delay_ms, 2000);
        // Unspecified fields fall back to defaults
        assert_eq!(capture.batch_max, 3);
    }

    #[test]
    fn test_attendance_config_serialize() {
        let attendance = AttendanceConfig::default();
        let json = serde_json::to_string(&attendance).unwrap();
        assert!(json.contains("base_url"));
    }

    #[test]
    fn test_config_clone() {
        let config = Config::default();
        let cloned = config.clone();
        assert_eq!(config, cloned);
    }
}
