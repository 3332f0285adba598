//! Configuration for the visitor tracker.

use crate::scoring::ScoringStrategy;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Longest report window accepted in a config file, in days.
pub const MAX_REPORT_WINDOW_DAYS: u32 = 3650;

/// Main configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Interval of the active-time accumulator
    #[serde(with = "duration_ms_serde")]
    pub tick_interval: Duration,

    /// Interval between heartbeat writes
    #[serde(with = "duration_ms_serde")]
    pub heartbeat_interval: Duration,

    /// Trailing window covered by reports, in days
    pub report_window_days: u32,

    /// Maximum sessions per report
    pub report_max_records: usize,

    /// Intent scoring policy
    pub scoring: ScoringStrategy,

    /// IANA timezone for report timestamps
    pub report_timezone: String,

    /// Look up the visitor's public IP (needs the `remote` feature)
    pub ip_lookup: bool,

    /// Directory reports are written to
    pub export_path: PathBuf,

    /// Directory for the document store, local storage and tracking stats
    pub data_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("portfolio-insights");

        Self {
            tick_interval: Duration::from_secs(1),
            heartbeat_interval: Duration::from_secs(15),
            report_window_days: 7,
            report_max_records: 500,
            scoring: ScoringStrategy::default(),
            report_timezone: "UTC".to_string(),
            ip_lookup: true,
            export_path: data_dir.join("reports"),
            data_path: data_dir,
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
            .join("portfolio-insights")
            .join("config.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.export_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        std::fs::create_dir_all(self.store_path())
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Reject values the tracker cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval.is_zero() || self.heartbeat_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "tick and heartbeat intervals must be positive".to_string(),
            ));
        }
        if self.report_window_days == 0 || self.report_window_days > MAX_REPORT_WINDOW_DAYS {
            return Err(ConfigError::Invalid(format!(
                "report_window_days must be between 1 and {MAX_REPORT_WINDOW_DAYS}"
            )));
        }
        if self.report_max_records == 0 {
            return Err(ConfigError::Invalid(
                "report_max_records must be at least 1".to_string(),
            ));
        }
        if self.report_timezone.parse::<Tz>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "unknown timezone '{}'",
                self.report_timezone
            )));
        }
        Ok(())
    }

    /// Report timezone, UTC if the configured name is unknown.
    pub fn timezone(&self) -> Tz {
        self.report_timezone.parse().unwrap_or(Tz::UTC)
    }

    /// Root of the file-backed document store.
    pub fn store_path(&self) -> PathBuf {
        self.data_path.join("store")
    }

    /// Local key store holding the client id.
    pub fn local_storage_path(&self) -> PathBuf {
        self.data_path.join("local_storage.json")
    }

    /// Persisted tracking statistics.
    pub fn tracking_log_path(&self) -> PathBuf {
        self.data_path.join("tracking.json")
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
            ConfigError::Invalid(e) => write!(f, "Invalid configuration: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration as milliseconds.
mod duration_ms_serde {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.tick_interval, Duration::from_secs(1));
        assert_eq!(config.heartbeat_interval, Duration::from_secs(15));
        assert_eq!(config.report_window_days, 7);
        assert_eq!(config.scoring, ScoringStrategy::Additive);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_json_round_trip() {
        let config = Config {
            heartbeat_interval: Duration::from_millis(250),
            scoring: ScoringStrategy::Weighted,
            report_timezone: "Asia/Beirut".to_string(),
            ..Config::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"heartbeat_interval\":250"));
        assert!(json.contains("\"weighted\""));

        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.heartbeat_interval, Duration::from_millis(250));
        assert_eq!(parsed.scoring, ScoringStrategy::Weighted);
        assert_eq!(parsed.timezone(), chrono_tz::Asia::Beirut);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: Config = serde_json::from_str(r#"{ "report_window_days": 30 }"#).unwrap();
        assert_eq!(parsed.report_window_days, 30);
        assert_eq!(parsed.tick_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_validation() {
        let config = Config {
            report_timezone: "Mars/Olympus".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
        assert_eq!(config.timezone(), Tz::UTC);

        let config = Config {
            tick_interval: Duration::ZERO,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            report_window_days: u32::MAX,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
