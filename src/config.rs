//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::{GeoDetectorError, Result};

/// Baud rates accepted for the GPS serial link
pub const STANDARD_BAUD_RATES: &[u32] = &[4800, 9600, 19200, 38400, 57600, 115200];

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub regions: RegionsConfig,
    #[serde(default)]
    pub replay: ReplayConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub events: EventsConfig,
}

/// Serial port configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    #[serde(default = "default_open_retry_interval_ms")]
    pub open_retry_interval_ms: u64,

    #[serde(default = "default_open_fail_budget")]
    pub open_fail_budget: u32,

    #[serde(default = "default_auto_open")]
    pub auto_open: bool,
}

/// Link session watchdog configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    #[serde(default = "default_open_timeout_s")]
    pub open_timeout_s: u64,

    #[serde(default = "default_data_timeout_s")]
    pub data_timeout_s: u64,

    #[serde(default = "default_sync_timeout_s")]
    pub sync_timeout_s: u64,

    #[serde(default = "default_stream_timeout_s")]
    pub stream_timeout_s: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_decode_error_limit")]
    pub decode_error_limit: u32,
}

/// Region definition file
#[derive(Debug, Deserialize, Clone, Default)]
pub struct RegionsConfig {
    #[serde(default)]
    pub file: Option<String>,
}

/// Sentence log replay
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ReplayConfig {
    /// Replay this file instead of opening the serial port
    #[serde(default)]
    pub file: Option<String>,

    #[serde(default)]
    pub line_delay_ms: u64,
}

/// Log output configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Write log files here; console only when unset
    #[serde(default)]
    pub log_dir: Option<String>,

    #[serde(default = "default_nmea_capture")]
    pub nmea_capture: bool,

    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Event recording configuration
#[derive(Debug, Deserialize, Clone)]
pub struct EventsConfig {
    /// Write rotated JSONL event logs here; stdout when unset
    #[serde(default)]
    pub jsonl_dir: Option<String>,

    #[serde(default = "default_max_records_per_file")]
    pub max_records_per_file: usize,

    #[serde(default = "default_max_files_to_keep")]
    pub max_files_to_keep: usize,
}

// Default value functions
fn default_serial_port() -> String { "/dev/ttyUSB0".to_string() }
fn default_baud_rate() -> u32 { 4800 }
fn default_read_timeout_ms() -> u64 { 1000 }
fn default_open_retry_interval_ms() -> u64 { 2000 }
fn default_open_fail_budget() -> u32 { 5 }
fn default_auto_open() -> bool { true }

fn default_open_timeout_s() -> u64 { 60 }
fn default_data_timeout_s() -> u64 { 300 }
fn default_sync_timeout_s() -> u64 { 300 }
fn default_stream_timeout_s() -> u64 { 600 }
fn default_poll_interval_ms() -> u64 { 1000 }
fn default_decode_error_limit() -> u32 { 3 }

fn default_nmea_capture() -> bool { true }
fn default_log_level() -> String { "info".to_string() }

fn default_max_records_per_file() -> usize { 10000 }
fn default_max_files_to_keep() -> usize { 10 }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            read_timeout_ms: default_read_timeout_ms(),
            open_retry_interval_ms: default_open_retry_interval_ms(),
            open_fail_budget: default_open_fail_budget(),
            auto_open: default_auto_open(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            open_timeout_s: default_open_timeout_s(),
            data_timeout_s: default_data_timeout_s(),
            sync_timeout_s: default_sync_timeout_s(),
            stream_timeout_s: default_stream_timeout_s(),
            poll_interval_ms: default_poll_interval_ms(),
            decode_error_limit: default_decode_error_limit(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: None,
            nmea_capture: default_nmea_capture(),
            level: default_log_level(),
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            jsonl_dir: None,
            max_records_per_file: default_max_records_per_file(),
            max_files_to_keep: default_max_files_to_keep(),
        }
    }
}

fn invalid(message: impl std::fmt::Display) -> GeoDetectorError {
    GeoDetectorError::Config(toml::de::Error::custom(message))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use geo_detector::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        // Validate serial port configuration
        if self.serial.port.is_empty() {
            return Err(invalid("serial port cannot be empty"));
        }

        if !STANDARD_BAUD_RATES.contains(&self.serial.baud_rate) {
            return Err(invalid(format!(
                "baud_rate must be one of: {:?}",
                STANDARD_BAUD_RATES
            )));
        }

        if self.serial.read_timeout_ms == 0 || self.serial.read_timeout_ms > 10000 {
            return Err(invalid("read_timeout_ms must be between 1 and 10000"));
        }

        if self.serial.open_retry_interval_ms == 0 || self.serial.open_retry_interval_ms > 60000 {
            return Err(invalid("open_retry_interval_ms must be between 1 and 60000"));
        }

        if self.serial.open_fail_budget == 0 {
            return Err(invalid("open_fail_budget must be greater than 0"));
        }

        // Validate watchdogs
        for (name, value) in [
            ("open_timeout_s", self.session.open_timeout_s),
            ("data_timeout_s", self.session.data_timeout_s),
            ("sync_timeout_s", self.session.sync_timeout_s),
            ("stream_timeout_s", self.session.stream_timeout_s),
        ] {
            if value == 0 {
                return Err(invalid(format!("{} must be greater than 0", name)));
            }
        }

        if self.session.stream_timeout_s <= self.session.data_timeout_s {
            return Err(invalid("stream_timeout_s must be greater than data_timeout_s"));
        }

        if self.session.poll_interval_ms == 0 || self.session.poll_interval_ms > 10000 {
            return Err(invalid("poll_interval_ms must be between 1 and 10000"));
        }

        if self.session.decode_error_limit == 0 {
            return Err(invalid("decode_error_limit must be greater than 0"));
        }

        // Validate replay throttling
        if self.replay.line_delay_ms > 60000 {
            return Err(invalid("line_delay_ms must be between 0 and 60000"));
        }

        // Validate logging
        if self.logging.level.parse::<tracing::Level>().is_err() {
            return Err(invalid(format!(
                "log level must be one of: trace, debug, info, warn, error (got {:?})",
                self.logging.level
            )));
        }

        if matches!(&self.logging.log_dir, Some(dir) if dir.is_empty()) {
            return Err(invalid("log_dir cannot be empty when set"));
        }

        // Validate event log limits
        if matches!(&self.events.jsonl_dir, Some(dir) if dir.is_empty()) {
            return Err(invalid("jsonl_dir cannot be empty when set"));
        }

        if self.events.max_records_per_file == 0 {
            return Err(invalid("max_records_per_file must be greater than 0"));
        }

        if self.events.max_files_to_keep == 0 {
            return Err(invalid("max_files_to_keep must be greater than 0"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.serial.port, "/dev/ttyUSB0");
        assert_eq!(config.serial.baud_rate, 4800);
        assert!(config.serial.auto_open);
        assert_eq!(config.session.stream_timeout_s, 600);
        assert!(config.regions.file.is_none());
        assert!(config.replay.file.is_none());
        assert!(config.events.jsonl_dir.is_none());
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let toml_content = r#"
[serial]
port = "/dev/ttyACM0"
baud_rate = 9600

[session]
data_timeout_s = 120

[regions]
file = "config/virginia.kml"

[replay]
file = "logs/nmea.txt"
line_delay_ms = 100

[logging]
log_dir = "./logs"
level = "debug"

[events]
jsonl_dir = "./logs/events"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.serial.port, "/dev/ttyACM0");
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.serial.read_timeout_ms, 1000);
        assert_eq!(config.session.data_timeout_s, 120);
        assert_eq!(config.regions.file.as_deref(), Some("config/virginia.kml"));
        assert_eq!(config.replay.line_delay_ms, 100);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.nmea_capture);
        assert_eq!(config.events.max_files_to_keep, 10);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            Config::load("/nonexistent/geo-detector.toml"),
            Err(GeoDetectorError::Io(_))
        ));
    }

    #[test]
    fn test_malformed_toml() {
        assert!(matches!(
            Config::parse("[serial]\nbaud_rate = \"fast\""),
            Err(GeoDetectorError::Config(_))
        ));
    }

    #[test]
    fn test_empty_serial_port() {
        let mut config = Config::default();
        config.serial.port = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_baud_rate() {
        let mut config = Config::default();
        config.serial.baud_rate = 420000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_valid_baud_rates() {
        for &baud in STANDARD_BAUD_RATES {
            let mut config = Config::default();
            config.serial.baud_rate = baud;
            assert!(config.validate().is_ok(), "Baud rate {} should be valid", baud);
        }
    }

    #[test]
    fn test_read_timeout_bounds() {
        let mut config = Config::default();
        config.serial.read_timeout_ms = 0;
        assert!(config.validate().is_err());
        config.serial.read_timeout_ms = 10001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_open_retry_interval_bounds() {
        let mut config = Config::default();
        config.serial.open_retry_interval_ms = 0;
        assert!(config.validate().is_err());
        config.serial.open_retry_interval_ms = 60001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_open_fail_budget_zero() {
        let mut config = Config::default();
        config.serial.open_fail_budget = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_watchdog() {
        let mut config = Config::default();
        config.session.sync_timeout_s = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_stream_timeout_must_exceed_data_timeout() {
        let mut config = Config::default();
        config.session.stream_timeout_s = config.session.data_timeout_s;
        assert!(config.validate().is_err());

        config.session.stream_timeout_s = config.session.data_timeout_s + 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_decode_error_limit_zero() {
        let mut config = Config::default();
        config.session.decode_error_limit = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_line_delay_too_high() {
        let mut config = Config::default();
        config.replay.line_delay_ms = 60001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_log_dir() {
        let mut config = Config::default();
        config.logging.log_dir = Some(String::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_event_log_limits() {
        let mut config = Config::default();
        config.events.max_records_per_file = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.events.max_files_to_keep = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.events.jsonl_dir = Some(String::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_functions() {
        assert_eq!(default_serial_port(), "/dev/ttyUSB0");
        assert_eq!(default_baud_rate(), 4800);
        assert_eq!(default_read_timeout_ms(), 1000);
        assert_eq!(default_open_retry_interval_ms(), 2000);
        assert_eq!(default_open_fail_budget(), 5);
        assert_eq!(default_open_timeout_s(), 60);
        assert_eq!(default_data_timeout_s(), 300);
        assert_eq!(default_sync_timeout_s(), 300);
        assert_eq!(default_stream_timeout_s(), 600);
        assert_eq!(default_decode_error_limit(), 3);
        assert_eq!(default_log_level(), "info");
        assert_eq!(default_max_records_per_file(), 10000);
        assert_eq!(default_max_files_to_keep(), 10);
    }
}
