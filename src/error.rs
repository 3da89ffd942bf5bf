//! # Error Types
//!
//! Custom error types for Geo Detector using `thiserror`.

use thiserror::Error;

/// Main error type for Geo Detector
#[derive(Debug, Error)]
pub enum GeoDetectorError {
    /// A required sentence field is missing or empty
    #[error("Malformed {sentence} sentence: missing {field}")]
    MalformedField {
        sentence: &'static str,
        field: &'static str,
    },

    /// A sentence field is present but is not the expected number
    #[error("Invalid {field} value: {value:?}")]
    NumericParse { field: &'static str, value: String },

    /// Bytes received from the link are not valid text
    #[error("Link data is not valid text: {0}")]
    TextDecoding(#[from] std::str::Utf8Error),

    /// Device or transport failure on an open link
    #[error("Link I/O error: {0}")]
    LinkIo(std::io::Error),

    /// Serial port could not be opened or configured
    #[error("Serial port error: {0}")]
    Serial(String),

    /// Region definition file is unreadable or malformed
    #[error("Region source error: {0}")]
    RegionSource(String),

    /// The session worker has already exited
    #[error("Link session is no longer running")]
    SessionStopped,

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Geo Detector
pub type Result<T> = std::result::Result<T, GeoDetectorError>;
