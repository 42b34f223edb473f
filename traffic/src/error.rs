//! Error types for the fallible edges of the crate.
//!
//! Generation itself never fails: degenerate configurations degrade to
//! partial output. Only loading configuration and template files, and
//! caller-side validation, produce errors.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for traffic operations
pub type TrafficResult<T> = Result<T, TrafficError>;

/// Errors raised while loading or validating exercise input
#[derive(Error, Debug)]
pub enum TrafficError {
    /// Exercise configuration could not be parsed
    #[error("Invalid exercise config TOML: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Exercise configuration parsed but is not usable
    #[error("Invalid exercise config: {message}")]
    InvalidConfig { message: String },

    /// Template file could not be read
    #[error("Template file {path}: {message}")]
    TemplateFile { path: PathBuf, message: String },

    /// IO error wrapper
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TrafficError {
    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a template file error
    pub fn template_file(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::TemplateFile {
            path: path.into(),
            message: message.into(),
        }
    }
}
