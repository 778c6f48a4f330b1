//! Configuration error types

use std::io;
use thiserror::Error;

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur when loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file
    #[error("failed to read config file '{path}': {source}")]
    IoError {
        /// Path to the file
        path: String,
        /// Underlying IO error
        #[source]
        source: io::Error,
    },

    /// Failed to parse TOML
    #[error("failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Validation error - required field missing
    #[error("[{section}] is missing required field '{field}'")]
    MissingField {
        /// Config section (e.g., "logger", "channels.usage")
        section: String,
        /// Missing field name
        field: &'static str,
    },

    /// Validation error - invalid value
    #[error("[{section}] has invalid {field}: {message}")]
    InvalidValue {
        /// Config section
        section: String,
        /// Field name
        field: &'static str,
        /// Error message
        message: String,
    },

    /// Environment override could not be applied
    #[error("invalid value for {var}: {message}")]
    InvalidEnv {
        /// Environment variable name
        var: &'static str,
        /// Error message
        message: String,
    },
}

impl ConfigError {
    /// Create a MissingField error
    pub fn missing_field(section: impl Into<String>, field: &'static str) -> Self {
        Self::MissingField {
            section: section.into(),
            field,
        }
    }

    /// Create an InvalidValue error
    pub fn invalid_value(
        section: impl Into<String>,
        field: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            section: section.into(),
            field,
            message: message.into(),
        }
    }

    /// Create an InvalidEnv error
    pub fn invalid_env(var: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidEnv {
            var,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_error() {
        let err = ConfigError::missing_field("logger", "path");
        assert!(err.to_string().contains("[logger]"));
        assert!(err.to_string().contains("path"));
    }

    #[test]
    fn test_invalid_value_error() {
        let err = ConfigError::invalid_value("channels.usage", "capacity", "must be > 0");
        let msg = err.to_string();
        assert!(msg.contains("channels.usage"));
        assert!(msg.contains("capacity"));
        assert!(msg.contains("must be > 0"));
    }

    #[test]
    fn test_invalid_env_error() {
        let err = ConfigError::invalid_env("TALLY_MAX_RETRIES", "expected an integer");
        assert!(err.to_string().contains("TALLY_MAX_RETRIES"));
        assert!(err.to_string().contains("expected an integer"));
    }

    #[test]
    fn test_io_error_keeps_source() {
        let err = ConfigError::IoError {
            path: "missing.toml".into(),
            source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
        };
        assert!(err.to_string().contains("missing.toml"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
