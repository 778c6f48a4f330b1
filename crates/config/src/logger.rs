//! Usage logger (cost record sink) configuration

use serde::Deserialize;
use std::time::Duration;

/// Where cost records are written
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LoggerSinkKind {
    /// Structured tracing event (default)
    #[default]
    Log,
    /// Standard output
    Stdout,
    /// Append to a file
    File,
}

/// Line format for stdout and file sinks
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// `userId=user1 callCost=5.0 dataCost=2.0` (default)
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// Logger configuration
///
/// # Example
///
/// ```toml
/// [logger]
/// sink = "file"
/// format = "json"
/// path = "costs.jsonl"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Sink kind
    pub sink: LoggerSinkKind,

    /// Line format (stdout and file)
    pub format: OutputFormat,

    /// Target file, required for the file sink
    pub path: Option<String>,

    /// Colour stdout output
    /// Default: true
    pub color: bool,

    /// Upper bound for writing one record
    /// Default: 5s
    #[serde(with = "humantime_serde")]
    pub processing_timeout: Duration,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            sink: LoggerSinkKind::Log,
            format: OutputFormat::Text,
            path: None,
            color: true,
            processing_timeout: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_log_sink() {
        let config: LoggerConfig = toml::from_str("").unwrap();
        assert_eq!(config.sink, LoggerSinkKind::Log);
        assert_eq!(config.format, OutputFormat::Text);
        assert!(config.path.is_none());
        assert!(config.color);
    }

    #[test]
    fn test_file_sink() {
        let toml = r#"
sink = "file"
format = "json"
path = "/var/log/tally/costs.jsonl"
"#;
        let config: LoggerConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.sink, LoggerSinkKind::File);
        assert_eq!(config.format, OutputFormat::Json);
        assert_eq!(config.path.as_deref(), Some("/var/log/tally/costs.jsonl"));
    }
}
