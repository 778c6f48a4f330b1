//! Dead-letter destination configuration

use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Where records that exhausted their retries end up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeadLetterDestination {
    /// Kept in process memory
    Memory,
    /// Appended to a JSON lines file
    File(PathBuf),
}

impl FromStr for DeadLetterDestination {
    type Err = String;

    /// Parses `memory` or `file:<path>`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("memory") {
            return Ok(Self::Memory);
        }
        match s.strip_prefix("file:") {
            Some(path) if !path.trim().is_empty() => Ok(Self::File(PathBuf::from(path.trim()))),
            Some(_) => Err("file destination needs a path, e.g. file:dead-letters.jsonl".into()),
            None => Err(format!(
                "unknown destination '{s}' (expected 'memory' or 'file:<path>')"
            )),
        }
    }
}

impl fmt::Display for DeadLetterDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => f.write_str("memory"),
            Self::File(path) => write!(f, "file:{}", path.display()),
        }
    }
}

/// Dead-letter configuration
///
/// # Example
///
/// ```toml
/// [dead_letter]
/// destination = "file:dead-letters.jsonl"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeadLetterConfig {
    /// `memory` or `file:<path>`
    /// Default: memory
    pub destination: String,
}

impl Default for DeadLetterConfig {
    fn default() -> Self {
        Self {
            destination: "memory".into(),
        }
    }
}

impl DeadLetterConfig {
    /// Parsed destination
    pub fn parsed(&self) -> Result<DeadLetterDestination, String> {
        self.destination.parse()
    }
}
