//! Pipeline error types
//!
//! Every failure inside a stage is turned into a `StageError` and classified.
//! The class alone decides what happens to the message.

use std::fmt;

use tally_channel::ChannelError;
use tally_sinks::SinkError;
use tally_transform::TransformError;
use thiserror::Error;

/// How a stage reacts to a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Bad input: dead-lettered immediately, never retried
    Validation,
    /// May succeed later: retried with backoff, then dead-lettered
    TransientIo,
    /// Channel no longer accepts work: the stage exits
    ChannelClosed,
}

impl ErrorClass {
    /// Lowercase name for logs and dead letters
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::TransientIo => "transient_io",
            Self::ChannelClosed => "channel_closed",
        }
    }

    /// Whether another attempt may succeed
    #[inline]
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::TransientIo)
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified stage failure
#[derive(Debug, Error)]
#[error("{class}: {message}")]
pub struct StageError {
    class: ErrorClass,
    message: String,
}

impl StageError {
    pub fn new(class: ErrorClass, message: impl Into<String>) -> Self {
        Self {
            class,
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Validation, message)
    }

    /// Create a transient I/O error
    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::TransientIo, message)
    }

    /// Create a channel-closed error
    pub fn closed(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::ChannelClosed, message)
    }

    #[inline]
    pub fn class(&self) -> ErrorClass {
        self.class
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<ChannelError> for StageError {
    fn from(err: ChannelError) -> Self {
        match err {
            ChannelError::Draining | ChannelError::Closed => Self::closed(err.to_string()),
            ChannelError::Malformed { .. } => Self::validation(err.to_string()),
            ChannelError::Full
            | ChannelError::Timeout { .. }
            | ChannelError::UnknownDelivery(_)
            | ChannelError::Transport(_) => Self::transient(err.to_string()),
        }
    }
}

impl From<TransformError> for StageError {
    fn from(err: TransformError) -> Self {
        if err.is_validation() {
            Self::validation(err.to_string())
        } else {
            Self::transient(err.to_string())
        }
    }
}

impl From<SinkError> for StageError {
    fn from(err: SinkError) -> Self {
        Self::transient(err.to_string())
    }
}

/// Errors building or running a pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Configuration rejected
    #[error("invalid configuration: {0}")]
    Config(#[from] tally_config::ConfigError),

    /// Generator settings rejected
    #[error("generator: {0}")]
    Generator(#[from] tally_sources::GeneratorError),

    /// Transformer could not be created
    #[error("transformer: {0}")]
    Transform(#[from] TransformError),

    /// Sink or dead-letter store could not be opened
    #[error("sink: {0}")]
    Sink(#[from] SinkError),

    /// Channel or broker binding failed
    #[error("channel: {0}")]
    Channel(#[from] ChannelError),
}

/// Result type for pipeline construction
pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
