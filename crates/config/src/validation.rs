//! Configuration validation
//!
//! Checks values serde cannot:
//! - Roster is non-empty, ranges are positive
//! - Cost rates are finite and non-negative
//! - Channel capacities, timeouts and topics are usable
//! - The file sink has a path
//! - Retry, health and dead-letter settings are coherent

use std::time::Duration;

use crate::Config;
use crate::channels::QueueConfig;
use crate::error::{ConfigError, Result};
use crate::logger::LoggerSinkKind;

/// Validate the entire configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_generator(config)?;
    validate_transformer(config)?;
    validate_logger(config)?;
    validate_channels(config)?;
    validate_retry(config)?;
    validate_dead_letter(config)?;
    validate_health(config)?;
    validate_misc(config)?;
    Ok(())
}

fn require_nonzero(section: &str, field: &'static str, value: Duration) -> Result<()> {
    if value.is_zero() {
        return Err(ConfigError::invalid_value(section, field, "must be > 0"));
    }
    Ok(())
}

fn validate_generator(config: &Config) -> Result<()> {
    let generator = &config.generator;
    require_nonzero("generator", "interval", generator.interval)?;

    if generator.users.is_empty() {
        return Err(ConfigError::missing_field("generator", "users"));
    }
    if generator.users.iter().any(|u| u.trim().is_empty()) {
        return Err(ConfigError::invalid_value(
            "generator",
            "users",
            "user ids must not be empty",
        ));
    }
    if generator.max_duration <= 0 {
        return Err(ConfigError::invalid_value(
            "generator",
            "max_duration",
            "must be > 0",
        ));
    }
    if generator.max_data <= 0 {
        return Err(ConfigError::invalid_value("generator", "max_data", "must be > 0"));
    }
    Ok(())
}

fn validate_rate(field: &'static str, rate: f64) -> Result<()> {
    if !rate.is_finite() || rate < 0.0 {
        return Err(ConfigError::invalid_value(
            "transformer",
            field,
            format!("{rate} is not a finite non-negative number"),
        ));
    }
    Ok(())
}

fn validate_transformer(config: &Config) -> Result<()> {
    let transformer = &config.transformer;
    validate_rate("rate_per_second", transformer.rate_per_second)?;
    validate_rate("rate_per_unit", transformer.rate_per_unit)?;

    if transformer.workers == 0 {
        return Err(ConfigError::invalid_value("transformer", "workers", "must be >= 1"));
    }
    require_nonzero(
        "transformer",
        "processing_timeout",
        transformer.processing_timeout,
    )
}

fn validate_logger(config: &Config) -> Result<()> {
    let logger = &config.logger;
    if logger.sink == LoggerSinkKind::File
        && logger.path.as_deref().is_none_or(|p| p.trim().is_empty())
    {
        return Err(ConfigError::missing_field("logger", "path"));
    }
    require_nonzero("logger", "processing_timeout", logger.processing_timeout)
}

fn validate_queue(section: &str, queue: &QueueConfig) -> Result<()> {
    if queue.capacity == 0 {
        return Err(ConfigError::invalid_value(section, "capacity", "must be > 0"));
    }
    if queue.topic.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(ConfigError::invalid_value(section, "topic", "must not be empty"));
    }
    require_nonzero(section, "enqueue_timeout", queue.enqueue_timeout)?;
    require_nonzero(section, "dequeue_timeout", queue.dequeue_timeout)?;
    require_nonzero(section, "visibility_timeout", queue.visibility_timeout)
}

fn validate_channels(config: &Config) -> Result<()> {
    let channels = &config.channels;
    validate_queue("channels.usage", &channels.usage)?;
    validate_queue("channels.costs", &channels.costs)?;

    if channels.usage_topic() == channels.costs_topic() {
        return Err(ConfigError::invalid_value(
            "channels",
            "topic",
            format!("usage and costs share topic '{}'", channels.usage_topic()),
        ));
    }
    Ok(())
}

fn validate_retry(config: &Config) -> Result<()> {
    let retry = &config.retry;
    if !retry.multiplier.is_finite() || retry.multiplier < 1.0 {
        return Err(ConfigError::invalid_value("retry", "multiplier", "must be >= 1.0"));
    }
    if !(0.0..=1.0).contains(&retry.jitter_factor) {
        return Err(ConfigError::invalid_value(
            "retry",
            "jitter_factor",
            "must be between 0 and 1",
        ));
    }
    if retry.initial_backoff > retry.max_backoff {
        return Err(ConfigError::invalid_value(
            "retry",
            "initial_backoff",
            "must not exceed max_backoff",
        ));
    }
    Ok(())
}

fn validate_dead_letter(config: &Config) -> Result<()> {
    config
        .dead_letter
        .parsed()
        .map(|_| ())
        .map_err(|msg| ConfigError::invalid_value("dead_letter", "destination", msg))
}

fn validate_health(config: &Config) -> Result<()> {
    let health = &config.health;
    if !health.enabled {
        return Ok(());
    }
    let threshold = health.error_rate_threshold;
    if !(threshold > 0.0 && threshold <= 1.0) {
        return Err(ConfigError::invalid_value(
            "health",
            "error_rate_threshold",
            "must be in (0, 1]",
        ));
    }
    if health.min_samples == 0 {
        return Err(ConfigError::invalid_value("health", "min_samples", "must be >= 1"));
    }
    require_nonzero("health", "window", health.window)?;
    require_nonzero("health", "pause", health.pause)
}

fn validate_misc(config: &Config) -> Result<()> {
    if config.metrics.enabled {
        require_nonzero("metrics", "interval", config.metrics.interval)?;
    }
    require_nonzero("shutdown", "grace", config.shutdown.grace)
}
