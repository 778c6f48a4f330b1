//! Environment overrides
//!
//! Applied after the file is parsed. Lookup is injectable so tests never
//! touch the process environment.

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use crate::Config;
use crate::error::{ConfigError, Result};
use crate::logging::LogLevel;

/// Generator tick interval in milliseconds
pub const ENV_GENERATOR_INTERVAL_MS: &str = "TALLY_GENERATOR_INTERVAL_MS";
/// Comma-separated user roster
pub const ENV_USERS: &str = "TALLY_USERS";
/// Cost per second of call duration
pub const ENV_RATE_PER_SECOND: &str = "TALLY_RATE_PER_SECOND";
/// Cost per unit of data
pub const ENV_RATE_PER_UNIT: &str = "TALLY_RATE_PER_UNIT";
/// Capacity of both channels
pub const ENV_CHANNEL_CAPACITY: &str = "TALLY_CHANNEL_CAPACITY";
/// Retries before dead-lettering
pub const ENV_MAX_RETRIES: &str = "TALLY_MAX_RETRIES";
/// Dead-letter destination (`memory` or `file:<path>`)
pub const ENV_DEAD_LETTER: &str = "TALLY_DEAD_LETTER";
/// Log level
pub const ENV_LOG_LEVEL: &str = "TALLY_LOG_LEVEL";

impl Config {
    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|var| std::env::var(var).ok())
    }

    /// Apply overrides from an arbitrary lookup
    ///
    /// Unset variables leave the config untouched; set but unparsable ones
    /// fail with `ConfigError::InvalidEnv`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_GENERATOR_INTERVAL_MS) {
            let ms: u64 = parse_var(ENV_GENERATOR_INTERVAL_MS, &raw)?;
            self.generator.interval = Duration::from_millis(ms);
        }

        if let Some(raw) = lookup(ENV_USERS) {
            let users: Vec<String> = raw
                .split(',')
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(String::from)
                .collect();
            if users.is_empty() {
                return Err(ConfigError::invalid_env(ENV_USERS, "roster is empty"));
            }
            self.generator.users = users;
        }

        if let Some(raw) = lookup(ENV_RATE_PER_SECOND) {
            self.transformer.rate_per_second = parse_var(ENV_RATE_PER_SECOND, &raw)?;
        }

        if let Some(raw) = lookup(ENV_RATE_PER_UNIT) {
            self.transformer.rate_per_unit = parse_var(ENV_RATE_PER_UNIT, &raw)?;
        }

        if let Some(raw) = lookup(ENV_CHANNEL_CAPACITY) {
            let capacity: usize = parse_var(ENV_CHANNEL_CAPACITY, &raw)?;
            self.channels.usage.capacity = capacity;
            self.channels.costs.capacity = capacity;
        }

        if let Some(raw) = lookup(ENV_MAX_RETRIES) {
            self.retry.max_retries = parse_var(ENV_MAX_RETRIES, &raw)?;
        }

        if let Some(raw) = lookup(ENV_DEAD_LETTER) {
            self.dead_letter.destination = raw.trim().to_string();
        }

        if let Some(raw) = lookup(ENV_LOG_LEVEL) {
            self.log.level = raw
                .parse::<LogLevel>()
                .map_err(|e| ConfigError::invalid_env(ENV_LOG_LEVEL, e))?;
        }

        Ok(())
    }
}

fn parse_var<T>(var: &'static str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::invalid_env(var, format!("'{}': {e}", raw.trim())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_no_overrides_keeps_config() {
        let mut config = Config::default();
        config.apply_overrides(|_| None).unwrap();
        assert_eq!(config.generator.interval, Duration::from_secs(2));
        assert_eq!(config.retry.max_retries, 3);
    }

    #[test]
    fn test_all_overrides() {
        let mut config = Config::default();
        config
            .apply_overrides(lookup(&[
                (ENV_GENERATOR_INTERVAL_MS, "250"),
                (ENV_USERS, "alice, bob,,carol"),
                (ENV_RATE_PER_SECOND, "0.05"),
                (ENV_RATE_PER_UNIT, "0.01"),
                (ENV_CHANNEL_CAPACITY, "16"),
                (ENV_MAX_RETRIES, "0"),
                (ENV_DEAD_LETTER, "file:dl.jsonl"),
                (ENV_LOG_LEVEL, "debug"),
            ]))
            .unwrap();

        assert_eq!(config.generator.interval, Duration::from_millis(250));
        assert_eq!(config.generator.users, vec!["alice", "bob", "carol"]);
        assert_eq!(config.transformer.rate_per_second, 0.05);
        assert_eq!(config.transformer.rate_per_unit, 0.01);
        assert_eq!(config.channels.usage.capacity, 16);
        assert_eq!(config.channels.costs.capacity, 16);
        assert_eq!(config.retry.max_retries, 0);
        assert_eq!(config.dead_letter.destination, "file:dl.jsonl");
        assert_eq!(config.log.level, LogLevel::Debug);
    }

    #[test]
    fn test_unparsable_override() {
        let mut config = Config::default();
        let err = config
            .apply_overrides(lookup(&[(ENV_MAX_RETRIES, "many")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidEnv {
                var: ENV_MAX_RETRIES,
                ..
            }
        ));
    }

    #[test]
    fn test_empty_roster_override() {
        let mut config = Config::default();
        let err = config
            .apply_overrides(lookup(&[(ENV_USERS, " , ")]))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_USERS));
    }
}
