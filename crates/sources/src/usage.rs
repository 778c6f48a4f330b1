//! Synthetic usage generator
//!
//! Each call picks a user uniformly from the roster and draws `duration` and
//! `data` uniformly from `[0, max)`. The RNG is process-local and seedable,
//! so a fixed seed yields a fixed sequence.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tally_protocol::UsageDetail;
use thiserror::Error;

/// Errors from generator construction
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GeneratorError {
    /// No users to pick from
    #[error("user roster is empty")]
    EmptyRoster,

    /// A roster entry is blank
    #[error("user roster contains an empty user id")]
    BlankUser,

    /// An upper bound is not positive
    #[error("{field} must be > 0, got {value}")]
    InvalidRange {
        /// Offending setting
        field: &'static str,
        /// Configured value
        value: i64,
    },
}

/// Generator settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorSettings {
    /// User roster
    pub users: Vec<String>,
    /// Exclusive upper bound for `duration`
    pub max_duration: i64,
    /// Exclusive upper bound for `data`
    pub max_data: i64,
    /// RNG seed; entropy when `None`
    pub seed: Option<u64>,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            users: (1..=5).map(|i| format!("user{i}")).collect(),
            max_duration: 300,
            max_data: 700,
            seed: None,
        }
    }
}

impl GeneratorSettings {
    /// Replace the roster
    pub fn with_users<I, S>(mut self, users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.users = users.into_iter().map(Into::into).collect();
        self
    }

    /// Fix the seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set both upper bounds
    pub fn with_ranges(mut self, max_duration: i64, max_data: i64) -> Self {
        self.max_duration = max_duration;
        self.max_data = max_data;
        self
    }

    fn validate(&self) -> Result<(), GeneratorError> {
        if self.users.is_empty() {
            return Err(GeneratorError::EmptyRoster);
        }
        if self.users.iter().any(|u| u.is_empty()) {
            return Err(GeneratorError::BlankUser);
        }
        if self.max_duration <= 0 {
            return Err(GeneratorError::InvalidRange {
                field: "max_duration",
                value: self.max_duration,
            });
        }
        if self.max_data <= 0 {
            return Err(GeneratorError::InvalidRange {
                field: "max_data",
                value: self.max_data,
            });
        }
        Ok(())
    }
}

/// Random `UsageDetail` source
///
/// Shareable across tasks; the RNG sits behind a mutex so the stage can
/// draw while a caller reseeds.
pub struct UsageGenerator {
    settings: GeneratorSettings,
    rng: Mutex<StdRng>,
}

impl UsageGenerator {
    /// Create a generator
    ///
    /// # Errors
    ///
    /// Fails on an empty roster, a blank user id or a non-positive bound.
    pub fn new(settings: GeneratorSettings) -> Result<Self, GeneratorError> {
        settings.validate()?;

        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        tracing::debug!(
            users = settings.users.len(),
            max_duration = settings.max_duration,
            max_data = settings.max_data,
            seeded = settings.seed.is_some(),
            "usage generator created"
        );

        Ok(Self {
            settings,
            rng: Mutex::new(rng),
        })
    }

    /// Settings in use
    #[inline]
    pub fn settings(&self) -> &GeneratorSettings {
        &self.settings
    }

    /// Restart the sequence from `seed`
    pub fn reseed(&self, seed: u64) {
        *self.rng.lock() = StdRng::seed_from_u64(seed);
        tracing::info!(seed, "usage generator reseeded");
    }

    /// Draw the next record
    pub fn next_detail(&self) -> UsageDetail {
        let mut rng = self.rng.lock();
        let index = rng.gen_range(0..self.settings.users.len());
        let duration = rng.gen_range(0..self.settings.max_duration);
        let data = rng.gen_range(0..self.settings.max_data);

        UsageDetail::new(self.settings.users[index].clone(), duration, data)
    }
}

impl std::fmt::Debug for UsageGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsageGenerator")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
