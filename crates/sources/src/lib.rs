//! Tally Sources
//!
//! Producers of `UsageDetail` records for the pipeline.
//!
//! # Available Sources
//!
//! - **Usage generator** - synthetic usage for a fixed roster of users, one
//!   record per call. The pipeline's generator stage drives it on a ticker.
//!
//! # Example
//!
//! ```
//! use tally_sources::{GeneratorSettings, UsageGenerator};
//!
//! let generator = UsageGenerator::new(GeneratorSettings::default().with_seed(7)).unwrap();
//! let detail = generator.next_detail();
//! assert!(detail.duration() < 300);
//! ```

mod usage;

pub use usage::{GeneratorError, GeneratorSettings, UsageGenerator};
