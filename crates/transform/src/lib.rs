//! Tally - Transform
//!
//! Turns `UsageDetail` records into `UsageCostDetail` records.
//!
//! # Design Principles
//!
//! - **Pure**: the output depends only on the input and static rates
//! - **Validating**: records violating the `UsageDetail` contract fail with
//!   `TransformError::InvalidUsageDetail` and are never priced
//! - **Pluggable**: the pipeline only sees the `Transformer` trait, so a
//!   different pricing formula can be swapped in
//!
//! # Example
//!
//! ```ignore
//! use tally_transform::{CostRates, CostTransformer, Transformer};
//!
//! let transformer = CostTransformer::new(CostRates::new(0.05, 0.01)?);
//! let cost = transformer.transform(detail).await?;
//! ```

mod cost;
mod error;

pub use cost::{CostRates, CostTransformer, validate};
pub use error::TransformError;

use std::future::Future;
use std::pin::Pin;

use tally_protocol::{UsageCostDetail, UsageDetail};

/// Result type for transformer operations
pub type TransformResult<T> = Result<T, TransformError>;

/// Trait for usage transformers
///
/// Implementors must be `Send + Sync`; several transformer workers may share
/// one instance.
pub trait Transformer: Send + Sync {
    /// Price one usage record
    ///
    /// An `InvalidUsageDetail` error means the record can never be priced and
    /// must not be retried.
    fn transform<'a>(
        &'a self,
        detail: UsageDetail,
    ) -> Pin<Box<dyn Future<Output = TransformResult<UsageCostDetail>> + Send + 'a>>;

    /// Name of this transformer for logging and metrics
    fn name(&self) -> &'static str;
}
