//! Cost transformer
//!
//! `callCost = duration * rate_per_second`, `dataCost = data * rate_per_unit`,
//! computed in plain f64 arithmetic with no rounding.

use std::future::Future;
use std::pin::Pin;

use tally_protocol::{UsageCostDetail, UsageDetail};

use crate::{TransformError, TransformResult, Transformer};

#[cfg(test)]
#[path = "cost_test.rs"]
mod tests;

/// Static cost rates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostRates {
    rate_per_second: f64,
    rate_per_unit: f64,
}

impl Default for CostRates {
    fn default() -> Self {
        Self {
            rate_per_second: 0.1,
            rate_per_unit: 0.05,
        }
    }
}

impl CostRates {
    /// Create rates
    ///
    /// # Errors
    ///
    /// `TransformError::Config` unless both rates are finite and `>= 0`.
    pub fn new(rate_per_second: f64, rate_per_unit: f64) -> TransformResult<Self> {
        check_rate("rate_per_second", rate_per_second)?;
        check_rate("rate_per_unit", rate_per_unit)?;
        Ok(Self {
            rate_per_second,
            rate_per_unit,
        })
    }

    /// Cost per second of call duration
    #[inline]
    pub fn rate_per_second(&self) -> f64 {
        self.rate_per_second
    }

    /// Cost per unit of data
    #[inline]
    pub fn rate_per_unit(&self) -> f64 {
        self.rate_per_unit
    }

    /// Price one usage record
    ///
    /// # Errors
    ///
    /// `InvalidUsageDetail` for an empty user id or a negative quantity.
    pub fn price(&self, detail: &UsageDetail) -> TransformResult<UsageCostDetail> {
        validate(detail)?;
        Ok(UsageCostDetail::new(
            detail.user_id(),
            detail.duration() as f64 * self.rate_per_second,
            detail.data() as f64 * self.rate_per_unit,
        ))
    }
}

fn check_rate(name: &str, rate: f64) -> TransformResult<()> {
    if rate.is_finite() && rate >= 0.0 {
        Ok(())
    } else {
        Err(TransformError::config(format!(
            "{name} must be finite and >= 0, got {rate}"
        )))
    }
}

/// Check a record against the `UsageDetail` contract
pub fn validate(detail: &UsageDetail) -> TransformResult<()> {
    if detail.user_id().is_empty() {
        return Err(TransformError::invalid("", "userId is empty"));
    }
    if detail.duration() < 0 {
        return Err(TransformError::invalid(
            detail.user_id(),
            format!("duration is negative ({})", detail.duration()),
        ));
    }
    if detail.data() < 0 {
        return Err(TransformError::invalid(
            detail.user_id(),
            format!("data is negative ({})", detail.data()),
        ));
    }
    Ok(())
}

/// Transformer pricing usage with fixed `CostRates`
#[derive(Debug, Clone, Copy, Default)]
pub struct CostTransformer {
    rates: CostRates,
}

impl CostTransformer {
    /// Create a transformer with the given rates
    #[inline]
    pub const fn new(rates: CostRates) -> Self {
        Self { rates }
    }

    /// Rates in use
    #[inline]
    pub fn rates(&self) -> CostRates {
        self.rates
    }
}

impl Transformer for CostTransformer {
    fn transform<'a>(
        &'a self,
        detail: UsageDetail,
    ) -> Pin<Box<dyn Future<Output = TransformResult<UsageCostDetail>> + Send + 'a>> {
        Box::pin(async move { self.rates.price(&detail) })
    }

    fn name(&self) -> &'static str {
        "cost"
    }
}
