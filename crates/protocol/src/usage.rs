//! Usage records
//!
//! `UsageDetail` is produced by the generator and consumed by the cost
//! transformer. `UsageCostDetail` is produced by the transformer and consumed
//! by the usage logger. Both are immutable once constructed.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single usage observation for one user
///
/// Field names on the wire are camelCase (`userId`, `duration`, `data`).
/// Values are signed so that malformed input from outside the pipeline can be
/// represented and rejected at the transformer boundary instead of failing to
/// decode.
///
/// # Example
///
/// ```
/// use tally_protocol::UsageDetail;
///
/// let detail = UsageDetail::new("user1", 100, 200);
/// assert_eq!(detail.user_id(), "user1");
/// assert_eq!(detail.duration(), 100);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageDetail {
    user_id: String,
    duration: i64,
    data: i64,
}

impl UsageDetail {
    /// Create a usage detail
    #[inline]
    pub fn new(user_id: impl Into<String>, duration: i64, data: i64) -> Self {
        Self {
            user_id: user_id.into(),
            duration,
            data,
        }
    }

    /// User the usage belongs to
    #[inline]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Call duration in seconds
    #[inline]
    pub fn duration(&self) -> i64 {
        self.duration
    }

    /// Data volume in billing units
    #[inline]
    pub fn data(&self) -> i64 {
        self.data
    }
}

impl fmt::Display for UsageDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "userId={} duration={} data={}",
            self.user_id, self.duration, self.data
        )
    }
}

/// Priced usage for one user
///
/// The `Display` form is stable and parseable:
/// `userId=user1 callCost=5.0 dataCost=2.0`. Costs always carry a decimal
/// point and are printed with full precision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageCostDetail {
    user_id: String,
    call_cost: f64,
    data_cost: f64,
}

impl UsageCostDetail {
    /// Create a usage cost detail
    #[inline]
    pub fn new(user_id: impl Into<String>, call_cost: f64, data_cost: f64) -> Self {
        Self {
            user_id: user_id.into(),
            call_cost,
            data_cost,
        }
    }

    /// User the cost belongs to
    #[inline]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Cost of call time
    #[inline]
    pub fn call_cost(&self) -> f64 {
        self.call_cost
    }

    /// Cost of data volume
    #[inline]
    pub fn data_cost(&self) -> f64 {
        self.data_cost
    }
}

impl fmt::Display for UsageCostDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // `{:?}` keeps the trailing ".0" on whole numbers
        write!(
            f,
            "userId={} callCost={:?} dataCost={:?}",
            self.user_id, self.call_cost, self.data_cost
        )
    }
}
