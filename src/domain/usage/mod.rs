//! Usage accounting domain
//!
//! Rate tiers, the pure quota policy and the monthly usage windows the
//! admission guard and the reset scheduler operate on.

mod policy;
mod tier;
mod window;

pub use policy::{
    grace_for, EnforcementMode, QuotaStatus, RateLimitPolicy, APPROACHING_PERCENT, GRACE_PERCENT,
};
pub use tier::{Quota, RateTier};
pub use window::{MonthKey, UsageOutcome, UsageWindow};
