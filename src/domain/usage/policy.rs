//! Rate limit policy: pure mapping from tiers to quotas and windows

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};

use super::tier::{Quota, RateTier};
use super::window::{MonthKey, UsageWindow};

/// Overage tolerated above the quota, in percent
pub const GRACE_PERCENT: u64 = 10;

/// Share of the quota after which admitted calls are flagged as approaching
pub const APPROACHING_PERCENT: u64 = 90;

/// What happens to calls between the quota and the grace limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EnforcementMode {
    /// Admit and flag calls until the grace limit is reached
    #[default]
    Grace,
    /// Deny as soon as the quota is reached
    Strict,
}

/// Classification of one incoming call against its window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaStatus {
    Unlimited,
    Within,
    /// Admitted; this call lands in the last tenth of the quota
    Approaching,
    /// Admitted past the quota, inside the grace allowance
    Grace,
    Exceeded,
}

impl QuotaStatus {
    pub fn is_admitted(&self) -> bool {
        !matches!(self, Self::Exceeded)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unlimited => "unlimited",
            Self::Within => "ok",
            Self::Approaching => "approaching",
            Self::Grace => "grace",
            Self::Exceeded => "exceeded",
        }
    }
}

impl std::fmt::Display for QuotaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Quota lookups and evaluation for rate tiers
#[derive(Debug, Clone, Copy, Default)]
pub struct RateLimitPolicy {
    mode: EnforcementMode,
}

impl RateLimitPolicy {
    pub fn new(mode: EnforcementMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> EnforcementMode {
        self.mode
    }

    /// Monthly request ceiling for a tier
    pub fn limit(&self, tier: RateTier) -> Quota {
        tier.quota()
    }

    /// `ceil(limit * 1.10)`, unlimited stays unlimited
    pub fn grace_limit(&self, tier: RateTier) -> Quota {
        grace_for(self.limit(tier))
    }

    /// First day of `now`'s month at midnight UTC
    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        MonthKey::of(now).start()
    }

    /// Exclusive end of a window opened at `start`
    pub fn window_end(&self, start: DateTime<Utc>, tier: RateTier) -> DateTime<Utc> {
        start
            .checked_add_months(Months::new(tier.window_months()))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Half-open membership test: `start <= instant < end`
    pub fn contains(&self, start: DateTime<Utc>, tier: RateTier, instant: DateTime<Utc>) -> bool {
        start <= instant && instant < self.window_end(start, tier)
    }

    /// Whether the window has consumed its grace allowance
    pub fn is_exceeded(&self, usage: &UsageWindow, tier: RateTier) -> bool {
        grace_exhausted(usage.total_calls(), self.grace_limit(tier))
    }

    /// Classify the next call given `used` calls already counted in the window
    pub fn evaluate(&self, used: u64, tier: RateTier) -> QuotaStatus {
        self.evaluate_limits(used, self.limit(tier), self.grace_limit(tier))
    }

    /// Classify the next call against the limits stored on `window`.
    ///
    /// Stored limits reflect the tier at the last reset, so a mid-month tier
    /// change takes effect at the next window.
    pub fn evaluate_window(&self, window: &UsageWindow) -> QuotaStatus {
        self.evaluate_limits(window.total_calls(), window.quota_limit(), window.grace_limit())
    }

    /// Same as [`evaluate`](Self::evaluate) but against explicit limits
    pub fn evaluate_limits(&self, used: u64, limit: Quota, grace: Quota) -> QuotaStatus {
        let (limit, grace) = match (limit, grace) {
            (Quota::Limited(limit), Quota::Limited(grace)) => (limit, grace),
            _ => return QuotaStatus::Unlimited,
        };

        let next = used.saturating_add(1);

        if next <= limit {
            // next * 100 > limit * 90, kept in integers
            if next.saturating_mul(100) > limit.saturating_mul(APPROACHING_PERCENT) {
                return QuotaStatus::Approaching;
            }
            return QuotaStatus::Within;
        }

        match self.mode {
            EnforcementMode::Strict => QuotaStatus::Exceeded,
            EnforcementMode::Grace if grace_exhausted(used, Quota::Limited(grace)) => {
                QuotaStatus::Exceeded
            }
            EnforcementMode::Grace => QuotaStatus::Grace,
        }
    }
}

fn grace_exhausted(used: u64, grace: Quota) -> bool {
    match grace {
        Quota::Unlimited => false,
        Quota::Limited(grace) => used >= grace,
    }
}

/// Grace ceiling derived from a quota
pub fn grace_for(limit: Quota) -> Quota {
    match limit {
        Quota::Unlimited => Quota::Unlimited,
        Quota::Limited(limit) => {
            let scaled = limit.saturating_mul(100 + GRACE_PERCENT);
            Quota::Limited(scaled.div_ceil(100))
        }
    }
}
