//! Rate tiers and quota values

use serde::{Deserialize, Serialize};

/// A request ceiling for one window
///
/// Persisted as a signed integer where `-1` stands for unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i64", try_from = "i64")]
pub enum Quota {
    Limited(u64),
    Unlimited,
}

impl Quota {
    const UNLIMITED_SENTINEL: i64 = -1;

    pub fn is_unlimited(&self) -> bool {
        matches!(self, Self::Unlimited)
    }

    /// The numeric ceiling, `None` when unlimited
    pub fn value(&self) -> Option<u64> {
        match self {
            Self::Limited(v) => Some(*v),
            Self::Unlimited => None,
        }
    }
}

impl From<Quota> for i64 {
    fn from(quota: Quota) -> Self {
        match quota {
            Quota::Limited(v) => i64::try_from(v).unwrap_or(i64::MAX),
            Quota::Unlimited => Quota::UNLIMITED_SENTINEL,
        }
    }
}

impl TryFrom<i64> for Quota {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            Quota::UNLIMITED_SENTINEL => Ok(Self::Unlimited),
            v if v >= 0 => Ok(Self::Limited(v as u64)),
            v => Err(format!("invalid quota value: {}", v)),
        }
    }
}

impl std::fmt::Display for Quota {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Limited(v) => write!(f, "{}", v),
            Self::Unlimited => write!(f, "unlimited"),
        }
    }
}

/// Named rate-limit class assigned to a credential
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RateTier {
    #[default]
    Free,
    Pro,
    Business,
    Enterprise,
    /// Legacy plans kept for credentials issued before the current catalogue
    Basic,
    Standard,
    Premium,
}

impl RateTier {
    pub const ALL: [RateTier; 7] = [
        Self::Free,
        Self::Pro,
        Self::Business,
        Self::Enterprise,
        Self::Basic,
        Self::Standard,
        Self::Premium,
    ];

    /// Monthly request ceiling
    pub fn quota(&self) -> Quota {
        match self {
            Self::Free => Quota::Limited(100),
            Self::Pro => Quota::Limited(1_000),
            Self::Business => Quota::Limited(10_000),
            Self::Enterprise => Quota::Unlimited,
            Self::Basic => Quota::Limited(500),
            Self::Standard => Quota::Limited(5_000),
            Self::Premium => Quota::Limited(50_000),
        }
    }

    /// Window length in calendar months
    pub fn window_months(&self) -> u32 {
        1
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, Self::Basic | Self::Standard | Self::Premium)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "FREE",
            Self::Pro => "PRO",
            Self::Business => "BUSINESS",
            Self::Enterprise => "ENTERPRISE",
            Self::Basic => "BASIC",
            Self::Standard => "STANDARD",
            Self::Premium => "PREMIUM",
        }
    }
}

impl std::fmt::Display for RateTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RateTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|tier| tier.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| format!("unknown rate tier: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_quotas() {
        assert_eq!(RateTier::Free.quota(), Quota::Limited(100));
        assert_eq!(RateTier::Pro.quota(), Quota::Limited(1_000));
        assert!(RateTier::Enterprise.quota().is_unlimited());
    }

    #[test]
    fn test_tier_parse() {
        assert_eq!("pro".parse::<RateTier>().unwrap(), RateTier::Pro);
        assert_eq!("STANDARD".parse::<RateTier>().unwrap(), RateTier::Standard);
        assert!("gold".parse::<RateTier>().is_err());
    }

    #[test]
    fn test_quota_serialization() {
        assert_eq!(serde_json::to_string(&Quota::Unlimited).unwrap(), "-1");
        assert_eq!(serde_json::to_string(&Quota::Limited(110)).unwrap(), "110");

        let parsed: Quota = serde_json::from_str("-1").unwrap();
        assert_eq!(parsed, Quota::Unlimited);
        assert!(serde_json::from_str::<Quota>("-5").is_err());
    }

    #[test]
    fn test_tier_serialization() {
        let json = serde_json::to_string(&RateTier::Business).unwrap();
        assert_eq!(json, "\"BUSINESS\"");
    }
}
