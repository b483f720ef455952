//! Monthly usage windows

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::tier::Quota;
use crate::domain::credential::CredentialId;

/// Calendar month a usage window belongs to, rendered as `YYYY-MM`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Result<Self, String> {
        if !(1..=12).contains(&month) {
            return Err(format!("month out of range: {}", month));
        }

        Ok(Self { year, month })
    }

    /// Month containing the given instant (UTC)
    pub fn of(instant: DateTime<Utc>) -> Self {
        Self {
            year: instant.year(),
            month: instant.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Midnight UTC on the first day of the month
    pub fn start(&self) -> DateTime<Utc> {
        let date = NaiveDate::from_ymd_opt(self.year, self.month, 1)
            .unwrap_or(NaiveDate::MIN);
        Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN))
    }
}

impl std::fmt::Display for MonthKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl std::str::FromStr for MonthKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .split_once('-')
            .ok_or_else(|| format!("invalid month key: {}", s))?;

        let year = year
            .parse::<i32>()
            .map_err(|_| format!("invalid year in month key: {}", s))?;
        let month = month
            .parse::<u32>()
            .map_err(|_| format!("invalid month in month key: {}", s))?;

        Self::new(year, month)
    }
}

impl TryFrom<String> for MonthKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MonthKey> for String {
    fn from(key: MonthKey) -> Self {
        key.to_string()
    }
}

/// How a single request affected a credential's counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageOutcome {
    /// Admitted and forwarded downstream
    Admitted { succeeded: bool, grace: bool },
    /// Authenticated but denied by the IP or domain checks
    Rejected,
    /// Denied because the window is exhausted
    QuotaExceeded,
}

/// Per-credential counters for one calendar month
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageWindow {
    credential_id: CredentialId,
    month_key: MonthKey,
    window_start: DateTime<Utc>,
    total_calls: u64,
    successful_calls: u64,
    failed_calls: u64,
    quota_exceeded_calls: u64,
    grace_calls: u64,
    quota_limit: Quota,
    grace_limit: Quota,
    updated_at: DateTime<Utc>,
}

impl UsageWindow {
    pub fn new(
        credential_id: CredentialId,
        month_key: MonthKey,
        quota_limit: Quota,
        grace_limit: Quota,
    ) -> Self {
        Self {
            credential_id,
            month_key,
            window_start: month_key.start(),
            total_calls: 0,
            successful_calls: 0,
            failed_calls: 0,
            quota_exceeded_calls: 0,
            grace_calls: 0,
            quota_limit,
            grace_limit,
            updated_at: Utc::now(),
        }
    }

    pub fn credential_id(&self) -> &CredentialId {
        &self.credential_id
    }

    pub fn month_key(&self) -> MonthKey {
        self.month_key
    }

    pub fn window_start(&self) -> DateTime<Utc> {
        self.window_start
    }

    pub fn total_calls(&self) -> u64 {
        self.total_calls
    }

    pub fn successful_calls(&self) -> u64 {
        self.successful_calls
    }

    pub fn failed_calls(&self) -> u64 {
        self.failed_calls
    }

    pub fn quota_exceeded_calls(&self) -> u64 {
        self.quota_exceeded_calls
    }

    pub fn grace_calls(&self) -> u64 {
        self.grace_calls
    }

    pub fn quota_limit(&self) -> Quota {
        self.quota_limit
    }

    pub fn grace_limit(&self) -> Quota {
        self.grace_limit
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Apply one request outcome to the counters
    pub fn record(&mut self, outcome: UsageOutcome) {
        match outcome {
            UsageOutcome::Admitted { succeeded, grace } => {
                self.total_calls = self.total_calls.saturating_add(1);

                if succeeded {
                    self.successful_calls = self.successful_calls.saturating_add(1);
                } else {
                    self.failed_calls = self.failed_calls.saturating_add(1);
                }

                if grace {
                    self.grace_calls = self.grace_calls.saturating_add(1);
                }
            }
            UsageOutcome::Rejected => {
                self.failed_calls = self.failed_calls.saturating_add(1);
            }
            UsageOutcome::QuotaExceeded => {
                self.quota_exceeded_calls = self.quota_exceeded_calls.saturating_add(1);
            }
        }

        self.updated_at = Utc::now();
    }

    /// Whether this window belongs to a month before `current`
    pub fn needs_reset(&self, current: MonthKey) -> bool {
        self.month_key < current
    }

    /// Rewrite the window in place for `month`.
    ///
    /// Date-gated: a window already at or past `month` is left untouched and
    /// `false` is returned, so repeated or concurrent resets are harmless.
    pub fn roll_forward(&mut self, month: MonthKey, quota_limit: Quota, grace_limit: Quota) -> bool {
        if !self.needs_reset(month) {
            return false;
        }

        self.month_key = month;
        self.window_start = month.start();
        self.total_calls = 0;
        self.successful_calls = 0;
        self.failed_calls = 0;
        self.quota_exceeded_calls = 0;
        self.grace_calls = 0;
        self.quota_limit = quota_limit;
        self.grace_limit = grace_limit;
        self.updated_at = Utc::now();

        true
    }
}
