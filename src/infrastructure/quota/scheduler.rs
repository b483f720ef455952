//! Monthly usage window roll-forward

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::domain::credential::CredentialStore;
use crate::domain::usage::{grace_for, MonthKey, UsageWindow};
use crate::domain::DomainError;
use crate::infrastructure::observability::record_quota_resets;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetFailure {
    pub credential_id: String,
    pub reason: String,
}

/// Outcome of one reset pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetSummary {
    pub processed: u64,
    pub succeeded: u64,
    /// Already rolled forward by a concurrent writer
    pub skipped: u64,
    pub failed: u64,
    pub failures: Vec<ResetFailure>,
}

enum ResetResult {
    Reset,
    Skipped,
}

/// Rolls stale usage windows forward to the current month
#[derive(Debug, Clone)]
pub struct QuotaResetScheduler {
    store: Arc<dyn CredentialStore>,
    period: Duration,
}

impl QuotaResetScheduler {
    pub fn new(store: Arc<dyn CredentialStore>, period: Duration) -> Self {
        Self { store, period }
    }

    /// Reset every window from a month before `now`'s.
    ///
    /// Safe to run concurrently with itself and with the periodic task:
    /// each window is swapped only if its month is still the one listed.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<ResetSummary, DomainError> {
        let current = MonthKey::of(now);
        let stale = self.store.list_windows_needing_reset(current).await?;

        let mut summary = ResetSummary::default();

        for window in stale {
            summary.processed += 1;
            let credential_id = window.credential_id().to_string();

            match self.reset(window, current).await {
                Ok(ResetResult::Reset) => summary.succeeded += 1,
                Ok(ResetResult::Skipped) => summary.skipped += 1,
                Err(e) => {
                    warn!(credential_id = %credential_id, error = %e, "Quota reset failed");
                    summary.failed += 1;
                    summary.failures.push(ResetFailure {
                        credential_id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        record_quota_resets(summary.succeeded, summary.failed);

        info!(
            month = %current,
            processed = summary.processed,
            succeeded = summary.succeeded,
            skipped = summary.skipped,
            failed = summary.failed,
            "Quota reset pass complete"
        );

        Ok(summary)
    }

    async fn reset(&self, window: UsageWindow, current: MonthKey) -> Result<ResetResult, DomainError> {
        let credential = self
            .store
            .find_by_id(window.credential_id())
            .await?
            .ok_or_else(|| {
                DomainError::not_found(format!("Credential '{}' not found", window.credential_id()))
            })?;

        let quota = credential.tier().quota();
        let expected = window.month_key();

        let mut fresh = window;
        if !fresh.roll_forward(current, quota, grace_for(quota)) {
            return Ok(ResetResult::Skipped);
        }

        if self.store.reset_window(expected, fresh).await? {
            debug!(
                credential_id = %credential.id(),
                from = %expected,
                to = %current,
                tier = %credential.tier(),
                "Usage window reset"
            );
            Ok(ResetResult::Reset)
        } else {
            Ok(ResetResult::Skipped)
        }
    }

    /// Run a pass every period until `shutdown` flips to `true` or its sender drops
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            info!(period_secs = self.period.as_secs(), "Quota reset scheduler started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.run_once(Utc::now()).await {
                            error!(error = %e, "Quota reset pass failed");
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            info!("Quota reset scheduler stopping");
                            break;
                        }
                    }
                }
            }
        })
    }
}
