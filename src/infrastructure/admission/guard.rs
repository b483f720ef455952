//! Post-authentication admission checks: IP, domain and quota

use std::net::IpAddr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use ipnet::IpNet;
use serde::Serialize;
use tracing::debug;

use crate::config::RateLimitConfig;
use crate::domain::auth::AuthenticationOutcome;
use crate::domain::credential::{Credential, CredentialStore, Scope};
use crate::domain::hostname::{matches_allow_list, normalize_host, Environment};
use crate::domain::usage::{MonthKey, Quota, QuotaStatus, RateLimitPolicy, UsageOutcome};
use crate::domain::DomainError;

/// Transport-level facts about the caller
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip: Option<IpAddr>,
    /// Raw `Origin` (or `Referer`) header value
    pub origin: Option<String>,
}

impl ClientInfo {
    pub fn new(ip: Option<IpAddr>, origin: Option<String>) -> Self {
        Self { ip, origin }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionCheck {
    Ip,
    Domain,
    Quota,
}

impl AdmissionCheck {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ip => "ip",
            Self::Domain => "domain",
            Self::Quota => "quota",
        }
    }
}

/// One failed admission check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdmissionFailure {
    pub check: AdmissionCheck,
    pub message: String,
}

/// Quota position of the call being admitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaSnapshot {
    pub limit: Quota,
    /// Calls counted before this one
    pub used: u64,
    pub status: QuotaStatus,
    /// First instant of the next window
    pub resets_at: DateTime<Utc>,
}

impl QuotaSnapshot {
    /// Calls left after this one, `None` when unlimited
    pub fn remaining(&self) -> Option<u64> {
        self.limit
            .value()
            .map(|limit| limit.saturating_sub(self.used.saturating_add(1)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionDecision {
    Admitted {
        quota: Option<QuotaSnapshot>,
    },
    Denied {
        failures: Vec<AdmissionFailure>,
        quota: Option<QuotaSnapshot>,
    },
}

impl AdmissionDecision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted { .. })
    }

    pub fn quota(&self) -> Option<&QuotaSnapshot> {
        match self {
            Self::Admitted { quota } | Self::Denied { quota, .. } => quota.as_ref(),
        }
    }

    pub fn failures(&self) -> &[AdmissionFailure] {
        match self {
            Self::Admitted { .. } => &[],
            Self::Denied { failures, .. } => failures,
        }
    }

    /// 403 for IP/domain failures, 429 when only the quota failed
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Admitted { .. } => 200,
            Self::Denied { failures, .. } => {
                if failures.iter().all(|f| f.check == AdmissionCheck::Quota) {
                    429
                } else {
                    403
                }
            }
        }
    }

    /// How a denial is counted against the credential's window
    pub fn denial_usage(&self) -> Option<UsageOutcome> {
        match self {
            Self::Admitted { .. } => None,
            Self::Denied { .. } if self.status_code() == 429 => Some(UsageOutcome::QuotaExceeded),
            Self::Denied { .. } => Some(UsageOutcome::Rejected),
        }
    }
}

/// Applies allow-lists and quotas after successful authentication
#[derive(Debug, Clone)]
pub struct AdmissionGuard {
    store: Arc<dyn CredentialStore>,
    policy: RateLimitPolicy,
    rate_limit: Arc<RateLimitConfig>,
    environment: Environment,
}

impl AdmissionGuard {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        rate_limit: Arc<RateLimitConfig>,
        environment: Environment,
    ) -> Self {
        Self {
            store,
            policy: RateLimitPolicy::new(rate_limit.mode),
            rate_limit,
            environment,
        }
    }

    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    /// Run every check and report all failures.
    ///
    /// Token-authenticated requests carry no credential and are admitted.
    pub async fn check(
        &self,
        outcome: &AuthenticationOutcome,
        client: &ClientInfo,
        now: DateTime<Utc>,
    ) -> Result<AdmissionDecision, DomainError> {
        let Some(credential) = outcome.credential() else {
            return Ok(AdmissionDecision::Admitted { quota: None });
        };

        let mut failures = Vec::new();

        if let Some(failure) = check_ip(credential, client.ip) {
            failures.push(failure);
        }

        if let Some(failure) = self.check_domain(credential, client.origin.as_deref()) {
            failures.push(failure);
        }

        let mut quota = None;
        if self.rate_limit.applies_to(outcome.method()) {
            let window = self
                .store
                .load_usage_window(credential.id(), MonthKey::of(now))
                .await?;

            let used = window.total_calls();
            let status = self.policy.evaluate_window(&window);

            if !status.is_admitted() {
                failures.push(AdmissionFailure {
                    check: AdmissionCheck::Quota,
                    message: format!(
                        "Monthly quota of {} requests exceeded",
                        window.quota_limit()
                    ),
                });
            }

            quota = Some(QuotaSnapshot {
                limit: window.quota_limit(),
                used,
                status,
                resets_at: self.policy.window_end(window.window_start(), credential.tier()),
            });
        }

        if failures.is_empty() {
            Ok(AdmissionDecision::Admitted { quota })
        } else {
            debug!(
                credential_id = %credential.id(),
                failed_checks = ?failures.iter().map(|f| f.check.as_str()).collect::<Vec<_>>(),
                "Admission denied"
            );
            Ok(AdmissionDecision::Denied { failures, quota })
        }
    }

    fn check_domain(&self, credential: &Credential, origin: Option<&str>) -> Option<AdmissionFailure> {
        let entries = credential.allowed_domains();

        if entries.is_empty() || credential.has_scope(Scope::DomainlessAccess) {
            return None;
        }

        let host = origin.and_then(normalize_host);

        match host {
            Some(host) if matches_allow_list(&host, entries, self.environment) => None,
            Some(host) => Some(AdmissionFailure {
                check: AdmissionCheck::Domain,
                message: format!("Origin '{}' is not allowed for this API key", host),
            }),
            None => Some(AdmissionFailure {
                check: AdmissionCheck::Domain,
                message: "Request origin is required for this API key".to_string(),
            }),
        }
    }
}

fn check_ip(credential: &Credential, ip: Option<IpAddr>) -> Option<AdmissionFailure> {
    let entries = credential.allowed_ips();

    if entries.is_empty() {
        return None;
    }

    match ip {
        Some(ip) if ip_allowed(entries, ip) => None,
        Some(ip) => Some(AdmissionFailure {
            check: AdmissionCheck::Ip,
            message: format!("IP address {} is not allowed for this API key", unmap(ip)),
        }),
        None => Some(AdmissionFailure {
            check: AdmissionCheck::Ip,
            message: "Client IP address could not be determined".to_string(),
        }),
    }
}

/// Whether `ip` (or its unmapped IPv4 form) falls in any entry
pub fn ip_allowed(entries: &[IpNet], ip: IpAddr) -> bool {
    let unmapped = unmap(ip);
    entries
        .iter()
        .any(|net| net.contains(&unmapped) || net.contains(&ip))
}

/// `::ffff:a.b.c.d` becomes `a.b.c.d`
pub fn unmap(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(ip),
        IpAddr::V4(_) => ip,
    }
}
