//! Credential and usage payloads. Hashes and encrypted secrets never leave the service.

use serde::Serialize;

use crate::domain::credential::{Credential, Scope};
use crate::domain::usage::{Quota, RateTier, UsageWindow};
use crate::infrastructure::credential::IssuedCredential;

#[derive(Debug, Clone, Serialize)]
pub struct CredentialResponse {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub key_prefix: String,
    pub tier: RateTier,
    pub active: bool,
    pub allowed_ips: Vec<String>,
    pub allowed_domains: Vec<String>,
    pub scopes: Vec<Scope>,
    pub last_used_at: Option<String>,
    pub revoked_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Credential> for CredentialResponse {
    fn from(credential: &Credential) -> Self {
        let mut scopes: Vec<Scope> = credential.scopes().iter().copied().collect();
        scopes.sort_by_key(|s| serde_json::to_string(s).unwrap_or_default());

        Self {
            id: credential.id().to_string(),
            owner_id: credential.owner_id().to_string(),
            name: credential.name().to_string(),
            key_prefix: credential.key_prefix().to_string(),
            tier: credential.tier(),
            active: credential.is_active(),
            allowed_ips: credential.allowed_ips().iter().map(|ip| ip.to_string()).collect(),
            allowed_domains: credential.allowed_domains().to_vec(),
            scopes,
            last_used_at: credential.last_used_at().map(|dt| dt.to_rfc3339()),
            revoked_at: credential.revoked_at().map(|dt| dt.to_rfc3339()),
            created_at: credential.created_at().to_rfc3339(),
            updated_at: credential.updated_at().to_rfc3339(),
        }
    }
}

/// Credential plus its secret, returned once on issue or rotate
#[derive(Debug, Clone, Serialize)]
pub struct IssuedCredentialResponse {
    #[serde(flatten)]
    pub credential: CredentialResponse,
    pub secret: String,
}

impl From<IssuedCredential> for IssuedCredentialResponse {
    fn from(issued: IssuedCredential) -> Self {
        Self {
            credential: CredentialResponse::from(&issued.credential),
            secret: issued.secret.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ListCredentialsResponse {
    pub credentials: Vec<CredentialResponse>,
    pub total: usize,
}

impl ListCredentialsResponse {
    pub fn new(credentials: &[Credential]) -> Self {
        Self {
            credentials: credentials.iter().map(CredentialResponse::from).collect(),
            total: credentials.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UsageWindowResponse {
    pub credential_id: String,
    pub month: String,
    pub window_start: String,
    pub total_calls: u64,
    pub successful_calls: u64,
    pub failed_calls: u64,
    pub quota_exceeded_calls: u64,
    pub grace_calls: u64,
    /// `null` when unlimited
    pub quota_limit: Option<u64>,
    pub grace_limit: Option<u64>,
    pub remaining: Option<u64>,
}

impl From<&UsageWindow> for UsageWindowResponse {
    fn from(window: &UsageWindow) -> Self {
        let remaining = match window.quota_limit() {
            Quota::Limited(limit) => Some(limit.saturating_sub(window.total_calls())),
            Quota::Unlimited => None,
        };

        Self {
            credential_id: window.credential_id().to_string(),
            month: window.month_key().to_string(),
            window_start: window.window_start().to_rfc3339(),
            total_calls: window.total_calls(),
            successful_calls: window.successful_calls(),
            failed_calls: window.failed_calls(),
            quota_exceeded_calls: window.quota_exceeded_calls(),
            grace_calls: window.grace_calls(),
            quota_limit: window.quota_limit().value(),
            grace_limit: window.grace_limit().value(),
            remaining,
        }
    }
}
