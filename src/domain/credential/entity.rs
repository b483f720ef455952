//! Credential entity and related types

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use ipnet::IpNet;
use serde::{Deserialize, Serialize};

use super::validation::{validate_credential_id, validate_owner_id, CredentialValidationError};
use crate::domain::usage::RateTier;

/// Credential identifier - alphanumeric + hyphens, max 64 characters
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CredentialId(String);

impl CredentialId {
    /// Create a new CredentialId after validation
    pub fn new(id: impl Into<String>) -> Result<Self, CredentialValidationError> {
        let id = id.into();
        validate_credential_id(&id)?;
        Ok(Self(id))
    }

    /// Fresh random identifier
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CredentialId {
    type Error = CredentialValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CredentialId> for String {
    fn from(id: CredentialId) -> Self {
        id.0
    }
}

impl std::fmt::Display for CredentialId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to the user owning a credential
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Result<Self, CredentialValidationError> {
        let id = id.into();
        validate_owner_id(&id)?;
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for UserId {
    type Error = CredentialValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Capability flags attached to a credential
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Skip the origin domain allow-list check (server-to-server keys)
    DomainlessAccess,
    /// May call the admin surface
    Admin,
    /// Read-only usage reporting
    UsageRead,
}

/// Key class, distinguished only by the secret's prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum KeyClass {
    #[default]
    Standard,
    Admin,
    Business,
}

impl KeyClass {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Standard => "gk",
            Self::Admin => "gk-admin",
            Self::Business => "gk-biz",
        }
    }
}

/// Stored API key. Never holds the raw secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    id: CredentialId,
    owner_id: UserId,
    name: String,
    /// Non-secret leading characters of the key, for display
    key_prefix: String,
    secret_hash: String,
    /// Owner-scoped reversible copy, see `KeyCodec::encrypt`
    #[serde(skip_serializing_if = "Option::is_none")]
    encrypted_secret: Option<String>,
    tier: RateTier,
    active: bool,
    #[serde(default)]
    allowed_ips: Vec<IpNet>,
    #[serde(default)]
    allowed_domains: Vec<String>,
    #[serde(default)]
    scopes: HashSet<Scope>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_used_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    revoked_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Credential {
    pub fn new(
        id: CredentialId,
        owner_id: UserId,
        name: impl Into<String>,
        secret_hash: impl Into<String>,
        key_prefix: impl Into<String>,
    ) -> Self {
        let now = Utc::now();

        Self {
            id,
            owner_id,
            name: name.into(),
            key_prefix: key_prefix.into(),
            secret_hash: secret_hash.into(),
            encrypted_secret: None,
            tier: RateTier::default(),
            active: true,
            allowed_ips: Vec::new(),
            allowed_domains: Vec::new(),
            scopes: HashSet::new(),
            last_used_at: None,
            revoked_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_encrypted_secret(mut self, encrypted: impl Into<String>) -> Self {
        self.encrypted_secret = Some(encrypted.into());
        self
    }

    pub fn with_tier(mut self, tier: RateTier) -> Self {
        self.tier = tier;
        self
    }

    pub fn with_allowed_ips(mut self, ips: impl IntoIterator<Item = IpNet>) -> Self {
        self.allowed_ips = ips.into_iter().collect();
        self
    }

    pub fn with_allowed_domains(mut self, domains: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.allowed_domains = domains
            .into_iter()
            .map(|d| {
                let d: String = d.into();
                d.trim().to_ascii_lowercase()
            })
            .collect();
        self
    }

    pub fn with_scopes(mut self, scopes: impl IntoIterator<Item = Scope>) -> Self {
        self.scopes = scopes.into_iter().collect();
        self
    }

    // Getters

    pub fn id(&self) -> &CredentialId {
        &self.id
    }

    pub fn owner_id(&self) -> &UserId {
        &self.owner_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    pub fn secret_hash(&self) -> &str {
        &self.secret_hash
    }

    pub fn encrypted_secret(&self) -> Option<&str> {
        self.encrypted_secret.as_deref()
    }

    pub fn tier(&self) -> RateTier {
        self.tier
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn allowed_ips(&self) -> &[IpNet] {
        &self.allowed_ips
    }

    pub fn allowed_domains(&self) -> &[String] {
        &self.allowed_domains
    }

    pub fn scopes(&self) -> &HashSet<Scope> {
        &self.scopes
    }

    pub fn has_scope(&self, scope: Scope) -> bool {
        self.scopes.contains(&scope)
    }

    pub fn last_used_at(&self) -> Option<DateTime<Utc>> {
        self.last_used_at
    }

    pub fn revoked_at(&self) -> Option<DateTime<Utc>> {
        self.revoked_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    // Mutators

    /// Soft-deactivate; the row stays for usage history
    pub fn revoke(&mut self) {
        if self.active {
            self.active = false;
            self.revoked_at = Some(Utc::now());
            self.touch();
        }
    }

    /// Swap in a freshly issued secret
    pub fn rotate(
        &mut self,
        secret_hash: impl Into<String>,
        key_prefix: impl Into<String>,
        encrypted_secret: Option<String>,
    ) {
        self.secret_hash = secret_hash.into();
        self.key_prefix = key_prefix.into();
        self.encrypted_secret = encrypted_secret;
        self.touch();
    }

    pub fn set_tier(&mut self, tier: RateTier) {
        self.tier = tier;
        self.touch();
    }

    pub fn record_usage(&mut self) {
        self.last_used_at = Some(Utc::now());
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
