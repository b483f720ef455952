//! Credential service
//!
//! Provides high-level operations for the credential lifecycle.

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::domain::credential::{
    parse_ip_entry, Credential, CredentialId, CredentialStore, KeyClass, Scope, UserId,
};
use crate::domain::usage::{MonthKey, RateTier, UsageWindow};
use crate::domain::hostname::normalize_allow_list_entry;
use crate::domain::DomainError;
use crate::infrastructure::crypto::{GeneratedKey, KeyCodec};

const MIN_KNOWN_SECRET_LEN: usize = 16;

/// Parameters for issuing a new credential
#[derive(Debug, Clone, Deserialize)]
pub struct IssueCredentialRequest {
    pub owner_id: String,
    pub name: String,
    #[serde(default)]
    pub class: KeyClass,
    #[serde(default)]
    pub tier: RateTier,
    /// Bare addresses or CIDR blocks
    #[serde(default)]
    pub allowed_ips: Vec<String>,
    #[serde(default)]
    pub allowed_domains: Vec<String>,
    #[serde(default)]
    pub scopes: Vec<Scope>,
}

impl IssueCredentialRequest {
    pub fn new(owner_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            name: name.into(),
            class: KeyClass::default(),
            tier: RateTier::default(),
            allowed_ips: Vec::new(),
            allowed_domains: Vec::new(),
            scopes: Vec::new(),
        }
    }
}

/// Result of issuing or rotating a credential
pub struct IssuedCredential {
    /// The stored credential (without the secret)
    pub credential: Credential,
    /// The full secret (only returned once)
    pub secret: Zeroizing<String>,
}

impl fmt::Debug for IssuedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedCredential")
            .field("credential", &self.credential)
            .field("secret", &"[hidden]")
            .finish()
    }
}

/// Credential lifecycle service
#[derive(Debug, Clone)]
pub struct CredentialService {
    store: Arc<dyn CredentialStore>,
    codec: KeyCodec,
}

impl CredentialService {
    pub fn new(store: Arc<dyn CredentialStore>, codec: KeyCodec) -> Self {
        Self { store, codec }
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Generate a secret, persist its hash and an owner-scoped encrypted copy
    pub async fn issue(&self, request: IssueCredentialRequest) -> Result<IssuedCredential, DomainError> {
        let generated = self.codec.generate(request.class.prefix());
        self.store_new(request, generated).await
    }

    /// Register a secret chosen by the operator, e.g. a bootstrap admin key
    pub async fn issue_with_secret(
        &self,
        request: IssueCredentialRequest,
        secret: &str,
    ) -> Result<IssuedCredential, DomainError> {
        if secret.trim().len() < MIN_KNOWN_SECRET_LEN {
            return Err(DomainError::validation(format!(
                "Supplied secret must be at least {} characters",
                MIN_KNOWN_SECRET_LEN
            )));
        }

        let adopted = self.codec.adopt(secret.trim());
        self.store_new(request, adopted).await
    }

    async fn store_new(
        &self,
        request: IssueCredentialRequest,
        generated: GeneratedKey,
    ) -> Result<IssuedCredential, DomainError> {
        let owner_id =
            UserId::new(&request.owner_id).map_err(|e| DomainError::validation(e.to_string()))?;

        if request.name.trim().is_empty() {
            return Err(DomainError::validation("Credential name must not be empty"));
        }

        let allowed_ips = request
            .allowed_ips
            .iter()
            .map(|entry| parse_ip_entry(entry))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| DomainError::validation(e.to_string()))?;

        let allowed_domains = request
            .allowed_domains
            .iter()
            .map(|entry| normalize_allow_list_entry(entry))
            .collect::<Result<Vec<_>, _>>()?;

        let id = CredentialId::generate();
        info!(credential_id = %id, owner_id = %owner_id, tier = %request.tier, "Issuing credential");

        let encrypted = self.codec.encrypt(&generated.secret, owner_id.as_str())?;

        let mut scopes = request.scopes;
        if request.class == KeyClass::Admin && !scopes.contains(&Scope::Admin) {
            scopes.push(Scope::Admin);
        }

        let credential = Credential::new(
            id,
            owner_id,
            request.name.trim(),
            &generated.hash,
            &generated.display_prefix,
        )
        .with_encrypted_secret(encrypted)
        .with_tier(request.tier)
        .with_allowed_ips(allowed_ips)
        .with_allowed_domains(allowed_domains)
        .with_scopes(scopes);

        let created = self.store.insert_credential(credential).await?;

        info!(credential_id = %created.id(), key_prefix = %created.key_prefix(), "Credential issued");

        Ok(IssuedCredential {
            credential: created,
            secret: Zeroizing::new(generated.secret.clone()),
        })
    }

    pub async fn get(&self, id: &CredentialId) -> Result<Option<Credential>, DomainError> {
        self.store.find_by_id(id).await
    }

    pub async fn list_by_owner(&self, owner_id: &UserId) -> Result<Vec<Credential>, DomainError> {
        self.store.list_by_owner(owner_id).await
    }

    /// Soft-deactivate a credential
    pub async fn revoke(&self, id: &CredentialId) -> Result<Credential, DomainError> {
        info!(credential_id = %id, "Revoking credential");

        let mut credential = self.require(id).await?;
        credential.revoke();

        self.store.update_credential(&credential).await
    }

    /// Replace the secret of an active credential, keeping its id and usage
    pub async fn rotate(&self, id: &CredentialId) -> Result<IssuedCredential, DomainError> {
        info!(credential_id = %id, "Rotating credential");

        let mut credential = self.require(id).await?;

        if !credential.is_active() {
            return Err(DomainError::conflict(format!(
                "Credential '{}' is revoked and cannot be rotated",
                id
            )));
        }

        let prefix = KeyCodec::base_prefix(credential.key_prefix());
        let generated = self.codec.generate(&prefix);
        let encrypted = self
            .codec
            .encrypt(&generated.secret, credential.owner_id().as_str())?;

        credential.rotate(&generated.hash, &generated.display_prefix, Some(encrypted));
        let updated = self.store.update_credential(&credential).await?;

        debug!(credential_id = %id, key_prefix = %updated.key_prefix(), "Credential rotated");

        Ok(IssuedCredential {
            credential: updated,
            secret: Zeroizing::new(generated.secret.clone()),
        })
    }

    /// Decrypt the stored secret for its owner.
    ///
    /// Crypto failures surface as `DomainError::Crypto`.
    pub async fn reveal(
        &self,
        id: &CredentialId,
        owner_id: &UserId,
    ) -> Result<Zeroizing<String>, DomainError> {
        let credential = self.require(id).await?;

        if credential.owner_id() != owner_id {
            return Err(DomainError::not_found(format!("Credential '{}' not found", id)));
        }

        let encrypted = credential.encrypted_secret().ok_or_else(|| {
            DomainError::not_found(format!("Credential '{}' has no recoverable secret", id))
        })?;

        Ok(self.codec.decrypt(encrypted, owner_id.as_str())?)
    }

    /// Change the tier; limits follow at the next window reset
    pub async fn set_tier(&self, id: &CredentialId, tier: RateTier) -> Result<Credential, DomainError> {
        info!(credential_id = %id, tier = %tier, "Updating credential tier");
        if tier.is_legacy() {
            warn!(credential_id = %id, tier = %tier, "Assigning a legacy tier");
        }

        let mut credential = self.require(id).await?;
        credential.set_tier(tier);

        self.store.update_credential(&credential).await
    }

    pub async fn usage_window(
        &self,
        id: &CredentialId,
        month: MonthKey,
    ) -> Result<UsageWindow, DomainError> {
        self.store.load_usage_window(id, month).await
    }

    async fn require(&self, id: &CredentialId) -> Result<Credential, DomainError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("Credential '{}' not found", id)))
    }
}
