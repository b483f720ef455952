//! Credential store trait

use async_trait::async_trait;
use std::fmt::Debug;

use super::entity::{Credential, CredentialId, UserId};
use super::secret::hash_secret;
use crate::domain::usage::{MonthKey, UsageOutcome, UsageWindow};
use crate::domain::DomainError;

/// Storage for credentials and their usage windows.
///
/// Implementations serialize mutation per row: `increment_usage` and
/// `reset_window` against the same credential must never interleave.
#[async_trait]
pub trait CredentialStore: Send + Sync + Debug {
    /// Look up a credential by the hex digest of its secret
    async fn find_by_hash(&self, digest: &str) -> Result<Option<Credential>, DomainError>;

    /// Hash a raw secret and look it up
    async fn find_by_raw_then_hash(&self, secret: &str) -> Result<Option<Credential>, DomainError> {
        if secret.is_empty() {
            return Ok(None);
        }
        self.find_by_hash(&hash_secret(secret)).await
    }

    async fn find_by_id(&self, id: &CredentialId) -> Result<Option<Credential>, DomainError>;

    async fn list_by_owner(&self, owner_id: &UserId) -> Result<Vec<Credential>, DomainError>;

    async fn insert_credential(&self, credential: Credential) -> Result<Credential, DomainError>;

    async fn update_credential(&self, credential: &Credential) -> Result<Credential, DomainError>;

    /// Atomically apply one request outcome to the credential's current window
    async fn increment_usage(
        &self,
        id: &CredentialId,
        outcome: UsageOutcome,
    ) -> Result<UsageWindow, DomainError>;

    /// Window for `month`, created lazily from the credential's tier.
    ///
    /// A stored window from an earlier month is rolled forward first, with the
    /// same date gate the reset scheduler uses.
    async fn load_usage_window(
        &self,
        id: &CredentialId,
        month: MonthKey,
    ) -> Result<UsageWindow, DomainError>;

    /// Windows whose month is strictly before `before`
    async fn list_windows_needing_reset(
        &self,
        before: MonthKey,
    ) -> Result<Vec<UsageWindow>, DomainError>;

    /// Unconditionally replace a window
    async fn save_window(&self, window: UsageWindow) -> Result<(), DomainError>;

    /// Replace a window only if its stored month is still `expected_month`.
    ///
    /// Returns `false` when another writer got there first.
    async fn reset_window(
        &self,
        expected_month: MonthKey,
        window: UsageWindow,
    ) -> Result<bool, DomainError>;
}
