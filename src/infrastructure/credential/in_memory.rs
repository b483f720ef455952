//! In-memory credential store implementation

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::credential::{Credential, CredentialId, CredentialStore, UserId};
use crate::domain::usage::{grace_for, MonthKey, UsageOutcome, UsageWindow};
use crate::domain::DomainError;

#[derive(Debug, Default)]
struct StoreState {
    credentials: HashMap<CredentialId, Credential>,
    hash_index: HashMap<String, CredentialId>,
    windows: HashMap<CredentialId, UsageWindow>,
}

impl StoreState {
    /// Current window for `id` at `month`, rolled forward or created as needed
    fn window_mut(
        &mut self,
        id: &CredentialId,
        month: MonthKey,
    ) -> Result<&mut UsageWindow, DomainError> {
        let tier = self
            .credentials
            .get(id)
            .map(|c| c.tier())
            .ok_or_else(|| DomainError::not_found(format!("Credential '{}' not found", id)))?;

        let quota = tier.quota();
        let grace = grace_for(quota);

        let window = self
            .windows
            .entry(id.clone())
            .or_insert_with(|| UsageWindow::new(id.clone(), month, quota, grace));

        window.roll_forward(month, quota, grace);

        Ok(window)
    }
}

/// In-memory implementation of CredentialStore.
///
/// All state sits behind one lock so every mutation is atomic per row.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCredentialStore {
    state: Arc<RwLock<StoreState>>,
}

impl InMemoryCredentialStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_by_hash(&self, digest: &str) -> Result<Option<Credential>, DomainError> {
        let state = self.state.read().await;

        Ok(state
            .hash_index
            .get(digest)
            .and_then(|id| state.credentials.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: &CredentialId) -> Result<Option<Credential>, DomainError> {
        let state = self.state.read().await;
        Ok(state.credentials.get(id).cloned())
    }

    async fn list_by_owner(&self, owner_id: &UserId) -> Result<Vec<Credential>, DomainError> {
        let state = self.state.read().await;

        let mut result: Vec<Credential> = state
            .credentials
            .values()
            .filter(|c| c.owner_id() == owner_id)
            .cloned()
            .collect();

        result.sort_by_key(|c| c.created_at());
        Ok(result)
    }

    async fn insert_credential(&self, credential: Credential) -> Result<Credential, DomainError> {
        let mut state = self.state.write().await;

        if state.credentials.contains_key(credential.id()) {
            return Err(DomainError::conflict(format!(
                "Credential with ID '{}' already exists",
                credential.id()
            )));
        }

        if state.hash_index.contains_key(credential.secret_hash()) {
            return Err(DomainError::conflict("Credential secret already in use"));
        }

        state
            .hash_index
            .insert(credential.secret_hash().to_string(), credential.id().clone());
        state
            .credentials
            .insert(credential.id().clone(), credential.clone());

        Ok(credential)
    }

    async fn update_credential(&self, credential: &Credential) -> Result<Credential, DomainError> {
        let mut state = self.state.write().await;

        let previous_hash = state
            .credentials
            .get(credential.id())
            .map(|c| c.secret_hash().to_string())
            .ok_or_else(|| {
                DomainError::not_found(format!("Credential '{}' not found", credential.id()))
            })?;

        if previous_hash != credential.secret_hash() {
            if state.hash_index.contains_key(credential.secret_hash()) {
                return Err(DomainError::conflict("Credential secret already in use"));
            }
            state.hash_index.remove(&previous_hash);
            state
                .hash_index
                .insert(credential.secret_hash().to_string(), credential.id().clone());
        }

        state
            .credentials
            .insert(credential.id().clone(), credential.clone());

        Ok(credential.clone())
    }

    async fn increment_usage(
        &self,
        id: &CredentialId,
        outcome: UsageOutcome,
    ) -> Result<UsageWindow, DomainError> {
        let mut state = self.state.write().await;
        let month = MonthKey::of(Utc::now());

        let window = state.window_mut(id, month)?;
        window.record(outcome);
        let snapshot = window.clone();

        if matches!(outcome, UsageOutcome::Admitted { .. }) {
            if let Some(credential) = state.credentials.get_mut(id) {
                credential.record_usage();
            }
        }

        Ok(snapshot)
    }

    async fn load_usage_window(
        &self,
        id: &CredentialId,
        month: MonthKey,
    ) -> Result<UsageWindow, DomainError> {
        let mut state = self.state.write().await;
        let window = state.window_mut(id, month)?;
        Ok(window.clone())
    }

    async fn list_windows_needing_reset(
        &self,
        before: MonthKey,
    ) -> Result<Vec<UsageWindow>, DomainError> {
        let state = self.state.read().await;

        Ok(state
            .windows
            .values()
            .filter(|w| w.needs_reset(before))
            .cloned()
            .collect())
    }

    async fn save_window(&self, window: UsageWindow) -> Result<(), DomainError> {
        let mut state = self.state.write().await;
        state.windows.insert(window.credential_id().clone(), window);
        Ok(())
    }

    async fn reset_window(
        &self,
        expected_month: MonthKey,
        window: UsageWindow,
    ) -> Result<bool, DomainError> {
        let mut state = self.state.write().await;

        match state.windows.get(window.credential_id()) {
            Some(current) if current.month_key() == expected_month => {
                state.windows.insert(window.credential_id().clone(), window);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::credential::hash_secret;
    use crate::domain::usage::{Quota, RateTier};

    fn credential(id: &str, secret: &str, tier: RateTier) -> Credential {
        Credential::new(
            CredentialId::new(id).unwrap(),
            UserId::new("user-1").unwrap(),
            "Test key",
            hash_secret(secret),
            "gk-abcd",
        )
        .with_tier(tier)
    }

    #[tokio::test]
    async fn test_insert_and_find_by_hash() {
        let store = InMemoryCredentialStore::new();
        store
            .insert_credential(credential("key-1", "gk-secret", RateTier::Free))
            .await
            .unwrap();

        let found = store.find_by_hash(&hash_secret("gk-secret")).await.unwrap();
        assert_eq!(found.unwrap().id().as_str(), "key-1");

        let found = store.find_by_raw_then_hash("gk-secret").await.unwrap();
        assert!(found.is_some());

        assert!(store.find_by_raw_then_hash("gk-other").await.unwrap().is_none());
        assert!(store.find_by_raw_then_hash("").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_duplicate_conflicts() {
        let store = InMemoryCredentialStore::new();
        store
            .insert_credential(credential("key-1", "gk-a", RateTier::Free))
            .await
            .unwrap();

        let same_id = store
            .insert_credential(credential("key-1", "gk-b", RateTier::Free))
            .await;
        assert!(matches!(same_id, Err(DomainError::Conflict { .. })));

        let same_secret = store
            .insert_credential(credential("key-2", "gk-a", RateTier::Free))
            .await;
        assert!(matches!(same_secret, Err(DomainError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_update_reindexes_rotated_hash() {
        let store = InMemoryCredentialStore::new();
        let mut key = store
            .insert_credential(credential("key-1", "gk-old", RateTier::Free))
            .await
            .unwrap();

        key.rotate(hash_secret("gk-new"), "gk-newp", None);
        store.update_credential(&key).await.unwrap();

        assert!(store.find_by_raw_then_hash("gk-old").await.unwrap().is_none());
        assert!(store.find_by_raw_then_hash("gk-new").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let store = InMemoryCredentialStore::new();
        let key = credential("key-1", "gk-a", RateTier::Free);
        let result = store.update_credential(&key).await;
        assert!(matches!(result, Err(DomainError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_list_by_owner() {
        let store = InMemoryCredentialStore::new();
        store
            .insert_credential(credential("key-1", "gk-a", RateTier::Free))
            .await
            .unwrap();
        store
            .insert_credential(credential("key-2", "gk-b", RateTier::Pro))
            .await
            .unwrap();

        let owned = store
            .list_by_owner(&UserId::new("user-1").unwrap())
            .await
            .unwrap();
        assert_eq!(owned.len(), 2);

        let none = store
            .list_by_owner(&UserId::new("user-2").unwrap())
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_load_window_created_from_tier() {
        let store = InMemoryCredentialStore::new();
        store
            .insert_credential(credential("key-1", "gk-a", RateTier::Pro))
            .await
            .unwrap();

        let month = MonthKey::new(2024, 3).unwrap();
        let window = store
            .load_usage_window(&CredentialId::new("key-1").unwrap(), month)
            .await
            .unwrap();

        assert_eq!(window.month_key(), month);
        assert_eq!(window.total_calls(), 0);
        assert_eq!(window.quota_limit(), Quota::Limited(1000));
        assert_eq!(window.grace_limit(), Quota::Limited(1100));
    }

    #[tokio::test]
    async fn test_load_window_unknown_credential() {
        let store = InMemoryCredentialStore::new();
        let result = store
            .load_usage_window(
                &CredentialId::new("missing").unwrap(),
                MonthKey::new(2024, 3).unwrap(),
            )
            .await;
        assert!(matches!(result, Err(DomainError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_increment_usage_counts() {
        let store = InMemoryCredentialStore::new();
        store
            .insert_credential(credential("key-1", "gk-a", RateTier::Free))
            .await
            .unwrap();
        let id = CredentialId::new("key-1").unwrap();

        store
            .increment_usage(&id, UsageOutcome::Admitted { succeeded: true, grace: false })
            .await
            .unwrap();
        store
            .increment_usage(&id, UsageOutcome::Admitted { succeeded: false, grace: false })
            .await
            .unwrap();
        store.increment_usage(&id, UsageOutcome::Rejected).await.unwrap();
        let window = store
            .increment_usage(&id, UsageOutcome::QuotaExceeded)
            .await
            .unwrap();

        assert_eq!(window.total_calls(), 2);
        assert_eq!(window.successful_calls(), 1);
        assert_eq!(window.failed_calls(), 2);
        assert_eq!(window.quota_exceeded_calls(), 1);

        let key = store.find_by_id(&id).await.unwrap().unwrap();
        assert!(key.last_used_at().is_some());
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_not_lost() {
        let store = InMemoryCredentialStore::new();
        store
            .insert_credential(credential("key-1", "gk-a", RateTier::Pro))
            .await
            .unwrap();
        let id = CredentialId::new("key-1").unwrap();

        let mut handles = Vec::new();
        for _ in 0..50 {
            let store = store.clone();
            let id = id.clone();
            handles.push(tokio::spawn(async move {
                store
                    .increment_usage(&id, UsageOutcome::Admitted { succeeded: true, grace: false })
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let window = store
            .load_usage_window(&id, MonthKey::of(Utc::now()))
            .await
            .unwrap();
        assert_eq!(window.total_calls(), 50);
    }

    #[tokio::test]
    async fn test_reset_window_compare_and_swap() {
        let store = InMemoryCredentialStore::new();
        store
            .insert_credential(credential("key-1", "gk-a", RateTier::Free))
            .await
            .unwrap();
        let id = CredentialId::new("key-1").unwrap();

        let january = MonthKey::new(2024, 1).unwrap();
        let february = MonthKey::new(2024, 2).unwrap();

        let mut stale = UsageWindow::new(id.clone(), january, Quota::Limited(100), Quota::Limited(110));
        stale.record(UsageOutcome::Admitted { succeeded: true, grace: false });
        store.save_window(stale.clone()).await.unwrap();

        let pending = store.list_windows_needing_reset(february).await.unwrap();
        assert_eq!(pending.len(), 1);

        let mut fresh = stale.clone();
        assert!(fresh.roll_forward(february, Quota::Limited(100), Quota::Limited(110)));

        assert!(store.reset_window(january, fresh.clone()).await.unwrap());
        // Second writer sees the month already moved on
        assert!(!store.reset_window(january, fresh).await.unwrap());

        assert!(store.list_windows_needing_reset(february).await.unwrap().is_empty());
    }
}
