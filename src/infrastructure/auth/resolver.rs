//! Authentication strategy resolution

use std::sync::Arc;

use axum::http::HeaderMap;
use tracing::debug;

use crate::config::AuthConfig;
use crate::domain::auth::{
    AuthenticationOutcome, Credentials, FailureReason, TokenError, TokenVerifier,
};
use crate::domain::credential::{verify_secret, CredentialStore};
use crate::domain::DomainError;

/// Runs the configured authentication method(s) against request headers
#[derive(Clone)]
pub struct AuthResolver {
    config: Arc<AuthConfig>,
    store: Arc<dyn CredentialStore>,
    verifier: Option<Arc<dyn TokenVerifier>>,
}

impl std::fmt::Debug for AuthResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthResolver")
            .field("method", &self.config.method)
            .field("fallback", &self.config.fallback)
            .field("token_verifier", &self.verifier.is_some())
            .finish()
    }
}

impl AuthResolver {
    pub fn new(config: Arc<AuthConfig>, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            config,
            store,
            verifier: None,
        }
    }

    pub fn with_token_verifier(mut self, verifier: Arc<dyn TokenVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Authenticate a request.
    ///
    /// Credential problems come back as failed outcomes; only store and
    /// configuration errors are `Err`.
    pub async fn resolve(&self, headers: &HeaderMap) -> Result<AuthenticationOutcome, DomainError> {
        let (primary, secondary) = self.config.method.attempt_order();

        let outcome = self.attempt(primary, headers).await?;
        if outcome.is_success() {
            return Ok(outcome);
        }

        match secondary {
            Some(next) if self.config.fallback => {
                debug!(
                    failed = %primary,
                    reason = ?outcome.reason(),
                    fallback = %next,
                    "Primary authentication failed, trying fallback"
                );
                self.attempt(next, headers).await
            }
            _ => Ok(outcome),
        }
    }

    /// Whether the request carries any header the configured method reads
    pub fn presents_credentials(&self, headers: &HeaderMap) -> bool {
        let (primary, secondary) = self.config.method.attempt_order();

        std::iter::once(primary)
            .chain(secondary)
            .any(|kind| headers.contains_key(self.header_name(kind)))
    }

    fn header_name(&self, kind: Credentials) -> &str {
        match kind {
            Credentials::ApiKey => &self.config.api_key_header,
            Credentials::Token => &self.config.token_header,
        }
    }

    async fn attempt(
        &self,
        kind: Credentials,
        headers: &HeaderMap,
    ) -> Result<AuthenticationOutcome, DomainError> {
        match kind {
            Credentials::ApiKey => self.authenticate_api_key(headers).await,
            Credentials::Token => self.authenticate_token(headers),
        }
    }

    async fn authenticate_api_key(
        &self,
        headers: &HeaderMap,
    ) -> Result<AuthenticationOutcome, DomainError> {
        let Some(raw) = headers.get(self.config.api_key_header.as_str()) else {
            return Ok(AuthenticationOutcome::failure(FailureReason::ApiKeyMissing));
        };

        let Ok(raw) = raw.to_str() else {
            return Ok(AuthenticationOutcome::failure(FailureReason::ApiKeyInvalid));
        };

        let secret = strip_prefix_ignore_case(raw.trim(), &self.config.api_key_prefix)
            .unwrap_or(raw)
            .trim();

        if secret.is_empty() {
            return Ok(AuthenticationOutcome::failure(FailureReason::ApiKeyMissing));
        }

        let Some(credential) = self.store.find_by_raw_then_hash(secret).await? else {
            debug!("API key lookup found no credential");
            return Ok(AuthenticationOutcome::failure(FailureReason::ApiKeyInvalid));
        };

        if !verify_secret(secret, credential.secret_hash()) {
            return Ok(AuthenticationOutcome::failure(FailureReason::ApiKeyInvalid));
        }

        if !credential.is_active() {
            debug!(credential_id = %credential.id(), "API key is inactive");
            return Ok(AuthenticationOutcome::failure(FailureReason::ApiKeyInactive));
        }

        Ok(AuthenticationOutcome::api_key(credential))
    }

    fn authenticate_token(&self, headers: &HeaderMap) -> Result<AuthenticationOutcome, DomainError> {
        let Some(raw) = headers.get(self.config.token_header.as_str()) else {
            return Ok(AuthenticationOutcome::failure(FailureReason::TokenMissing));
        };

        let Ok(raw) = raw.to_str() else {
            return Ok(AuthenticationOutcome::failure(FailureReason::TokenMalformed));
        };

        let Some(token) = strip_prefix_ignore_case(raw.trim(), &self.config.token_prefix) else {
            return Ok(AuthenticationOutcome::failure(FailureReason::TokenMalformed));
        };

        let token = token.trim();
        if token.is_empty() {
            return Ok(AuthenticationOutcome::failure(FailureReason::TokenMissing));
        }

        let verifier = self
            .verifier
            .as_ref()
            .ok_or_else(|| DomainError::configuration("No token verifier configured"))?;

        match verifier.verify(token) {
            Ok(claims) => Ok(AuthenticationOutcome::token(claims.user_id)),
            Err(e) => {
                debug!(error = %e, "Bearer token rejected");
                let reason = match e {
                    TokenError::Expired => FailureReason::TokenExpired,
                    TokenError::BadSignature => FailureReason::TokenBadSignature,
                    TokenError::Malformed(_) => FailureReason::TokenMalformed,
                };
                Ok(AuthenticationOutcome::failure(reason))
            }
        }
    }
}

/// `Some(rest)` when `value` starts with `prefix`, ignoring ASCII case
fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix.is_empty() {
        return Some(value);
    }

    let head = value.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        value.get(prefix.len()..)
    } else {
        None
    }
}
