//! Authenticated identity attached to admitted requests

use axum::{extract::FromRequestParts, http::request::Parts};
use serde::Serialize;

use crate::api::types::ApiError;
use crate::domain::auth::{AuthenticationOutcome, Credentials};
use crate::domain::credential::Scope;
use crate::domain::usage::RateTier;

/// Who the gateway let through. Inserted into request extensions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub user_id: Option<String>,
    pub credential_id: Option<String>,
    pub method: Option<Credentials>,
    pub tier: Option<RateTier>,
    pub scopes: Vec<Scope>,
}

impl Principal {
    /// Caller allowed in without credentials
    pub fn anonymous() -> Self {
        Self {
            user_id: None,
            credential_id: None,
            method: None,
            tier: None,
            scopes: Vec::new(),
        }
    }

    pub fn from_outcome(outcome: &AuthenticationOutcome) -> Self {
        match outcome.credential() {
            Some(credential) => {
                let mut scopes: Vec<Scope> = credential.scopes().iter().copied().collect();
                scopes.sort_by_key(|s| scope_name(*s));
                Self {
                    user_id: Some(credential.owner_id().to_string()),
                    credential_id: Some(credential.id().to_string()),
                    method: Some(Credentials::ApiKey),
                    tier: Some(credential.tier()),
                    scopes,
                }
            }
            None => Self {
                user_id: outcome.user_id().map(str::to_string),
                credential_id: None,
                method: Some(outcome.method()),
                tier: None,
                scopes: Vec::new(),
            },
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.user_id.is_none()
    }

    pub fn has_scope(&self, scope: Scope) -> bool {
        self.scopes.contains(&scope)
    }

    pub fn require_scope(&self, scope: Scope) -> Result<(), ApiError> {
        if self.has_scope(scope) {
            Ok(())
        } else {
            Err(ApiError::forbidden(
                "insufficient_scope",
                format!("This operation requires the '{}' scope", scope_name(scope)),
            ))
        }
    }
}

fn scope_name(scope: Scope) -> &'static str {
    match scope {
        Scope::DomainlessAccess => "domainless_access",
        Scope::Admin => "admin",
        Scope::UsageRead => "usage_read",
    }
}

impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<Principal>() {
            Some(principal) if !principal.is_anonymous() => Ok(principal.clone()),
            _ => Err(ApiError::unauthorized(
                "unauthenticated",
                "Authentication required",
            )),
        }
    }
}
