//! Per-request authentication results

use serde::Serialize;

use super::method::Credentials;
use crate::domain::credential::Credential;

/// Why authentication failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    ApiKeyMissing,
    ApiKeyInvalid,
    ApiKeyInactive,
    TokenMissing,
    TokenExpired,
    TokenMalformed,
    TokenBadSignature,
}

impl FailureReason {
    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::ApiKeyMissing => "api_key_missing",
            Self::ApiKeyInvalid => "api_key_invalid",
            Self::ApiKeyInactive => "api_key_inactive",
            Self::TokenMissing => "token_missing",
            Self::TokenExpired => "token_expired",
            Self::TokenMalformed => "token_malformed",
            Self::TokenBadSignature => "token_bad_signature",
        }
    }

    /// Credential kind the failure belongs to
    pub fn credentials(&self) -> Credentials {
        match self {
            Self::ApiKeyMissing | Self::ApiKeyInvalid | Self::ApiKeyInactive => {
                Credentials::ApiKey
            }
            Self::TokenMissing
            | Self::TokenExpired
            | Self::TokenMalformed
            | Self::TokenBadSignature => Credentials::Token,
        }
    }

    /// Nothing was presented for the attempted method
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::ApiKeyMissing | Self::TokenMissing)
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let message = match self {
            Self::ApiKeyMissing => "API key not found",
            Self::ApiKeyInvalid => "Invalid API key",
            Self::ApiKeyInactive => "API key is inactive",
            Self::TokenMissing => "Bearer token not found",
            Self::TokenExpired => "Token has expired",
            Self::TokenMalformed => "Token is malformed",
            Self::TokenBadSignature => "Token signature is invalid",
        };
        write!(f, "{}", message)
    }
}

/// Result of resolving a request's identity
#[derive(Debug, Clone)]
pub struct AuthenticationOutcome {
    success: bool,
    user_id: Option<String>,
    method: Credentials,
    credential: Option<Credential>,
    reason: Option<FailureReason>,
}

impl AuthenticationOutcome {
    /// Authenticated through an API key
    pub fn api_key(credential: Credential) -> Self {
        Self {
            success: true,
            user_id: Some(credential.owner_id().to_string()),
            method: Credentials::ApiKey,
            credential: Some(credential),
            reason: None,
        }
    }

    /// Authenticated through a bearer token
    pub fn token(user_id: impl Into<String>) -> Self {
        Self {
            success: true,
            user_id: Some(user_id.into()),
            method: Credentials::Token,
            credential: None,
            reason: None,
        }
    }

    pub fn failure(reason: FailureReason) -> Self {
        Self {
            success: false,
            user_id: None,
            method: reason.credentials(),
            credential: None,
            reason: Some(reason),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Method that succeeded, or the last one attempted on failure
    pub fn method(&self) -> Credentials {
        self.method
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    pub fn reason(&self) -> Option<FailureReason> {
        self.reason
    }
}
