//! Domain layer - Core entities, policies and collaborator traits

pub mod auth;
pub mod credential;
pub mod error;
pub mod hostname;
pub mod request_log;
pub mod usage;

pub use auth::{
    AuthMethod, AuthenticationOutcome, Credentials, FailureReason, TokenClaims, TokenError,
    TokenVerifier,
};
pub use credential::{Credential, CredentialId, CredentialStore, KeyClass, Scope, UserId};
pub use error::{CryptoError, DomainError};
pub use hostname::Environment;
pub use request_log::{Disposition, RequestLogEntry, RequestLogger};
pub use usage::{
    EnforcementMode, MonthKey, Quota, QuotaStatus, RateLimitPolicy, RateTier, UsageOutcome,
    UsageWindow,
};
