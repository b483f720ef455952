//! Credential domain
//!
//! API key entities, the one-way secret hash, and the store interface used
//! for lookups and usage accounting.

mod entity;
mod repository;
mod secret;
mod validation;

pub use entity::{Credential, CredentialId, KeyClass, Scope, UserId};
pub use repository::CredentialStore;
pub use secret::{constant_time_eq, hash_secret, verify_secret};
pub use validation::{
    parse_ip_entry, validate_credential_id, validate_owner_id, CredentialValidationError,
};
