//! Credential storage and lifecycle

mod in_memory;
mod service;

pub use in_memory::InMemoryCredentialStore;
pub use service::{CredentialService, IssueCredentialRequest, IssuedCredential};
