//! Credential identifier validation

use std::net::IpAddr;

use ipnet::IpNet;
use thiserror::Error;

/// Errors that can occur while validating credential or owner identifiers
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CredentialValidationError {
    #[error("Identifier cannot be empty")]
    EmptyId,

    #[error("Identifier exceeds maximum length of {0} characters")]
    TooLong(usize),

    #[error("Credential ID must start and end with a letter or number")]
    InvalidBoundary,

    #[error("Identifier contains invalid character: '{0}'")]
    InvalidCharacter(char),

    #[error("Credential ID cannot contain consecutive hyphens")]
    ConsecutiveHyphens,

    #[error("Invalid IP allow-list entry: '{0}'")]
    InvalidIpEntry(String),
}

const MAX_CREDENTIAL_ID_LENGTH: usize = 64;
const MAX_OWNER_ID_LENGTH: usize = 128;

/// Validate a credential ID
///
/// Rules:
/// - Cannot be empty
/// - Maximum 64 characters
/// - Only alphanumeric characters and hyphens
/// - Must start and end with alphanumeric
/// - No consecutive hyphens
pub fn validate_credential_id(id: &str) -> Result<(), CredentialValidationError> {
    if id.is_empty() {
        return Err(CredentialValidationError::EmptyId);
    }

    if id.len() > MAX_CREDENTIAL_ID_LENGTH {
        return Err(CredentialValidationError::TooLong(MAX_CREDENTIAL_ID_LENGTH));
    }

    let first = id.chars().next();
    let last = id.chars().last();

    if !first.is_some_and(|c| c.is_ascii_alphanumeric())
        || !last.is_some_and(|c| c.is_ascii_alphanumeric())
    {
        return Err(CredentialValidationError::InvalidBoundary);
    }

    let mut prev_hyphen = false;

    for c in id.chars() {
        if c == '-' {
            if prev_hyphen {
                return Err(CredentialValidationError::ConsecutiveHyphens);
            }
            prev_hyphen = true;
        } else if c.is_ascii_alphanumeric() {
            prev_hyphen = false;
        } else {
            return Err(CredentialValidationError::InvalidCharacter(c));
        }
    }

    Ok(())
}

/// Validate an owning-user reference
///
/// Owner IDs come from identity providers, so `.`, `_`, `@`, `|` and `:` are
/// accepted on top of alphanumerics and hyphens.
pub fn validate_owner_id(id: &str) -> Result<(), CredentialValidationError> {
    if id.is_empty() {
        return Err(CredentialValidationError::EmptyId);
    }

    if id.len() > MAX_OWNER_ID_LENGTH {
        return Err(CredentialValidationError::TooLong(MAX_OWNER_ID_LENGTH));
    }

    if let Some(c) = id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@' | '|' | ':')))
    {
        return Err(CredentialValidationError::InvalidCharacter(c));
    }

    Ok(())
}

/// Parse an IP allow-list entry: a bare address or a CIDR block
pub fn parse_ip_entry(entry: &str) -> Result<IpNet, CredentialValidationError> {
    let entry = entry.trim();

    entry
        .parse::<IpNet>()
        .map(|net| net.trunc())
        .or_else(|_| entry.parse::<IpAddr>().map(IpNet::from))
        .map_err(|_| CredentialValidationError::InvalidIpEntry(entry.to_string()))
}
