//! Authentication method selection

use serde::{Deserialize, Serialize};

/// Configured authentication strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    #[default]
    ApiKey,
    Token,
    /// API key first, bearer token as fallback
    Both,
    /// Bearer token first, API key as fallback
    TokenFirst,
}

impl AuthMethod {
    /// Methods to attempt, in order. The second entry is only used when
    /// fallback is enabled.
    pub fn attempt_order(&self) -> (Credentials, Option<Credentials>) {
        match self {
            Self::ApiKey => (Credentials::ApiKey, None),
            Self::Token => (Credentials::Token, None),
            Self::Both => (Credentials::ApiKey, Some(Credentials::Token)),
            Self::TokenFirst => (Credentials::Token, Some(Credentials::ApiKey)),
        }
    }

    pub fn accepts(&self, kind: Credentials) -> bool {
        let (primary, secondary) = self.attempt_order();
        primary == kind || secondary == Some(kind)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApiKey => "api_key",
            Self::Token => "token",
            Self::Both => "both",
            Self::TokenFirst => "token_first",
        }
    }
}

impl std::fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AuthMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "api_key" => Ok(Self::ApiKey),
            "token" => Ok(Self::Token),
            "both" => Ok(Self::Both),
            "token_first" => Ok(Self::TokenFirst),
            other => Err(format!("unknown authentication method: {}", other)),
        }
    }
}

/// A single kind of presented credential
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Credentials {
    ApiKey,
    Token,
}

impl Credentials {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApiKey => "api_key",
            Self::Token => "token",
        }
    }
}

impl std::fmt::Display for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
