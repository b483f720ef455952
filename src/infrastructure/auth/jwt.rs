//! HS256 bearer token issuance and verification

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::domain::auth::{TokenClaims, TokenError, TokenVerifier};
use crate::domain::DomainError;

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject
    pub sub: String,
    /// Acting user, defaults to the subject
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    /// Issued at timestamp (Unix epoch)
    pub iat: i64,
    /// Expiration timestamp (Unix epoch)
    pub exp: i64,
}

impl JwtClaims {
    /// Create new claims for a user
    pub fn new(user_id: impl Into<String>, expiration_hours: u64) -> Self {
        let now = Utc::now();
        let exp = now + Duration::hours(expiration_hours as i64);

        Self {
            sub: user_id.into(),
            user_id: None,
            iss: None,
            iat: now.timestamp(),
            exp: exp.timestamp(),
        }
    }

    fn into_token_claims(self) -> Result<TokenClaims, TokenError> {
        let expires_at = DateTime::<Utc>::from_timestamp(self.exp, 0)
            .ok_or_else(|| TokenError::Malformed("exp out of range".to_string()))?;

        Ok(TokenClaims {
            user_id: self.user_id.unwrap_or_else(|| self.sub.clone()),
            subject: self.sub,
            expires_at,
        })
    }
}

/// Configuration for the JWT verifier
#[derive(Clone)]
pub struct JwtConfig {
    /// Shared HS256 secret
    pub secret: String,
    /// Lifetime of issued tokens
    pub expiration_hours: u64,
    /// Expected `iss` claim, if any
    pub issuer: Option<String>,
    /// Allowed clock skew
    pub leeway_secs: u64,
}

impl Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"[hidden]")
            .field("expiration_hours", &self.expiration_hours)
            .field("issuer", &self.issuer)
            .field("leeway_secs", &self.leeway_secs)
            .finish()
    }
}

impl JwtConfig {
    pub fn new(secret: impl Into<String>, expiration_hours: u64) -> Self {
        Self {
            secret: secret.into(),
            expiration_hours,
            issuer: None,
            leeway_secs: 30,
        }
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    pub fn with_leeway(mut self, leeway_secs: u64) -> Self {
        self.leeway_secs = leeway_secs;
        self
    }
}

/// Verifies HS256 bearer tokens
#[derive(Clone)]
pub struct JwtTokenVerifier {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl Debug for JwtTokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtTokenVerifier")
            .field("config", &self.config)
            .field("encoding_key", &"[hidden]")
            .field("decoding_key", &"[hidden]")
            .finish()
    }
}

impl JwtTokenVerifier {
    pub fn new(config: JwtConfig) -> Result<Self, DomainError> {
        if config.secret.is_empty() {
            return Err(DomainError::configuration("Token secret must not be empty"));
        }

        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = config.leeway_secs;
        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer.as_str()]);
            validation.set_required_spec_claims(&["exp", "iss"]);
        }

        Ok(Self {
            config,
            encoding_key,
            decoding_key,
            validation,
        })
    }

    /// Sign a token for `user_id` with the configured lifetime
    pub fn issue(&self, user_id: &str) -> Result<String, DomainError> {
        let mut claims = JwtClaims::new(user_id, self.config.expiration_hours);
        claims.iss = self.config.issuer.clone();
        self.sign(&claims)
    }

    /// Sign arbitrary claims
    pub fn sign(&self, claims: &JwtClaims) -> Result<String, DomainError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| DomainError::internal(format!("Failed to sign token: {}", e)))
    }
}

impl TokenVerifier for JwtTokenVerifier {
    fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let data = decode::<JwtClaims>(token, &self.decoding_key, &self.validation).map_err(
            |e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature => TokenError::BadSignature,
                other => TokenError::Malformed(format!("{:?}", other)),
            },
        )?;

        data.claims.into_token_claims()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier() -> JwtTokenVerifier {
        JwtTokenVerifier::new(JwtConfig::new("test-secret", 1).with_leeway(0)).unwrap()
    }

    #[test]
    fn test_issue_and_verify() {
        let verifier = verifier();
        let token = verifier.issue("user-1").unwrap();

        let claims = verifier.verify(&token).unwrap();
        assert_eq!(claims.subject, "user-1");
        assert_eq!(claims.user_id, "user-1");
        assert!(claims.expires_at > Utc::now());
    }

    #[test]
    fn test_explicit_user_id_claim() {
        let verifier = verifier();
        let mut claims = JwtClaims::new("service-account", 1);
        claims.user_id = Some("user-9".to_string());
        let token = verifier.sign(&claims).unwrap();

        let verified = verifier.verify(&token).unwrap();
        assert_eq!(verified.subject, "service-account");
        assert_eq!(verified.user_id, "user-9");
    }

    #[test]
    fn test_expired_token() {
        let verifier = verifier();
        let mut claims = JwtClaims::new("user-1", 1);
        claims.iat -= 7200;
        claims.exp = Utc::now().timestamp() - 3600;
        let token = verifier.sign(&claims).unwrap();

        assert_eq!(verifier.verify(&token).unwrap_err(), TokenError::Expired);
    }

    #[test]
    fn test_bad_signature() {
        let other = JwtTokenVerifier::new(JwtConfig::new("other-secret", 1)).unwrap();
        let token = other.issue("user-1").unwrap();

        assert_eq!(verifier().verify(&token).unwrap_err(), TokenError::BadSignature);
    }

    #[test]
    fn test_malformed_token() {
        assert!(matches!(
            verifier().verify("not-a-jwt"),
            Err(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn test_issuer_enforced() {
        let strict = JwtTokenVerifier::new(
            JwtConfig::new("test-secret", 1).with_issuer("gatekeeper"),
        )
        .unwrap();

        let foreign = verifier().issue("user-1").unwrap();
        assert!(matches!(strict.verify(&foreign), Err(TokenError::Malformed(_))));

        let own = strict.issue("user-1").unwrap();
        assert!(strict.verify(&own).is_ok());
    }

    #[test]
    fn test_issuer_required_when_configured() {
        let strict = JwtTokenVerifier::new(
            JwtConfig::new("test-secret", 1).with_issuer("gatekeeper"),
        )
        .unwrap();

        // Same secret, no iss claim at all
        let token = strict.sign(&JwtClaims::new("user-1", 1)).unwrap();
        assert_eq!(
            strict.verify(&token).unwrap_err(),
            TokenError::Malformed("MissingRequiredClaim(\"iss\")".to_string())
        );

        let mut claims = JwtClaims::new("user-1", 1);
        claims.iss = Some("someone-else".to_string());
        let token = strict.sign(&claims).unwrap();
        assert_eq!(
            strict.verify(&token).unwrap_err(),
            TokenError::Malformed("InvalidIssuer".to_string())
        );
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(JwtTokenVerifier::new(JwtConfig::new("", 1)).is_err());
    }

    #[test]
    fn test_debug_hides_secret() {
        let debug = format!("{:?}", verifier());
        assert!(!debug.contains("test-secret"));
    }
}
