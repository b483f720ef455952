use serde::Deserialize;

use crate::api::middleware::PathPattern;
use crate::domain::auth::{AuthMethod, Credentials};
use crate::domain::hostname::Environment;
use crate::domain::usage::EnforcementMode;

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
    pub security: SecurityConfig,
    pub scheduler: SchedulerConfig,
    pub token: TokenConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Authentication strategy and pipeline behaviour
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub method: AuthMethod,
    pub api_key_header: String,
    /// Stripped from the API key header value when present
    pub api_key_prefix: String,
    pub token_header: String,
    pub token_prefix: String,
    /// Try the secondary method of `both`/`token_first` when the first fails
    pub fallback: bool,
    pub require_auth: bool,
    pub detailed_errors: bool,
    /// Exact, `/x/*` or `/x/**`
    pub excluded_paths: Vec<String>,
    /// User agent prefixes treated as health probes
    pub probe_user_agents: Vec<String>,
    pub deadline_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Authentication methods whose requests are counted against quotas
    pub apply_to: Vec<Credentials>,
    pub mode: EnforcementMode,
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Application-wide pepper for secret encryption
    pub key_pepper: String,
    pub environment: Environment,
    /// Read the client address from `X-Forwarded-For`
    pub trust_forwarded_headers: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub interval_secs: u64,
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    pub secret: String,
    pub issuer: Option<String>,
    pub expiration_hours: u64,
    pub leeway_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            method: AuthMethod::default(),
            api_key_header: "x-api-key".to_string(),
            api_key_prefix: String::new(),
            token_header: "authorization".to_string(),
            token_prefix: "Bearer ".to_string(),
            fallback: true,
            require_auth: true,
            detailed_errors: false,
            excluded_paths: vec![
                "/health".to_string(),
                "/live".to_string(),
                "/ready".to_string(),
                "/metrics".to_string(),
                "/swagger-ui/**".to_string(),
                "/api-docs/**".to_string(),
            ],
            probe_user_agents: vec![
                "kube-probe".to_string(),
                "ELB-HealthChecker".to_string(),
                "GoogleHC".to_string(),
            ],
            deadline_ms: 30_000,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            apply_to: vec![Credentials::ApiKey],
            mode: EnforcementMode::default(),
        }
    }
}

impl RateLimitConfig {
    /// Whether quotas are enforced for requests authenticated with `method`
    pub fn applies_to(&self, method: Credentials) -> bool {
        self.enabled && self.apply_to.contains(&method)
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            key_pepper: String::new(),
            environment: Environment::default(),
            trust_forwarded_headers: false,
        }
    }
}

impl std::fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("key_pepper", &"[hidden]")
            .field("environment", &self.environment)
            .field("trust_forwarded_headers", &self.trust_forwarded_headers)
            .finish()
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 3600,
        }
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            issuer: None,
            expiration_hours: 24,
            leeway_secs: 30,
        }
    }
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"[hidden]")
            .field("issuer", &self.issuer)
            .field("expiration_hours", &self.expiration_hours)
            .field("leeway_secs", &self.leeway_secs)
            .finish()
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("auth.excluded_paths")
                    .with_list_parse_key("auth.probe_user_agents")
                    .with_list_parse_key("rate_limit.apply_to")
                    .try_parsing(true),
            )
            .build()?;

        let app_config: Self = config.try_deserialize()?;
        app_config.validate()?;

        Ok(app_config)
    }

    /// Startup checks; any error halts boot
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.security.key_pepper.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "security.key_pepper must be set".to_string(),
            ));
        }

        if self.auth.method.accepts(Credentials::Token) && self.token.secret.is_empty() {
            return Err(config::ConfigError::Message(format!(
                "token.secret must be set when auth.method is '{}'",
                self.auth.method
            )));
        }

        if self.auth.api_key_header.trim().is_empty() || self.auth.token_header.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "auth header names must not be empty".to_string(),
            ));
        }

        for pattern in &self.auth.excluded_paths {
            PathPattern::parse(pattern).map_err(|e| {
                config::ConfigError::Message(format!("auth.excluded_paths: {}", e))
            })?;
        }

        if self.scheduler.interval_secs == 0 {
            return Err(config::ConfigError::Message(
                "scheduler.interval_secs must be greater than zero".to_string(),
            ));
        }

        if self.auth.deadline_ms == 0 {
            return Err(config::ConfigError::Message(
                "auth.deadline_ms must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> AppConfig {
        let mut config = AppConfig::default();
        config.security.key_pepper = "test-pepper-value".to_string();
        config
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.auth.method, AuthMethod::ApiKey);
        assert_eq!(config.auth.api_key_header, "x-api-key");
        assert!(config.auth.fallback);
        assert!(config.auth.require_auth);
        assert!(!config.auth.detailed_errors);
        assert_eq!(config.scheduler.interval_secs, 3600);
        assert!(config.rate_limit.applies_to(Credentials::ApiKey));
        assert!(!config.rate_limit.applies_to(Credentials::Token));
    }

    #[test]
    fn test_valid_config() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_missing_pepper() {
        assert!(AppConfig::default().validate().is_err());
    }

    #[test]
    fn test_token_secret_required_for_token_methods() {
        let mut config = valid();
        config.auth.method = AuthMethod::Both;
        assert!(config.validate().is_err());

        config.token.secret = "secret".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_exclusion_pattern() {
        let mut config = valid();
        config.auth.excluded_paths.push("/docs/*/x".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_interval() {
        let mut config = valid();
        config.scheduler.interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_disabled_rate_limit_applies_to_nothing() {
        let mut config = valid();
        config.rate_limit.enabled = false;
        assert!(!config.rate_limit.applies_to(Credentials::ApiKey));
    }

    #[test]
    fn test_secrets_hidden_in_debug() {
        let mut config = valid();
        config.token.secret = "super-secret".to_string();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("super-secret"));
        assert!(!debug.contains("test-pepper-value"));
    }

    #[test]
    fn test_deserialize_partial() {
        let config: AppConfig = serde_json::from_value(serde_json::json!({
            "auth": { "method": "token_first", "fallback": false },
            "rate_limit": { "mode": "strict" },
            "security": { "key_pepper": "p", "environment": "testing" },
            "token": { "secret": "s" }
        }))
        .unwrap();

        assert_eq!(config.auth.method, AuthMethod::TokenFirst);
        assert!(!config.auth.fallback);
        assert_eq!(config.auth.token_prefix, "Bearer ");
        assert_eq!(config.rate_limit.mode, EnforcementMode::Strict);
        assert_eq!(config.security.environment, Environment::Testing);
        assert!(config.validate().is_ok());
    }
}
