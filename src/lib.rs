//! Gatekeeper
//!
//! Authentication and admission gateway for HTTP APIs:
//! - API key and bearer token authentication with configurable fallback
//! - Per-credential IP and domain allow-lists
//! - Monthly usage quotas by tier, with scheduled window resets
//! - Owner-scoped encrypted key storage

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};

use api::middleware::{HeaderRedactor, RequestPipeline};
use api::state::AppState;
use domain::auth::{Credentials, TokenVerifier};
use domain::credential::{CredentialStore, KeyClass};
use infrastructure::admission::AdmissionGuard;
use infrastructure::auth::{AuthResolver, JwtConfig, JwtTokenVerifier};
use infrastructure::credential::{CredentialService, InMemoryCredentialStore, IssueCredentialRequest};
use infrastructure::crypto::KeyCodec;
use infrastructure::quota::QuotaResetScheduler;
use infrastructure::request_log::TracingRequestLogger;

/// Operator-supplied admin key registered at startup
pub const ADMIN_API_KEY_ENV: &str = "ADMIN_API_KEY";

/// Create the application state for a loaded configuration
pub async fn create_app_state_with_config(config: &AppConfig) -> anyhow::Result<AppState> {
    let store: Arc<dyn CredentialStore> = Arc::new(InMemoryCredentialStore::new());
    info!("Using in-memory credential store");

    let verifier = create_token_verifier(config)?;
    let state = build_app_state(config, store, verifier)?;

    if let Ok(admin_key) = std::env::var(ADMIN_API_KEY_ENV) {
        create_admin_api_key(&state.credentials, &admin_key).await?;
    }

    Ok(state)
}

/// Wire services around an existing store and optional token verifier
pub fn build_app_state(
    config: &AppConfig,
    store: Arc<dyn CredentialStore>,
    verifier: Option<Arc<dyn TokenVerifier>>,
) -> anyhow::Result<AppState> {
    let auth = Arc::new(config.auth.clone());

    let mut resolver = AuthResolver::new(auth.clone(), store.clone());
    if let Some(verifier) = verifier {
        resolver = resolver.with_token_verifier(verifier);
    }

    let guard = AdmissionGuard::new(
        store.clone(),
        Arc::new(config.rate_limit.clone()),
        config.security.environment,
    );

    let pipeline = RequestPipeline::new(
        auth,
        resolver,
        guard,
        store.clone(),
        Arc::new(TracingRequestLogger::new()),
    )
    .context("Failed to build request pipeline")?
    .with_trusted_forwarding(config.security.trust_forwarded_headers);

    let credentials = CredentialService::new(
        store.clone(),
        KeyCodec::new(config.security.key_pepper.as_bytes()),
    );

    let scheduler = QuotaResetScheduler::new(
        store,
        Duration::from_secs(config.scheduler.interval_secs),
    );

    Ok(AppState::new(
        credentials,
        scheduler,
        pipeline,
        HeaderRedactor::new(&config.auth),
    ))
}

/// JWT verifier when the configured method accepts tokens
pub fn create_token_verifier(config: &AppConfig) -> anyhow::Result<Option<Arc<dyn TokenVerifier>>> {
    if !config.auth.method.accepts(Credentials::Token) {
        return Ok(None);
    }

    Ok(Some(Arc::new(create_jwt_verifier(config)?)))
}

pub fn create_jwt_verifier(config: &AppConfig) -> anyhow::Result<JwtTokenVerifier> {
    let mut jwt = JwtConfig::new(config.token.secret.clone(), config.token.expiration_hours)
        .with_leeway(config.token.leeway_secs);
    if let Some(issuer) = &config.token.issuer {
        jwt = jwt.with_issuer(issuer.clone());
    }

    JwtTokenVerifier::new(jwt).context("Invalid token configuration")
}

/// Register the operator's admin key so the admin API is reachable
async fn create_admin_api_key(service: &CredentialService, secret: &str) -> anyhow::Result<()> {
    if secret.trim().is_empty() {
        warn!("{} is set but empty, skipping admin key bootstrap", ADMIN_API_KEY_ENV);
        return Ok(());
    }

    let request = IssueCredentialRequest {
        class: KeyClass::Admin,
        ..IssueCredentialRequest::new("admin", "Bootstrap admin key")
    };

    let issued = service
        .issue_with_secret(request, secret)
        .await
        .context("Failed to register bootstrap admin key")?;

    info!(
        credential_id = %issued.credential.id(),
        key_prefix = %issued.credential.key_prefix(),
        "Admin API key created"
    );
    Ok(())
}
