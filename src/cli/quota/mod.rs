//! Manual quota reset against a running gateway
//!
//! The credential store lives inside the server process, so the pass is
//! triggered through `POST /admin/quota/reset` with an admin key.

use anyhow::Context;
use clap::Args;
use tracing::info;

use crate::api::types::ApiErrorResponse;
use crate::config::AuthConfig;
use crate::infrastructure::quota::ResetSummary;
use crate::ADMIN_API_KEY_ENV;

const RESET_PATH: &str = "/admin/quota/reset";

#[derive(Args, Debug)]
pub struct ResetQuotasArgs {
    /// Base URL of the running gateway
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    pub url: String,

    /// Admin API key; falls back to the ADMIN_API_KEY environment variable
    #[arg(long)]
    pub api_key: Option<String>,
}

pub async fn run(args: ResetQuotasArgs) -> anyhow::Result<()> {
    let config = super::bootstrap()?;

    let api_key = match args.api_key {
        Some(key) => key,
        None => std::env::var(ADMIN_API_KEY_ENV)
            .with_context(|| format!("--api-key or {} is required", ADMIN_API_KEY_ENV))?,
    };

    let client = AdminClient::new(&args.url, &config.auth, &api_key);

    info!(url = %args.url, "Requesting quota reset");
    let summary = client.reset_quotas().await?;

    println!("{}", serde_json::to_string_pretty(&summary)?);

    if summary.failed > 0 {
        anyhow::bail!("{} window(s) failed to reset", summary.failed);
    }

    Ok(())
}

/// Minimal client for the admin surface
#[derive(Debug, Clone)]
pub struct AdminClient {
    client: reqwest::Client,
    base_url: String,
    key_header: String,
    key_value: String,
}

impl AdminClient {
    pub fn new(base_url: &str, auth: &AuthConfig, api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            key_header: auth.api_key_header.clone(),
            key_value: format!("{}{}", auth.api_key_prefix, api_key.trim()),
        }
    }

    pub async fn reset_quotas(&self) -> anyhow::Result<ResetSummary> {
        let url = format!("{}{}", self.base_url, RESET_PATH);

        let response = self
            .client
            .post(&url)
            .header(self.key_header.as_str(), self.key_value.as_str())
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ApiErrorResponse>(&body)
                .map(|e| format!("{}: {}", e.error.code, e.error.message))
                .unwrap_or(body);
            anyhow::bail!("Quota reset rejected with {}: {}", status, detail);
        }

        response
            .json::<ResetSummary>()
            .await
            .context("Unexpected quota reset response")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::sync::Arc;

    use serde_json::json;
    use tokio::net::TcpListener;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::api::create_router_with_state;
    use crate::config::AppConfig;
    use crate::domain::credential::{CredentialStore, KeyClass};
    use crate::domain::usage::{grace_for, MonthKey, RateTier, UsageOutcome, UsageWindow};
    use crate::infrastructure::credential::{InMemoryCredentialStore, IssueCredentialRequest};

    #[tokio::test]
    async fn test_reset_sends_admin_key_and_parses_summary() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(RESET_PATH))
            .and(header("x-api-key", "gk-admin-secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "processed": 3,
                "succeeded": 2,
                "skipped": 1,
                "failed": 0,
                "failures": []
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = AdminClient::new(
            &format!("{}/", server.uri()),
            &AuthConfig::default(),
            "gk-admin-secret",
        );
        let summary = client.reset_quotas().await.unwrap();

        assert_eq!(summary.processed, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.skipped, 1);
    }

    #[tokio::test]
    async fn test_reset_surfaces_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(RESET_PATH))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": {
                    "code": "insufficient_scope",
                    "message": "Admin scope required",
                    "status": 403,
                    "timestamp": "2024-05-01T00:00:00Z"
                }
            })))
            .mount(&server)
            .await;

        let client = AdminClient::new(&server.uri(), &AuthConfig::default(), "gk-user-key");
        let err = client.reset_quotas().await.unwrap_err().to_string();

        assert!(err.contains("403"));
        assert!(err.contains("insufficient_scope"));
    }

    #[tokio::test]
    async fn test_reset_rolls_stale_windows_on_running_gateway() {
        let mut config = AppConfig::default();
        config.security.key_pepper = "reset-test-pepper".to_string();

        let store: Arc<dyn CredentialStore> = Arc::new(InMemoryCredentialStore::new());
        let state = crate::build_app_state(&config, store.clone(), None).unwrap();

        let mut admin = IssueCredentialRequest::new("ops", "Ops");
        admin.class = KeyClass::Admin;
        let admin = state.credentials.issue(admin).await.unwrap();

        let mut user = IssueCredentialRequest::new("user-1", "Key");
        user.tier = RateTier::Pro;
        let user = state.credentials.issue(user).await.unwrap();

        let quota = RateTier::Pro.quota();
        let mut stale = UsageWindow::new(
            user.credential.id().clone(),
            MonthKey::new(2024, 1).unwrap(),
            quota,
            grace_for(quota),
        );
        for _ in 0..7 {
            stale.record(UsageOutcome::Admitted { succeeded: true, grace: false });
        }
        store.save_window(stale).await.unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = create_router_with_state(state);
        tokio::spawn(async move {
            axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
                .await
                .unwrap();
        });

        let client = AdminClient::new(&format!("http://{}", addr), &config.auth, &admin.secret);
        let summary = client.reset_quotas().await.unwrap();

        assert_eq!(summary.processed, 1);
        assert_eq!(summary.succeeded, 1);

        let window = store
            .load_usage_window(user.credential.id(), MonthKey::of(chrono::Utc::now()))
            .await
            .unwrap();
        assert_eq!(window.total_calls(), 0);
    }
}
