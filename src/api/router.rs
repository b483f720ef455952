use axum::{middleware::from_fn_with_state, routing::get, Router};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use super::admin;
use super::health;
use super::middleware::{gatekeeper_middleware, header_logging_middleware};
use super::state::AppState;
use super::v1;

/// Health endpoints only, without the gate
pub fn create_router() -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/live", get(health::live_check))
        .layer(TraceLayer::new_for_http())
}

/// Full router; every route sits behind the request pipeline
pub fn create_router_with_state(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))
        .route("/live", get(health::live_check))
        .nest("/v1", v1::create_v1_router())
        .nest("/admin", admin::create_admin_router())
        .with_state(state.clone())
        .layer(from_fn_with_state(state.pipeline.clone(), gatekeeper_middleware))
        .layer(from_fn_with_state(state.redactor.clone(), header_logging_middleware))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    use crate::build_app_state;
    use crate::config::AppConfig;
    use crate::domain::auth::{AuthMethod, MockTokenVerifier, TokenClaims, TokenVerifier};
    use crate::domain::credential::{CredentialStore, KeyClass};
    use crate::domain::usage::MonthKey;
    use crate::infrastructure::credential::{InMemoryCredentialStore, IssueCredentialRequest};

    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.security.key_pepper = "router-test-pepper".to_string();
        config
    }

    fn state_with(config: &AppConfig, verifier: Option<MockTokenVerifier>) -> AppState {
        let store: Arc<dyn CredentialStore> = Arc::new(InMemoryCredentialStore::new());
        let verifier = verifier.map(|v| Arc::new(v) as Arc<dyn TokenVerifier>);
        build_app_state(config, store, verifier).unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn admin_secret(state: &AppState) -> String {
        let mut request = IssueCredentialRequest::new("admin-user", "Admin");
        request.class = KeyClass::Admin;
        let issued = state.credentials.issue(request).await.unwrap();
        issued.secret.as_str().to_string()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = create_router();

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_is_excluded_from_auth() {
        let app = create_router_with_state(state_with(&test_config(), None));

        let response = app
            .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_excluded_path_with_both_methods_skips_resolver() {
        let mut config = test_config();
        config.auth.method = AuthMethod::Both;

        let mut verifier = MockTokenVerifier::new();
        verifier.expect_verify().times(0);

        let app = create_router_with_state(state_with(&config, Some(verifier)));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/swagger-ui/index.html")
                    .header("x-api-key", "gk-unknown")
                    .header(header::AUTHORIZATION, "Bearer some.jwt.token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        // Unrouted, but the gate let it through instead of answering 401
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_protected_route_requires_key() {
        let app = create_router_with_state(state_with(&test_config(), None));

        let response = app
            .oneshot(Request::builder().uri("/v1/whoami").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "api_key_missing");
        assert_eq!(body["error"]["message"], "API key not found");
    }

    #[tokio::test]
    async fn test_whoami_with_key() {
        let state = state_with(&test_config(), None);
        let issued = state
            .credentials
            .issue(IssueCredentialRequest::new("user-42", "CLI"))
            .await
            .unwrap();
        let app = create_router_with_state(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/v1/whoami")
                    .header("x-api-key", issued.secret.as_str())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-quota-limit"], "100");
        let body = json_body(response).await;
        assert_eq!(body["user_id"], "user-42");
        assert_eq!(body["tier"], "FREE");
    }

    #[tokio::test]
    async fn test_token_user_reaches_whoami() {
        let mut config = test_config();
        config.auth.method = AuthMethod::Token;

        let mut verifier = MockTokenVerifier::new();
        verifier.expect_verify().returning(|_| {
            Ok(TokenClaims {
                subject: "user-7".to_string(),
                user_id: "user-7".to_string(),
                expires_at: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let app = create_router_with_state(state_with(&config, Some(verifier)));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/v1/whoami")
                    .header(header::AUTHORIZATION, "Bearer header.payload.sig")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["user_id"], "user-7");
        assert_eq!(body["method"], "token");
    }

    #[tokio::test]
    async fn test_admin_routes_require_admin_scope() {
        let state = state_with(&test_config(), None);
        let standard = state
            .credentials
            .issue(IssueCredentialRequest::new("user-1", "Standard"))
            .await
            .unwrap();
        let app = create_router_with_state(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/admin/quota/reset")
                    .header("x-api-key", standard.secret.as_str())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(json_body(response).await["error"]["code"], "insufficient_scope");
    }

    #[tokio::test]
    async fn test_admin_issue_then_use_key() {
        let state = state_with(&test_config(), None);
        let admin = admin_secret(&state).await;
        let app = create_router_with_state(state.clone());

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/admin/keys")
                    .header("x-api-key", &admin)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        r#"{"owner_id":"user-5","name":"Partner","tier":"PRO","allowed_domains":["example.com"]}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = json_body(response).await;
        assert_eq!(body["tier"], "PRO");
        assert!(body.get("secret_hash").is_none());
        let secret = body["secret"].as_str().unwrap().to_string();
        let id = body["id"].as_str().unwrap().to_string();

        // Domain allow-list applies to the new key
        let denied = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/v1/whoami")
                    .header("x-api-key", &secret)
                    .header(header::ORIGIN, "https://evil.org")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(denied.status(), StatusCode::FORBIDDEN);
        assert_eq!(json_body(denied).await["error"]["code"], "domain_not_allowed");

        let allowed = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/v1/whoami")
                    .header("x-api-key", &secret)
                    .header(header::ORIGIN, "https://api.example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(allowed.status(), StatusCode::OK);
        assert_eq!(allowed.headers()["x-quota-limit"], "1000");

        let usage = app
            .oneshot(
                Request::builder()
                    .uri(format!("/admin/keys/{}/usage", id))
                    .header("x-api-key", &admin)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(usage.status(), StatusCode::OK);
        let usage = json_body(usage).await;
        assert_eq!(usage["total_calls"], 1);
        assert_eq!(usage["failed_calls"], 1);
        assert_eq!(usage["month"], MonthKey::of(chrono::Utc::now()).to_string());
    }

    #[tokio::test]
    async fn test_owner_reveals_own_secret_only() {
        let state = state_with(&test_config(), None);
        let mine = state
            .credentials
            .issue(IssueCredentialRequest::new("user-1", "Mine"))
            .await
            .unwrap();
        let theirs = state
            .credentials
            .issue(IssueCredentialRequest::new("user-2", "Theirs"))
            .await
            .unwrap();
        let app = create_router_with_state(state);

        let own = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/v1/keys/{}/secret", mine.credential.id()))
                    .header("x-api-key", mine.secret.as_str())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(own.status(), StatusCode::OK);
        assert_eq!(json_body(own).await["secret"], mine.secret.as_str());

        let other = app
            .oneshot(
                Request::builder()
                    .uri(format!("/v1/keys/{}/secret", theirs.credential.id()))
                    .header("x-api-key", mine.secret.as_str())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(other.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_rotated_key_replaces_old_secret() {
        let state = state_with(&test_config(), None);
        let admin = admin_secret(&state).await;
        let issued = state
            .credentials
            .issue(IssueCredentialRequest::new("user-1", "Rotating"))
            .await
            .unwrap();
        let app = create_router_with_state(state);

        let rotated = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/admin/keys/{}/rotate", issued.credential.id()))
                    .header("x-api-key", &admin)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(rotated.status(), StatusCode::OK);
        let new_secret = json_body(rotated).await["secret"].as_str().unwrap().to_string();

        let old = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/v1/whoami")
                    .header("x-api-key", issued.secret.as_str())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(old.status(), StatusCode::UNAUTHORIZED);

        let new = app
            .oneshot(
                Request::builder()
                    .uri("/v1/whoami")
                    .header("x-api-key", &new_secret)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(new.status(), StatusCode::OK);
    }
}
