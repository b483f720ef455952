//! Debug-level request header logging with credential redaction

use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use tracing::{debug, enabled, Level};

use crate::config::AuthConfig;

const REDACTED: &str = "[REDACTED]";

const ALWAYS_SENSITIVE: &[&str] = &[
    "authorization",
    "proxy-authorization",
    "x-api-key",
    "cookie",
    "set-cookie",
    "x-auth-token",
    "x-csrf-token",
];

const LOGGED: &[&str] = &[
    "content-type",
    "content-length",
    "accept",
    "user-agent",
    "origin",
    "referer",
    "x-request-id",
    "x-forwarded-for",
    "x-real-ip",
];

/// Knows which headers carry credentials for the running configuration
#[derive(Debug, Clone)]
pub struct HeaderRedactor {
    sensitive: HashSet<String>,
}

impl HeaderRedactor {
    pub fn new(auth: &AuthConfig) -> Self {
        let mut sensitive: HashSet<String> =
            ALWAYS_SENSITIVE.iter().map(|h| h.to_string()).collect();
        sensitive.insert(auth.api_key_header.to_ascii_lowercase());
        sensitive.insert(auth.token_header.to_ascii_lowercase());
        Self { sensitive }
    }

    pub fn is_sensitive(&self, name: &str) -> bool {
        self.sensitive.contains(&name.to_ascii_lowercase())
    }

    fn should_log(&self, name: &str) -> bool {
        LOGGED.contains(&name) || self.sensitive.contains(name)
    }

    /// `name=value` pairs for loggable headers, credentials replaced
    pub fn render(&self, headers: &HeaderMap) -> String {
        headers
            .iter()
            .filter(|(name, _)| self.should_log(name.as_str()))
            .map(|(name, value)| {
                let value = if self.is_sensitive(name.as_str()) {
                    REDACTED
                } else {
                    value.to_str().unwrap_or("[invalid]")
                };
                format!("{}={}", name.as_str(), value)
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Note: no span is created here; `TraceLayer` already owns the request span.
pub async fn header_logging_middleware(
    State(redactor): State<Arc<HeaderRedactor>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if enabled!(Level::DEBUG) {
        debug!(
            method = %request.method(),
            path = %request.uri().path(),
            headers = %redactor.render(request.headers()),
            "Incoming request"
        );
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn redactor() -> HeaderRedactor {
        HeaderRedactor::new(&AuthConfig {
            api_key_header: "X-Gateway-Key".to_string(),
            ..AuthConfig::default()
        })
    }

    #[test]
    fn test_configured_header_is_sensitive() {
        let redactor = redactor();
        assert!(redactor.is_sensitive("x-gateway-key"));
        assert!(redactor.is_sensitive("Authorization"));
        assert!(redactor.is_sensitive("cookie"));
        assert!(!redactor.is_sensitive("content-type"));
    }

    #[test]
    fn test_render_redacts_credentials() {
        let mut headers = HeaderMap::new();
        headers.insert("x-gateway-key", HeaderValue::from_static("gk-supersecret"));
        headers.insert("authorization", HeaderValue::from_static("Bearer abc.def.ghi"));
        headers.insert("user-agent", HeaderValue::from_static("curl/8.5"));
        headers.insert("etag", HeaderValue::from_static("\"xyz\""));

        let rendered = redactor().render(&headers);

        assert!(!rendered.contains("supersecret"));
        assert!(!rendered.contains("abc.def.ghi"));
        assert!(rendered.contains("x-gateway-key=[REDACTED]"));
        assert!(rendered.contains("user-agent=curl/8.5"));
        assert!(!rendered.contains("etag"));
    }
}
