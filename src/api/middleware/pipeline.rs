//! Per-request authentication, admission and usage accounting

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde_json::json;
use tokio::time::timeout;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::api::types::ApiError;
use crate::config::AuthConfig;
use crate::domain::auth::{Credentials, FailureReason};
use crate::domain::credential::{CredentialId, CredentialStore};
use crate::domain::request_log::{Disposition, RequestLogEntry, RequestLogger};
use crate::domain::usage::{QuotaStatus, UsageOutcome};
use crate::domain::DomainError;
use crate::infrastructure::admission::{
    AdmissionCheck, AdmissionDecision, AdmissionGuard, ClientInfo, QuotaSnapshot,
};
use crate::infrastructure::auth::AuthResolver;
use crate::infrastructure::observability::{record_admission_denial, record_auth_failure};

use super::client::client_info;
use super::exclusion::ExclusionRules;
use super::principal::Principal;

pub const X_REQUEST_ID: &str = "x-request-id";
pub const X_QUOTA_LIMIT: &str = "x-quota-limit";
pub const X_QUOTA_REMAINING: &str = "x-quota-remaining";
pub const X_QUOTA_STATUS: &str = "x-quota-status";
pub const X_QUOTA_RESET: &str = "x-quota-reset";

/// Usage outcome settled after the deadline scope
enum OwedUsage {
    Denied(UsageOutcome),
    /// Success depends on the final response status
    Admitted { grace: bool },
}

/// Log entry under construction plus usage still owed to the store
struct Trace {
    entry: RequestLogEntry,
    owed_usage: Option<(CredentialId, OwedUsage)>,
}

impl Trace {
    fn new(request: &Request, client: &ClientInfo) -> Self {
        let request_id = request
            .headers()
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        Self {
            entry: RequestLogEntry {
                request_id,
                method: request.method().to_string(),
                path: request.uri().path().to_string(),
                client_ip: client.ip,
                origin: client.origin.clone(),
                credential_id: None,
                user_id: None,
                auth_method: None,
                disposition: Disposition::Error,
                status: 0,
                latency: Duration::ZERO,
                error_reason: None,
            },
            owed_usage: None,
        }
    }
}

/// Gate in front of every protected handler
pub struct RequestPipeline {
    config: Arc<AuthConfig>,
    exclusions: ExclusionRules,
    resolver: AuthResolver,
    guard: AdmissionGuard,
    store: Arc<dyn CredentialStore>,
    logger: Arc<dyn RequestLogger>,
    trust_forwarded: bool,
    deadline: Duration,
}

impl std::fmt::Debug for RequestPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestPipeline")
            .field("resolver", &self.resolver)
            .field("exclusions", &self.exclusions)
            .field("trust_forwarded", &self.trust_forwarded)
            .field("deadline", &self.deadline)
            .finish()
    }
}

impl RequestPipeline {
    pub fn new(
        config: Arc<AuthConfig>,
        resolver: AuthResolver,
        guard: AdmissionGuard,
        store: Arc<dyn CredentialStore>,
        logger: Arc<dyn RequestLogger>,
    ) -> Result<Self, DomainError> {
        let exclusions = ExclusionRules::new(&config.excluded_paths, &config.probe_user_agents)
            .map_err(DomainError::configuration)?;

        Ok(Self {
            deadline: Duration::from_millis(config.deadline_ms),
            config,
            exclusions,
            resolver,
            guard,
            store,
            logger,
            trust_forwarded: false,
        })
    }

    pub fn with_trusted_forwarding(mut self, trusted: bool) -> Self {
        self.trust_forwarded = trusted;
        self
    }

    /// Process one request, calling `downstream` at most once.
    ///
    /// Exactly one log entry is emitted, including when the deadline fires.
    /// Usage is written after the deadline scope, so a late deadline never
    /// drops an increment.
    pub async fn run<F, Fut>(&self, request: Request, downstream: F) -> Response
    where
        F: FnOnce(Request) -> Fut,
        Fut: Future<Output = Response>,
    {
        let started = Instant::now();
        let client = client_info(&request, self.trust_forwarded);
        let mut trace = Trace::new(&request, &client);

        let result = timeout(
            self.deadline,
            self.handle(request, client, downstream, &mut trace),
        )
        .await;

        let response = match result {
            Ok(response) => response,
            Err(_) => {
                warn!(
                    request_id = %trace.entry.request_id,
                    path = %trace.entry.path,
                    deadline_ms = self.deadline.as_millis() as u64,
                    "Request deadline exceeded"
                );

                trace.entry.disposition = Disposition::TimedOut;
                trace.entry.error_reason = Some(format!(
                    "Deadline of {}ms exceeded",
                    self.deadline.as_millis()
                ));
                ApiError::gateway_timeout("Request deadline exceeded").into_response()
            }
        };

        if let Some((id, owed)) = trace.owed_usage.take() {
            let outcome = match owed {
                OwedUsage::Denied(outcome) => outcome,
                OwedUsage::Admitted { grace } => UsageOutcome::Admitted {
                    succeeded: response.status().as_u16() < 400,
                    grace,
                },
            };
            self.record_usage(&id, outcome).await;
        }

        trace.entry.status = response.status().as_u16();
        trace.entry.latency = started.elapsed();
        self.logger.log_outcome(trace.entry);

        response
    }

    async fn handle<F, Fut>(
        &self,
        mut request: Request,
        client: ClientInfo,
        downstream: F,
        trace: &mut Trace,
    ) -> Response
    where
        F: FnOnce(Request) -> Fut,
        Fut: Future<Output = Response>,
    {
        if let Some(reason) =
            self.exclusions
                .bypass(request.method(), request.uri().path(), request.headers())
        {
            debug!(reason = reason.as_str(), path = %trace.entry.path, "Authentication bypassed");
            trace.entry.disposition = Disposition::Bypassed;
            return downstream(request).await;
        }

        if let Some(principal) = request.extensions().get::<Principal>() {
            trace.entry.user_id = principal.user_id.clone();
            trace.entry.credential_id = principal.credential_id.clone();
            trace.entry.auth_method = principal.method;
            trace.entry.disposition = Disposition::PreAuthenticated;
            return downstream(request).await;
        }

        if !self.config.require_auth && !self.resolver.presents_credentials(request.headers()) {
            trace.entry.disposition = Disposition::Anonymous;
            request.extensions_mut().insert(Principal::anonymous());
            return downstream(request).await;
        }

        let outcome = match self.resolver.resolve(request.headers()).await {
            Ok(outcome) => outcome,
            Err(e) => return self.infrastructure_error(trace, e),
        };

        trace.entry.auth_method = Some(outcome.method());
        trace.entry.user_id = outcome.user_id().map(str::to_string);
        trace.entry.credential_id = outcome.credential().map(|c| c.id().to_string());

        if let Some(reason) = outcome.reason() {
            trace.entry.disposition = Disposition::AuthenticationFailed;
            trace.entry.error_reason = Some(reason.to_string());
            record_auth_failure(outcome.method().as_str(), reason.code());
            return self.authentication_error(reason).into_response();
        }

        let decision = match self.guard.check(&outcome, &client, Utc::now()).await {
            Ok(decision) => decision,
            Err(e) => return self.infrastructure_error(trace, e),
        };

        if !decision.is_admitted() {
            trace.entry.disposition = Disposition::Denied;
            trace.entry.error_reason = Some(
                decision
                    .failures()
                    .iter()
                    .map(|f| f.message.as_str())
                    .collect::<Vec<_>>()
                    .join("; "),
            );

            for failure in decision.failures() {
                record_admission_denial(failure.check.as_str());
            }

            if let (Some(credential), Some(usage)) = (outcome.credential(), decision.denial_usage()) {
                trace.owed_usage = Some((credential.id().clone(), OwedUsage::Denied(usage)));
            }

            let mut response = self.admission_error(&decision).into_response();
            if let Some(quota) = decision.quota() {
                apply_quota_headers(response.headers_mut(), quota);
            }
            return response;
        }

        trace.entry.disposition = Disposition::Admitted;
        let grace = decision
            .quota()
            .is_some_and(|q| q.status == QuotaStatus::Grace);
        if let Some(credential) = outcome.credential() {
            trace.owed_usage = Some((credential.id().clone(), OwedUsage::Admitted { grace }));
        }

        request
            .extensions_mut()
            .insert(Principal::from_outcome(&outcome));

        let mut response = downstream(request).await;

        if let Some(quota) = decision.quota() {
            apply_quota_headers(response.headers_mut(), quota);
        }

        response
    }

    async fn record_usage(&self, id: &CredentialId, outcome: UsageOutcome) {
        if let Err(e) = self.store.increment_usage(id, outcome).await {
            warn!(credential_id = %id, error = %e, "Failed to record usage");
        }
    }

    fn infrastructure_error(&self, trace: &mut Trace, err: DomainError) -> Response {
        trace.entry.disposition = Disposition::Error;
        trace.entry.error_reason = Some(err.to_string());
        ApiError::from_domain(err, self.config.detailed_errors).into_response()
    }

    fn authentication_error(&self, reason: FailureReason) -> ApiError {
        let err = ApiError::unauthorized(reason.code(), reason.to_string());

        if !self.config.detailed_errors {
            return err;
        }

        let (primary, secondary) = self.config.method.attempt_order();
        let mut accepted = vec![self.expected_credentials(primary)];
        if let Some(secondary) = secondary.filter(|_| self.config.fallback) {
            accepted.push(self.expected_credentials(secondary));
        }

        err.with_details(json!({
            "auth_method": self.config.method.as_str(),
            "accepted": accepted,
        }))
    }

    fn expected_credentials(&self, kind: Credentials) -> serde_json::Value {
        match kind {
            Credentials::ApiKey => json!({
                "type": kind.as_str(),
                "header": self.config.api_key_header,
                "format": format!("{}<api-key>", self.config.api_key_prefix),
            }),
            Credentials::Token => json!({
                "type": kind.as_str(),
                "header": self.config.token_header,
                "format": format!("{}<token>", self.config.token_prefix),
            }),
        }
    }

    fn admission_error(&self, decision: &AdmissionDecision) -> ApiError {
        let failures = decision.failures();
        let status = decision.status_code();

        let code = failures
            .iter()
            .find(|f| status == 429 || f.check != AdmissionCheck::Quota)
            .map(|f| denial_code(f.check))
            .unwrap_or("forbidden");

        let message = if self.config.detailed_errors {
            failures
                .first()
                .map(|f| f.message.clone())
                .unwrap_or_else(|| "Access denied".to_string())
        } else if status == 429 {
            "Monthly request quota exceeded".to_string()
        } else {
            "Access denied for this API key".to_string()
        };

        let err = if status == 429 {
            ApiError::rate_limited(message)
        } else {
            ApiError::forbidden(code, message)
        };

        if !self.config.detailed_errors {
            return err;
        }

        let mut details = json!({ "failed_checks": failures });
        if let Some(quota) = decision.quota() {
            details["quota"] = json!({
                "limit": quota.limit.value(),
                "used": quota.used,
                "status": quota.status.as_str(),
            });
        }
        err.with_details(details)
    }
}

fn denial_code(check: AdmissionCheck) -> &'static str {
    match check {
        AdmissionCheck::Ip => "ip_not_allowed",
        AdmissionCheck::Domain => "domain_not_allowed",
        AdmissionCheck::Quota => "quota_exceeded",
    }
}

fn apply_quota_headers(headers: &mut HeaderMap, quota: &QuotaSnapshot) {
    match quota.limit.value() {
        Some(limit) => {
            headers.insert(X_QUOTA_LIMIT, HeaderValue::from(limit));
        }
        None => {
            headers.insert(X_QUOTA_LIMIT, HeaderValue::from_static("unlimited"));
        }
    }
    if let Some(remaining) = quota.remaining() {
        headers.insert(X_QUOTA_REMAINING, HeaderValue::from(remaining));
    }
    headers.insert(X_QUOTA_STATUS, HeaderValue::from_static(quota.status.as_str()));
    if let Ok(value) = HeaderValue::from_str(&quota.resets_at.to_rfc3339()) {
        headers.insert(X_QUOTA_RESET, value);
    }
}

/// Axum adapter for [`RequestPipeline::run`]
pub async fn gatekeeper_middleware(
    State(pipeline): State<Arc<RequestPipeline>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    pipeline.run(request, |request| next.run(request)).await
}
