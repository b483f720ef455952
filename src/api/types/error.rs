//! Uniform error responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::domain::DomainError;

/// Error response envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

/// Error detail structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    /// Machine-readable error code
    pub code: String,
    pub message: String,
    pub status: u16,
    pub timestamp: DateTime<Utc>,
    /// Integration hints, only with detailed errors enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// API error with status code
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub response: ApiErrorResponse,
}

impl ApiError {
    /// Create a new API error
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            response: ApiErrorResponse {
                error: ApiErrorDetail {
                    code: code.into(),
                    message: message.into(),
                    status: status.as_u16(),
                    timestamp: Utc::now(),
                    details: None,
                },
            },
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.response.error.details = Some(details);
        self
    }

    pub fn code(&self) -> &str {
        &self.response.error.code
    }

    pub fn message(&self) -> &str {
        &self.response.error.message
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_request", message)
    }

    pub fn unauthorized(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, code, message)
    }

    pub fn forbidden(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, code, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "conflict", message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(StatusCode::TOO_MANY_REQUESTS, "quota_exceeded", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
    }

    pub fn gateway_timeout(message: impl Into<String>) -> Self {
        Self::new(StatusCode::GATEWAY_TIMEOUT, "deadline_exceeded", message)
    }

    /// Map a domain error, hiding infrastructure detail unless `detailed`
    pub fn from_domain(err: DomainError, detailed: bool) -> Self {
        match &err {
            DomainError::NotFound { message } => Self::not_found(message),
            DomainError::Validation { message } => Self::bad_request(message),
            DomainError::Credential { message } => Self::unauthorized("unauthorized", message),
            DomainError::Admission { message } => Self::forbidden("forbidden", message),
            DomainError::Conflict { message } => Self::conflict(message),
            DomainError::Crypto(e) => {
                error!(error = %e, "Crypto failure");
                let api = Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "crypto_error",
                    "Stored secret could not be recovered",
                );
                if detailed {
                    api.with_details(serde_json::json!({ "reason": e.to_string() }))
                } else {
                    api
                }
            }
            DomainError::Configuration { .. }
            | DomainError::Storage { .. }
            | DomainError::Internal { .. } => {
                error!(error = %err, "Infrastructure failure");
                if detailed {
                    Self::internal(err.to_string())
                } else {
                    Self::internal("Internal server error")
                }
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.response)).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self::from_domain(err, false)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {}",
            self.response.error.code, self.response.error.message
        )
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CryptoError;

    #[test]
    fn test_api_error_creation() {
        let err = ApiError::bad_request("Invalid tier");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "invalid_request");
        assert_eq!(err.message(), "Invalid tier");
        assert_eq!(err.response.error.status, 400);
    }

    #[test]
    fn test_domain_error_conversion() {
        let api_err: ApiError = DomainError::not_found("Credential not found").into();
        assert_eq!(api_err.status, StatusCode::NOT_FOUND);

        let api_err: ApiError = DomainError::conflict("exists").into();
        assert_eq!(api_err.status, StatusCode::CONFLICT);
    }

    #[test]
    fn test_storage_error_hidden_unless_detailed() {
        let hidden = ApiError::from_domain(DomainError::storage("connection refused on 10.0.0.5"), false);
        assert_eq!(hidden.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!hidden.message().contains("10.0.0.5"));

        let shown = ApiError::from_domain(DomainError::storage("connection refused on 10.0.0.5"), true);
        assert!(shown.message().contains("10.0.0.5"));
    }

    #[test]
    fn test_crypto_error_is_not_not_found() {
        let api_err: ApiError = DomainError::Crypto(CryptoError::TagMismatch).into();
        assert_eq!(api_err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api_err.code(), "crypto_error");
    }

    #[test]
    fn test_error_serialization() {
        let err = ApiError::unauthorized("api_key_missing", "API key not found");
        let json = serde_json::to_value(&err.response).unwrap();

        assert_eq!(json["error"]["code"], "api_key_missing");
        assert_eq!(json["error"]["message"], "API key not found");
        assert_eq!(json["error"]["status"], 401);
        assert!(json["error"]["timestamp"].is_string());
        assert!(json["error"].get("details").is_none());
    }

    #[test]
    fn test_all_error_statuses() {
        assert_eq!(ApiError::unauthorized("c", "").status, StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::forbidden("c", "").status, StatusCode::FORBIDDEN);
        assert_eq!(ApiError::rate_limited("").status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(ApiError::internal("").status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ApiError::gateway_timeout("").status, StatusCode::GATEWAY_TIMEOUT);
    }
}
