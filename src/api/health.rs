//! Liveness and readiness endpoints

use std::time::Instant;

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;

use crate::api::types::Json;
use crate::domain::credential::{CredentialId, CredentialStore};

use super::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub checks: Vec<ComponentCheck>,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Serialize)]
pub struct ComponentCheck {
    pub name: &'static str,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub latency_ms: u64,
}

/// Process is up
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: HealthStatus::Healthy,
        version: env!("CARGO_PKG_VERSION"),
        checks: Vec::new(),
    })
}

pub async fn live_check() -> impl IntoResponse {
    StatusCode::OK
}

/// 503 until the credential store answers
pub async fn ready_check(State(state): State<AppState>) -> impl IntoResponse {
    let store_check = check_store(state.store().as_ref()).await;
    let status = store_check.status;

    let code = match status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (
        code,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION"),
            checks: vec![store_check],
        }),
    )
}

async fn check_store(store: &dyn CredentialStore) -> ComponentCheck {
    let start = Instant::now();

    let result = match CredentialId::new("readiness-probe") {
        Ok(probe) => store.find_by_id(&probe).await.map(|_| ()),
        Err(e) => Err(crate::domain::DomainError::internal(e.to_string())),
    };

    let (status, message) = match result {
        Ok(()) => (HealthStatus::Healthy, None),
        Err(e) => (HealthStatus::Unhealthy, Some(e.to_string())),
    };

    ComponentCheck {
        name: "credential_store",
        status,
        message,
        latency_ms: start.elapsed().as_millis() as u64,
    }
}
