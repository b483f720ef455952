//! Self-service credential endpoints for the authenticated user

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::admin::keys::{parse_key_id, parse_month, UsageQuery};
use crate::api::middleware::Principal;
use crate::api::state::AppState;
use crate::api::types::credential::{ListCredentialsResponse, UsageWindowResponse};
use crate::api::types::{ApiError, IssuedCredentialResponse, Json};
use crate::domain::credential::{Credential, CredentialId, KeyClass, Scope, UserId};
use crate::infrastructure::credential::IssueCredentialRequest;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateKeyRequest {
    pub name: String,
    #[serde(default)]
    pub class: KeyClass,
    #[serde(default)]
    pub allowed_ips: Vec<String>,
    #[serde(default)]
    pub allowed_domains: Vec<String>,
}

#[derive(Serialize)]
pub struct RevealedSecretResponse {
    pub id: String,
    pub secret: String,
}

fn caller(principal: &Principal) -> Result<UserId, ApiError> {
    let user_id = principal
        .user_id
        .as_deref()
        .ok_or_else(|| ApiError::unauthorized("unauthenticated", "Authentication required"))?;

    UserId::new(user_id).map_err(|e| ApiError::bad_request(e.to_string()))
}

/// Load a credential the caller owns; someone else's key reads as missing
async fn owned_credential(
    state: &AppState,
    id: &CredentialId,
    owner: &UserId,
) -> Result<Credential, ApiError> {
    state
        .credentials
        .get(id)
        .await?
        .filter(|c| c.owner_id() == owner)
        .ok_or_else(|| ApiError::not_found(format!("Credential '{}' not found", id)))
}

/// GET /v1/keys
pub async fn list_my_keys(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<ListCredentialsResponse>, ApiError> {
    let owner = caller(&principal)?;
    let credentials = state.credentials.list_by_owner(&owner).await?;

    Ok(Json(ListCredentialsResponse::new(&credentials)))
}

/// POST /v1/keys
pub async fn issue_my_key(
    State(state): State<AppState>,
    principal: Principal,
    Json(request): Json<CreateKeyRequest>,
) -> Result<(StatusCode, Json<IssuedCredentialResponse>), ApiError> {
    let owner = caller(&principal)?;

    if request.class == KeyClass::Admin {
        principal.require_scope(Scope::Admin)?;
    }

    let issue = IssueCredentialRequest {
        allowed_ips: request.allowed_ips,
        allowed_domains: request.allowed_domains,
        class: request.class,
        ..IssueCredentialRequest::new(owner.as_str(), request.name)
    };

    let issued = state.credentials.issue(issue).await?;

    Ok((StatusCode::CREATED, Json(issued.into())))
}

/// GET /v1/keys/{key_id}/secret
pub async fn reveal_my_key(
    State(state): State<AppState>,
    principal: Principal,
    Path(key_id): Path<String>,
) -> Result<Json<RevealedSecretResponse>, ApiError> {
    let owner = caller(&principal)?;
    let id = parse_key_id(&key_id)?;

    debug!(credential_id = %id, "Revealing credential secret to owner");

    let secret = state.credentials.reveal(&id, &owner).await?;

    Ok(Json(RevealedSecretResponse {
        id: id.to_string(),
        secret: secret.as_str().to_string(),
    }))
}

/// GET /v1/keys/{key_id}/usage
///
/// Owners see their own keys; the usage-read scope sees any key.
pub async fn my_key_usage(
    State(state): State<AppState>,
    principal: Principal,
    Path(key_id): Path<String>,
    Query(query): Query<UsageQuery>,
) -> Result<Json<UsageWindowResponse>, ApiError> {
    let id = parse_key_id(&key_id)?;
    let month = parse_month(query.month.as_deref())?;

    if !principal.has_scope(Scope::UsageRead) {
        let owner = caller(&principal)?;
        owned_credential(&state, &id, &owner).await?;
    }

    let window = state.credentials.usage_window(&id, month).await?;

    Ok(Json(UsageWindowResponse::from(&window)))
}
