//! Credential management admin endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, info};

use crate::api::state::AppState;
use crate::api::types::credential::{ListCredentialsResponse, UsageWindowResponse};
use crate::api::types::{ApiError, CredentialResponse, IssuedCredentialResponse, Json};
use crate::domain::credential::{CredentialId, UserId};
use crate::domain::usage::{MonthKey, RateTier};
use crate::infrastructure::credential::IssueCredentialRequest;

use super::RequireAdmin;

#[derive(Debug, Clone, Deserialize)]
pub struct SetTierRequest {
    pub tier: RateTier,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UsageQuery {
    /// `YYYY-MM`; defaults to the current month
    pub month: Option<String>,
}

pub(crate) fn parse_key_id(raw: &str) -> Result<CredentialId, ApiError> {
    CredentialId::new(raw).map_err(|e| ApiError::bad_request(e.to_string()))
}

pub(crate) fn parse_month(raw: Option<&str>) -> Result<MonthKey, ApiError> {
    match raw {
        Some(raw) => raw.parse().map_err(ApiError::bad_request),
        None => Ok(MonthKey::of(Utc::now())),
    }
}

/// POST /admin/keys
pub async fn issue_key(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(request): Json<IssueCredentialRequest>,
) -> Result<(StatusCode, Json<IssuedCredentialResponse>), ApiError> {
    info!(
        owner_id = %request.owner_id,
        issued_by = ?admin.user_id,
        "Admin issuing credential"
    );

    let issued = state.credentials.issue(request).await?;

    Ok((StatusCode::CREATED, Json(issued.into())))
}

/// GET /admin/keys/{key_id}
pub async fn get_key(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(key_id): Path<String>,
) -> Result<Json<CredentialResponse>, ApiError> {
    debug!(key_id = %key_id, "Admin getting credential");

    let id = parse_key_id(&key_id)?;
    let credential = state
        .credentials
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Credential '{}' not found", key_id)))?;

    Ok(Json(CredentialResponse::from(&credential)))
}

/// GET /admin/users/{owner_id}/keys
pub async fn list_owner_keys(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(owner_id): Path<String>,
) -> Result<Json<ListCredentialsResponse>, ApiError> {
    let owner = UserId::new(owner_id).map_err(|e| ApiError::bad_request(e.to_string()))?;
    let credentials = state.credentials.list_by_owner(&owner).await?;

    Ok(Json(ListCredentialsResponse::new(&credentials)))
}

/// DELETE /admin/keys/{key_id}
pub async fn revoke_key(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(key_id): Path<String>,
) -> Result<Json<CredentialResponse>, ApiError> {
    let id = parse_key_id(&key_id)?;
    let revoked = state.credentials.revoke(&id).await?;

    Ok(Json(CredentialResponse::from(&revoked)))
}

/// POST /admin/keys/{key_id}/rotate
pub async fn rotate_key(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(key_id): Path<String>,
) -> Result<Json<IssuedCredentialResponse>, ApiError> {
    let id = parse_key_id(&key_id)?;
    let rotated = state.credentials.rotate(&id).await?;

    Ok(Json(rotated.into()))
}

/// PUT /admin/keys/{key_id}/tier
pub async fn set_tier(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(key_id): Path<String>,
    Json(request): Json<SetTierRequest>,
) -> Result<Json<CredentialResponse>, ApiError> {
    let id = parse_key_id(&key_id)?;
    let updated = state.credentials.set_tier(&id, request.tier).await?;

    Ok(Json(CredentialResponse::from(&updated)))
}

/// GET /admin/keys/{key_id}/usage?month=YYYY-MM
pub async fn get_usage(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(key_id): Path<String>,
    Query(query): Query<UsageQuery>,
) -> Result<Json<UsageWindowResponse>, ApiError> {
    let id = parse_key_id(&key_id)?;
    let month = parse_month(query.month.as_deref())?;
    let window = state.credentials.usage_window(&id, month).await?;

    Ok(Json(UsageWindowResponse::from(&window)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_month() {
        assert_eq!(
            parse_month(Some("2024-03")).unwrap(),
            MonthKey::new(2024, 3).unwrap()
        );
        assert_eq!(parse_month(None).unwrap(), MonthKey::of(Utc::now()));
        assert_eq!(
            parse_month(Some("2024-13")).unwrap_err().status,
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_parse_key_id_rejects_invalid() {
        assert!(parse_key_id("key-1").is_ok());
        assert!(parse_key_id("bad id!").is_err());
    }
}
