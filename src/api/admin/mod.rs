//! Admin API: credential lifecycle and quota maintenance

pub mod keys;
pub mod quota;

use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    routing::{get, post, put},
    Router,
};
use tracing::debug;

use crate::api::middleware::Principal;
use crate::api::types::ApiError;
use crate::domain::credential::Scope;

use super::state::AppState;

/// Extractor for callers holding the admin scope
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub Principal);

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let principal = Principal::from_request_parts(parts, state).await?;
        principal.require_scope(Scope::Admin)?;

        debug!(
            user_id = ?principal.user_id,
            credential_id = ?principal.credential_id,
            "Admin access granted"
        );
        Ok(RequireAdmin(principal))
    }
}

pub fn create_admin_router() -> Router<AppState> {
    Router::new()
        .route("/keys", post(keys::issue_key))
        .route("/keys/{key_id}", get(keys::get_key).delete(keys::revoke_key))
        .route("/keys/{key_id}/rotate", post(keys::rotate_key))
        .route("/keys/{key_id}/tier", put(keys::set_tier))
        .route("/keys/{key_id}/usage", get(keys::get_usage))
        .route("/users/{owner_id}/keys", get(keys::list_owner_keys))
        .route("/quota/reset", post(quota::reset_quotas))
}
