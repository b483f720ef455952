//! Caller-facing endpoints behind the gateway

pub mod keys;

use axum::{
    routing::get,
    Router,
};

use crate::api::middleware::Principal;
use crate::api::types::Json;

use super::state::AppState;

/// GET /v1/whoami
pub async fn whoami(principal: Principal) -> Json<Principal> {
    Json(principal)
}

pub fn create_v1_router() -> Router<AppState> {
    Router::new()
        .route("/whoami", get(whoami))
        .route("/keys", get(keys::list_my_keys).post(keys::issue_my_key))
        .route("/keys/{key_id}/secret", get(keys::reveal_my_key))
        .route("/keys/{key_id}/usage", get(keys::my_key_usage))
}
