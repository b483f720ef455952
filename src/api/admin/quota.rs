//! Manual quota maintenance

use axum::extract::State;
use chrono::Utc;
use tracing::info;

use crate::api::state::AppState;
use crate::api::types::{ApiError, Json};
use crate::infrastructure::quota::ResetSummary;

use super::RequireAdmin;

/// POST /admin/quota/reset
///
/// Runs the same pass as the scheduler; safe alongside it.
pub async fn reset_quotas(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
) -> Result<Json<ResetSummary>, ApiError> {
    info!(requested_by = ?admin.user_id, "Manual quota reset requested");

    let summary = state.scheduler.run_once(Utc::now()).await?;

    Ok(Json(summary))
}
