//! Queue statistics handler.

use axum::Json;
use axum::extract::State;

use siteaudit_service::QueueStats;

use crate::dto::ApiResponse;
use crate::error::ApiError;
use crate::state::AppState;

/// GET /api/queue/stats
pub async fn queue_stats(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<QueueStats>>, ApiError> {
    let stats = state.queue_service.stats().await?;
    Ok(Json(ApiResponse::ok(stats)))
}
