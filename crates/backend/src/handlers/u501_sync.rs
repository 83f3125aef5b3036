use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use contracts::usecases::u501_sync_from_erp::{
    response::SyncStartStatus, CancelResponse, ScheduledRunResponse, SyncProgress, SyncRequest,
    SyncStartResponse,
};

use super::app_state::AppState;

/// POST /api/u501/sync/start
pub async fn start_sync(
    State(state): State<AppState>,
    Json(request): Json<SyncRequest>,
) -> Result<Json<SyncStartResponse>, (StatusCode, Json<SyncStartResponse>)> {
    match state.executor.start_sync(request).await {
        Ok(response) => Ok(Json(response)),
        Err(e) => {
            tracing::error!("Failed to start ERP sync: {}", e);
            Err((
                StatusCode::BAD_REQUEST,
                Json(SyncStartResponse {
                    session_id: String::new(),
                    status: SyncStartStatus::Failed,
                    message: e.to_string(),
                }),
            ))
        }
    }
}

/// GET /api/u501/sync/:session_id/progress
pub async fn get_progress(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SyncProgress>, StatusCode> {
    state
        .executor
        .get_progress(&session_id)
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

/// POST /api/u501/sync/:session_id/cancel
pub async fn cancel_sync(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Json<CancelResponse> {
    Json(state.executor.cancel(&session_id))
}

/// POST /api/u501/sync/run-scheduled
pub async fn run_scheduled(State(state): State<AppState>) -> Json<ScheduledRunResponse> {
    Json(state.scheduler.run_now())
}
