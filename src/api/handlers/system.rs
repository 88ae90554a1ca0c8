use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::state::AppState;
use crate::api::types::{ApiError, HealthResponse, ResyncResponse};
use crate::domain::PendingTransaction;
use crate::queue::QueueStats;

#[derive(Debug, Clone, Serialize)]
pub struct QueueStatusResponse {
    pub stats: QueueStats,
    pub pending: Vec<PendingTransaction>,
}

/// GET /api/system/health
pub async fn get_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_seconds: state.uptime_seconds(),
        queue_halted: state.queue.is_halted().await,
    })
}

/// GET /api/system/queue
pub async fn get_queue_status(State(state): State<AppState>) -> Json<QueueStatusResponse> {
    Json(QueueStatusResponse {
        stats: state.queue.stats().await,
        pending: state.queue.pending_snapshot(),
    })
}

/// POST /api/system/resync (operator-triggered nonce resync)
pub async fn resync_nonce(State(state): State<AppState>) -> Result<Json<ResyncResponse>, ApiError> {
    let next_nonce = state.queue.resync_nonce().await?;
    Ok(Json(ResyncResponse { next_nonce }))
}
