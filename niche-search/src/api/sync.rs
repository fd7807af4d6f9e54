//! Account sync endpoints
//!
//! - `POST /api/sync/login` pull, merge, write back, start listening
//! - `POST /api/sync/logout` stop listening
//! - `POST /api/sync/retry` re-queue failed propagations

use crate::sync::{SyncManager, SyncReport, UserId};
use crate::{ApiError, ApiResult, AppState};
use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub user_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryResponse {
    pub requeued: usize,
}

fn sync_manager(state: &AppState) -> ApiResult<&Arc<SyncManager>> {
    state
        .sync
        .as_ref()
        .ok_or_else(|| ApiError::BadRequest("Sync is not configured".to_string()))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<SyncReport>> {
    let manager = sync_manager(&state)?;
    let user_id = req.user_id.trim();
    if user_id.is_empty() {
        return Err(ApiError::BadRequest("userId is required".to_string()));
    }
    let report = manager.sync_on_login(&UserId(user_id.to_string())).await?;
    Ok(Json(report))
}

pub async fn logout(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    let manager = sync_manager(&state)?;
    manager.sync_on_logout().await;
    Ok(Json(serde_json::json!({ "success": true })))
}

pub async fn retry(State(state): State<AppState>) -> ApiResult<Json<RetryResponse>> {
    let queue = state
        .catalog
        .propagation()
        .ok_or_else(|| ApiError::BadRequest("Sync is not configured".to_string()))?;
    let requeued = queue.retry_failed().await;
    Ok(Json(RetryResponse { requeued }))
}

pub fn sync_routes() -> Router<AppState> {
    Router::new()
        .route("/api/sync/login", post(login))
        .route("/api/sync/logout", post(logout))
        .route("/api/sync/retry", post(retry))
}
