//! Settings API handlers
//!
//! POST /api/settings/:provider/api_key - Configure a provider API key

use crate::config::{is_valid_key, persist_api_key, KeyedProvider};
use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

/// API key update request
#[derive(Debug, Deserialize)]
pub struct SetApiKeyRequest {
    pub api_key: String,
}

/// API key update response
#[derive(Debug, Serialize)]
pub struct SetApiKeyResponse {
    pub success: bool,
    pub provider: String,
    pub message: String,
}

/// POST /api/settings/:provider/api_key
///
/// Writes the key to the database (authoritative) and to the TOML file
/// (best-effort), then swaps it into the running provider.
///
/// **Errors:**
/// - 400 Bad Request: empty or whitespace-only key
/// - 404 Not Found: unknown provider
/// - 500 Internal Server Error: database write failed
pub async fn set_api_key(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Json(req): Json<SetApiKeyRequest>,
) -> ApiResult<Json<SetApiKeyResponse>> {
    let keyed = KeyedProvider::from_settings_key(&provider)
        .ok_or_else(|| ApiError::NotFound(format!("Unknown provider: {}", provider)))?;

    if !is_valid_key(&req.api_key) {
        return Err(ApiError::BadRequest("API key cannot be empty".to_string()));
    }
    let key = req.api_key.trim();

    persist_api_key(&state.db, state.toml_path.as_deref(), keyed, key).await?;
    state.credentials.slot(keyed).set(Some(key.to_string()));

    info!(provider = keyed.display_name(), "API key updated");

    Ok(Json(SetApiKeyResponse {
        success: true,
        provider: keyed.settings_key().to_string(),
        message: format!("{} API key configured", keyed.display_name()),
    }))
}

pub fn settings_routes() -> Router<AppState> {
    Router::new().route("/api/settings/:provider/api_key", post(set_api_key))
}
