//! Search endpoints
//!
//! - `GET /api/search?q=&limit=` aggregated multi-provider search, guarded
//!   per `x-niche-client`
//! - `GET /api/providers` provider availability

use super::client_from_headers;
use crate::aggregator::{ProviderStatus, SearchResult, SearchStatus};
use crate::session::SessionOutcome;
use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::{Query, State},
    http::HeaderMap,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

/// Upper bound on the per-provider limit a client may request
pub const MAX_SEARCH_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    #[serde(flatten)]
    pub result: SearchResult,
    pub status: SearchStatus,
}

/// GET /api/search
///
/// **Errors:**
/// - 400 Bad Request: blank query
/// - 409 Conflict: the same client started a newer search before this one finished
pub async fn search(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<SearchResponse>> {
    let query = params.q.as_deref().map(str::trim).unwrap_or_default();
    if query.is_empty() {
        return Err(ApiError::BadRequest("Query parameter q is required".to_string()));
    }
    let limit = params
        .limit
        .unwrap_or(state.default_search_limit)
        .clamp(1, MAX_SEARCH_LIMIT);

    let session = state.search.for_client(client_from_headers(&headers));
    match session.search(query, limit).await {
        SessionOutcome::Current(result) => {
            let status = result.status();
            Ok(Json(SearchResponse { result, status }))
        }
        SessionOutcome::Superseded { query } => Err(ApiError::Conflict(format!(
            "Search for {:?} was superseded by a newer query",
            query
        ))),
    }
}

/// GET /api/providers
pub async fn providers(State(state): State<AppState>) -> Json<Vec<ProviderStatus>> {
    Json(state.search.aggregator().provider_status())
}

pub fn search_routes() -> Router<AppState> {
    Router::new()
        .route("/api/search", get(search))
        .route("/api/providers", get(providers))
}
