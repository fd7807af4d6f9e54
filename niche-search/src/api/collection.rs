//! Collection and shelf endpoints

use super::actor_from_headers;
use crate::shelves::{CollectionStats, Shelf, ShelfPerfume};
use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use niche_common::db::collection::{self, CollectionUpdate};
use niche_common::CollectionEntry;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct AddRequest {
    /// false puts the perfume on the wishlist
    #[serde(default = "default_owned")]
    pub owned: bool,
}

fn default_owned() -> bool {
    true
}

/// GET /api/collection
pub async fn list_collection(State(state): State<AppState>) -> ApiResult<Json<Vec<ShelfPerfume>>> {
    Ok(Json(state.catalog.collection_view().await?))
}

/// GET /api/collection/stats
pub async fn collection_stats(State(state): State<AppState>) -> ApiResult<Json<CollectionStats>> {
    Ok(Json(state.catalog.stats().await?))
}

/// GET /api/shelves/:shelf
///
/// Shelf names: `all`, `wishlist`, `top-rated`, `season-<name>`,
/// `occasion-<name>`, `time-day`, `time-night`, `time-versatile`,
/// `family-<name>`.
pub async fn get_shelf(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<Vec<ShelfPerfume>>> {
    let shelf: Shelf = name
        .parse()
        .map_err(|_| ApiError::NotFound(format!("Unknown shelf: {}", name)))?;
    Ok(Json(state.catalog.shelf(shelf).await?))
}

/// POST /api/collection/:id
///
/// 201 with the new entry, or 200 with the existing one when the perfume
/// was already collected.
pub async fn add_to_collection(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<AddRequest>,
) -> ApiResult<(StatusCode, Json<CollectionEntry>)> {
    let actor = actor_from_headers(&headers);
    match state.catalog.add_to_collection(&id, req.owned, &actor).await? {
        Some(entry) => Ok((StatusCode::CREATED, Json(entry))),
        None => {
            let existing = collection::get(&state.db, &id)
                .await?
                .ok_or_else(|| ApiError::Internal(format!("Entry {} vanished", id)))?;
            Ok((StatusCode::OK, Json(existing)))
        }
    }
}

/// PATCH /api/collection/:id
pub async fn update_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(changes): Json<CollectionUpdate>,
) -> ApiResult<Json<CollectionEntry>> {
    if changes.is_empty() {
        return Err(ApiError::BadRequest("No fields to update".to_string()));
    }
    let actor = actor_from_headers(&headers);
    Ok(Json(
        state
            .catalog
            .update_collection_entry(&id, &changes, &actor)
            .await?,
    ))
}

/// DELETE /api/collection/:id
pub async fn remove_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<StatusCode> {
    let actor = actor_from_headers(&headers);
    if state.catalog.remove_from_collection(&id, &actor).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Collection entry {}", id)))
    }
}

pub fn collection_routes() -> Router<AppState> {
    Router::new()
        .route("/api/collection", get(list_collection))
        .route("/api/collection/stats", get(collection_stats))
        .route(
            "/api/collection/:id",
            post(add_to_collection).patch(update_entry).delete(remove_entry),
        )
        .route("/api/shelves/:shelf", get(get_shelf))
}
