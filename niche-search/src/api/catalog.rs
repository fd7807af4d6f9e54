//! Catalog endpoints
//!
//! - `GET /api/catalog` all records, or a local text match with `?q=`
//! - `GET /api/catalog/:id`
//! - `POST /api/catalog` save one record or an array of records

use super::actor_from_headers;
use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use niche_common::Perfume;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct CatalogParams {
    pub q: Option<String>,
}

/// Request body accepting a single record or a batch
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    Many(Vec<Perfume>),
    One(Box<Perfume>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<Perfume> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![*item],
        }
    }
}

/// GET /api/catalog
pub async fn list_catalog(
    State(state): State<AppState>,
    Query(params): Query<CatalogParams>,
) -> ApiResult<Json<Vec<Perfume>>> {
    let perfumes = match params.q.as_deref().map(str::trim) {
        Some(q) if !q.is_empty() => state.catalog.search_local(q).await?,
        _ => state.catalog.all_perfumes().await?,
    };
    Ok(Json(perfumes))
}

/// GET /api/catalog/:id
pub async fn get_perfume(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Perfume>> {
    Ok(Json(state.catalog.perfume(&id).await?))
}

/// POST /api/catalog
///
/// Returns the stored records with their canonical ids.
pub async fn save_perfumes(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<OneOrMany>,
) -> ApiResult<(StatusCode, Json<Vec<Perfume>>)> {
    let perfumes = body.into_vec();
    if perfumes.is_empty() {
        return Err(ApiError::BadRequest("No perfumes in request".to_string()));
    }
    let actor = actor_from_headers(&headers);
    let saved = state.catalog.save_perfumes(perfumes, &actor).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/api/catalog", get(list_catalog).post(save_perfumes))
        .route("/api/catalog/:id", get(get_perfume))
}
