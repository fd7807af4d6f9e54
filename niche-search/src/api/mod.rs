//! HTTP API handlers for niche-search

pub mod catalog;
pub mod collection;
pub mod health;
pub mod search;
pub mod settings;
pub mod sync;

pub use catalog::catalog_routes;
pub use collection::collection_routes;
pub use health::health_routes;
pub use search::search_routes;
pub use settings::settings_routes;
pub use sync::sync_routes;

use crate::catalog::Actor;
use crate::sync::UserId;
use axum::http::HeaderMap;

/// Header naming the signed-in user for mutations
pub const USER_HEADER: &str = "x-niche-user";

/// Header scoping the stale-search guard to one client (tab, device)
pub const CLIENT_HEADER: &str = "x-niche-client";

/// Search client from the request; blank or absent means anonymous
pub fn client_from_headers(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(CLIENT_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Acting user from the request; no header (or a blank one) means local-only
pub fn actor_from_headers(headers: &HeaderMap) -> Actor {
    headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| Actor::User(UserId(v.to_string())))
        .unwrap_or(Actor::Local)
}
