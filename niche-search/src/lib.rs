//! niche-search library interface
//!
//! Multi-provider perfume search with record reconciliation, plus the
//! catalog, collection and sync services behind the HTTP API.

pub mod aggregator;
pub mod api;
pub mod catalog;
pub mod config;
pub mod error;
pub mod prices;
pub mod providers;
pub mod richness;
pub mod session;
pub mod shelves;
pub mod sync;

pub use crate::error::{ApiError, ApiResult, StartupError};

use crate::aggregator::SearchAggregator;
use crate::catalog::CatalogService;
use crate::config::{ProviderCredentials, DEFAULT_SEARCH_LIMIT};
use crate::providers::fragella::FRAGELLA_BASE_URL;
use crate::providers::fragrance_finder::FRAGRANCEFINDER_BASE_URL;
use crate::providers::{FragellaProvider, FragranceFinderProvider, ParfumoProvider, PerfumeProvider};
use crate::session::SearchSessions;
use crate::sync::{FailureHook, PropagationFailure, PropagationQueue, RemoteStore, SyncManager};
use axum::Router;
use chrono::{DateTime, Utc};
use niche_common::config::TomlConfig;
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Search entry point with per-client stale-query guards
    pub search: Arc<SearchSessions>,
    /// Bulk dataset provider (also registered with the aggregator)
    pub dataset: Arc<ParfumoProvider>,
    /// Sole writer of catalog and collection
    pub catalog: Arc<CatalogService>,
    /// Runtime-updatable provider keys
    pub credentials: ProviderCredentials,
    /// Present when a remote sync service is configured
    pub sync: Option<Arc<SyncManager>>,
    /// TOML file receiving best-effort settings write-back
    pub toml_path: Option<PathBuf>,
    pub default_search_limit: usize,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<Mutex<Option<String>>>,
}

impl AppState {
    /// Wire providers, services and optional sync around an open database
    ///
    /// Provider order is priority order: dataset, Fragella, FragranceFinder.
    pub async fn build(
        db: SqlitePool,
        toml_config: &TomlConfig,
        toml_path: Option<PathBuf>,
        remote: Option<Arc<dyn RemoteStore>>,
    ) -> Result<Self, StartupError> {
        let credentials = ProviderCredentials::resolve(&db, toml_config).await?;
        let dataset = Arc::new(ParfumoProvider::open(db.clone()).await?);

        let fragella = FragellaProvider::with_base_url(
            credentials.fragella.clone(),
            toml_config
                .fragella_base_url
                .as_deref()
                .unwrap_or(FRAGELLA_BASE_URL),
        )?;
        let fragrance_finder = FragranceFinderProvider::with_base_url(
            credentials.fragrance_finder.clone(),
            toml_config
                .fragrancefinder_base_url
                .as_deref()
                .unwrap_or(FRAGRANCEFINDER_BASE_URL),
        )?;

        let providers: Vec<Arc<dyn PerfumeProvider>> = vec![
            dataset.clone(),
            Arc::new(fragella),
            Arc::new(fragrance_finder),
        ];
        let aggregator = Arc::new(SearchAggregator::new(providers));
        for status in aggregator.provider_status() {
            info!(provider = %status.name, available = status.available, "Provider registered");
        }

        let last_error: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
        let (propagation, sync) = match remote {
            Some(remote) => {
                let slot = Arc::clone(&last_error);
                let hook: FailureHook = Arc::new(move |failure: &PropagationFailure| {
                    let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
                    *guard = Some(format!("Remote sync failed: {}", failure.error));
                });
                let (queue, _worker) = PropagationQueue::spawn(Arc::clone(&remote), Some(hook));
                let manager =
                    Arc::new(SyncManager::new(db.clone(), remote).with_propagation(queue.clone()));
                info!("Remote sync enabled");
                (Some(queue), Some(manager))
            }
            None => (None, None),
        };

        Ok(Self {
            catalog: Arc::new(CatalogService::new(db.clone(), propagation)),
            db,
            search: Arc::new(SearchSessions::new(aggregator)),
            dataset,
            credentials,
            sync,
            toml_path,
            default_search_limit: toml_config.default_search_limit.unwrap_or(DEFAULT_SEARCH_LIMIT),
            startup_time: Utc::now(),
            last_error,
        })
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::search_routes())
        .merge(api::catalog_routes())
        .merge(api::collection_routes())
        .merge(api::settings_routes())
        .merge(api::sync_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
