//! Shared fixtures for niche-search integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use niche_common::config::TomlConfig;
use niche_common::db::dataset::DatasetRow;
use niche_common::{Concentration, DataSource, Perfume};
use niche_search::providers::dataset::CURRENT_DATASET_VERSION;
use niche_search::providers::{PerfumeProvider, ProviderError};
use niche_search::sync::RemoteStore;
use niche_search::AppState;
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// In-memory database with the full schema
pub async fn test_db() -> SqlitePool {
    niche_common::db::open_in_memory()
        .await
        .expect("Failed to create in-memory database")
}

pub fn perfume(brand: &str, name: &str, concentration: Concentration) -> Perfume {
    Perfume::new(brand, name, concentration, DataSource::Manual)
}

/// Provider returning fixed records, or failing on every call
pub struct StaticProvider {
    name: &'static str,
    records: Vec<Perfume>,
    fail: bool,
    calls: AtomicUsize,
}

impl StaticProvider {
    pub fn returning(name: &'static str, records: Vec<Perfume>) -> Arc<Self> {
        Arc::new(Self {
            name,
            records,
            fail: false,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            records: Vec::new(),
            fail: true,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PerfumeProvider for StaticProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn search(&self, _query: &str, limit: usize) -> Result<Vec<Perfume>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ProviderError::Transport {
                provider: self.name,
                status: Some(500),
                detail: "server exploded".to_string(),
            });
        }
        Ok(self.records.iter().take(limit).cloned().collect())
    }
}

/// Provider that answers queries starting with "slow" after a delay
pub struct SlowProvider {
    pub delay: Duration,
}

#[async_trait]
impl PerfumeProvider for SlowProvider {
    fn name(&self) -> &'static str {
        "Slow"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn search(&self, query: &str, _limit: usize) -> Result<Vec<Perfume>, ProviderError> {
        if query.starts_with("slow") {
            tokio::time::sleep(self.delay).await;
        }
        Ok(vec![perfume("Test", query, Concentration::Edp)])
    }
}

/// Application state over an in-memory database with no provider keys
pub async fn test_state(remote: Option<Arc<dyn RemoteStore>>) -> AppState {
    test_state_with(TomlConfig::default(), remote).await
}

pub async fn test_state_with(config: TomlConfig, remote: Option<Arc<dyn RemoteStore>>) -> AppState {
    let db = test_db().await;
    AppState::build(db, &config, None, remote)
        .await
        .expect("Failed to build app state")
}

/// Store dataset rows the way an import would, then let the provider see them
pub async fn load_dataset(state: &AppState, rows: &[DatasetRow]) {
    niche_common::db::dataset::bulk_put(&state.db, rows)
        .await
        .expect("Failed to store dataset rows");
    niche_common::db::settings::set_dataset_version(&state.db, CURRENT_DATASET_VERSION)
        .await
        .expect("Failed to mark dataset version");
    assert!(state.dataset.refresh_availability().await.expect("Failed to refresh dataset"));
}
