//! niche-search - Perfume Search Service
//!
//! **Module Identity:**
//! - Name: niche-search
//! - Default port: 5740
//!
//! Aggregates the local dataset and online perfume providers into one
//! reconciled result list, and serves the catalog, collection and sync API.

use anyhow::{Context, Result};
use clap::Parser;
use niche_common::config::{
    database_path, default_config_path, load_toml_config_or_default, resolve_root_folder,
};
use niche_search::config::DEFAULT_PORT;
use niche_search::sync::{RemoteStore, RestRemoteStore, DEFAULT_POLL_INTERVAL};
use niche_search::AppState;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "niche-search", version, about = "Perfume search service")]
struct Args {
    /// Folder holding the database (overrides NICHE_ROOT_FOLDER and TOML)
    #[arg(long)]
    root_folder: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, env = "NICHE_CONFIG")]
    config: Option<PathBuf>,

    /// HTTP port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| default_config_path("niche-search"));
    let toml_config = load_toml_config_or_default(&config_path);

    // RUST_LOG wins over the TOML level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&toml_config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting niche-search (Perfume Search) service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Config: {}", config_path.display());

    // Step 1: Resolve root folder
    let root_folder = resolve_root_folder(args.root_folder.as_deref(), &toml_config);
    info!("Root folder: {}", root_folder.display());

    // Step 2: Open or create database
    let db_path = database_path(&root_folder);
    let db_pool = niche_common::db::init_database(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    info!("Database: {}", db_path.display());

    // Step 3: Optional remote sync store
    let remote: Option<Arc<dyn RemoteStore>> = match toml_config.sync_url.as_deref() {
        Some(url) => {
            let poll = toml_config
                .sync_poll_interval_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_POLL_INTERVAL);
            let store: Arc<dyn RemoteStore> = Arc::new(
                RestRemoteStore::new(url, poll)
                    .with_context(|| format!("Invalid sync_url {}", url))?,
            );
            info!("Sync service: {}", url);
            Some(store)
        }
        None => None,
    };

    // Step 4: Application state and router
    let state = AppState::build(db_pool, &toml_config, Some(config_path), remote).await?;
    let app = niche_search::build_router(state);

    let port = args.port.or(toml_config.port).unwrap_or(DEFAULT_PORT);
    let addr = format!("127.0.0.1:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
