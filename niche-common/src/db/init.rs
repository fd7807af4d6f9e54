//! Database initialization
//!
//! Creates the database file and every table on first run. All statements
//! are idempotent so initialization is safe on every startup.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Open (or create) the database and ensure the schema exists
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL lets search cursors over the dataset run while the consumer writes
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Open a private in-memory database with the full schema
///
/// Pinned to a single connection that never expires: every SQLite
/// `:memory:` connection is its own database.
pub async fn open_in_memory() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;
    create_schema(&pool).await?;
    Ok(pool)
}

/// Create every table and index if missing
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_settings_table(pool).await?;
    create_perfumes_table(pool).await?;
    create_collection_table(pool).await?;
    create_dataset_table(pool).await?;
    Ok(())
}

async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_perfumes_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS perfumes (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            brand TEXT NOT NULL,
            rating REAL NOT NULL DEFAULT 0,
            data_source TEXT NOT NULL,
            record TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_perfumes_brand ON perfumes(brand)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_perfumes_rating ON perfumes(rating)")
        .execute(pool)
        .await?;
    Ok(())
}

async fn create_collection_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS collection (
            perfume_id TEXT PRIMARY KEY,
            added_at TEXT NOT NULL,
            owned INTEGER NOT NULL,
            personal_rating REAL,
            personal_notes TEXT,
            price_estimate TEXT,
            tags TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_collection_owned ON collection(owned)")
        .execute(pool)
        .await?;
    Ok(())
}

async fn create_dataset_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS dataset_perfumes (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            brand TEXT NOT NULL,
            year INTEGER NOT NULL DEFAULT 0,
            concentration TEXT NOT NULL DEFAULT '',
            rating REAL NOT NULL DEFAULT 0,
            accords TEXT NOT NULL DEFAULT '',
            top_notes TEXT NOT NULL DEFAULT '',
            mid_notes TEXT NOT NULL DEFAULT '',
            base_notes TEXT NOT NULL DEFAULT ''
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_dataset_rating ON dataset_perfumes(rating DESC)")
        .execute(pool)
        .await?;
    Ok(())
}
