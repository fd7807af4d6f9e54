//! Settings database operations
//!
//! Key-value accessors over the `settings` table.

use crate::{Error, Result};
use sqlx::{Pool, Sqlite};

/// Settings key holding the loaded dataset version
pub const DATASET_VERSION_KEY: &str = "dataset_version";

fn api_key_setting(provider_key: &str) -> String {
    format!("{}_api_key", provider_key)
}

/// Get a provider API key (`provider_key` is e.g. "fragella")
pub async fn get_api_key(db: &Pool<Sqlite>, provider_key: &str) -> Result<Option<String>> {
    get_setting::<String>(db, &api_key_setting(provider_key)).await
}

/// Set a provider API key
pub async fn set_api_key(db: &Pool<Sqlite>, provider_key: &str, key: &str) -> Result<()> {
    set_setting(db, &api_key_setting(provider_key), key).await
}

/// Version of the bulk dataset currently loaded, if any
pub async fn get_dataset_version(db: &Pool<Sqlite>) -> Result<Option<u32>> {
    get_setting(db, DATASET_VERSION_KEY).await
}

/// Record that dataset `version` finished loading
pub async fn set_dataset_version(db: &Pool<Sqlite>, version: u32) -> Result<()> {
    set_setting(db, DATASET_VERSION_KEY, version).await
}

/// Generic setting getter
pub async fn get_setting<T>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await?;

    match row {
        Some((value,)) => {
            let parsed = value
                .parse::<T>()
                .map_err(|e| Error::Config(format!("Parse setting {} failed: {}", key, e)))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

/// Generic setting setter (upsert)
pub async fn set_setting<T>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()>
where
    T: std::fmt::Display,
{
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await?;

    Ok(())
}
