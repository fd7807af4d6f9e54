//! Catalog table operations
//!
//! Canonical records keyed by identity key. The full record is stored as
//! JSON; name, brand, rating and provenance are duplicated into columns for
//! filtering and ordering.

use crate::perfume::{DataSource, Perfume};
use crate::Result;
use chrono::Utc;
use sqlx::{Pool, Sqlite};

/// Minimum query length for local catalog search
pub const LOCAL_SEARCH_MIN_CHARS: usize = 2;

/// Maximum local catalog search results
pub const LOCAL_SEARCH_LIMIT: usize = 20;

fn decode(rows: Vec<(String,)>) -> Result<Vec<Perfume>> {
    rows.into_iter()
        .map(|(json,)| serde_json::from_str(&json).map_err(Into::into))
        .collect()
}

/// All catalog records ordered by name
pub async fn get_all(db: &Pool<Sqlite>) -> Result<Vec<Perfume>> {
    let rows: Vec<(String,)> = sqlx::query_as("SELECT record FROM perfumes ORDER BY name, brand")
        .fetch_all(db)
        .await?;
    decode(rows)
}

/// All catalog records not tagged with `source`
pub async fn get_all_except(db: &Pool<Sqlite>, source: DataSource) -> Result<Vec<Perfume>> {
    let rows: Vec<(String,)> =
        sqlx::query_as("SELECT record FROM perfumes WHERE data_source != ? ORDER BY name, brand")
            .bind(source.as_str())
            .fetch_all(db)
            .await?;
    decode(rows)
}

/// Records for a set of ids (missing ids are skipped)
pub async fn get_many(db: &Pool<Sqlite>, ids: &[String]) -> Result<Vec<Perfume>> {
    let mut perfumes = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(p) = get(db, id).await? {
            perfumes.push(p);
        }
    }
    Ok(perfumes)
}

pub async fn get(db: &Pool<Sqlite>, id: &str) -> Result<Option<Perfume>> {
    let row: Option<(String,)> = sqlx::query_as("SELECT record FROM perfumes WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await?;
    match row {
        Some((json,)) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

/// Insert or replace a record
pub async fn put(db: &Pool<Sqlite>, perfume: &Perfume) -> Result<()> {
    let mut tx = db.begin().await?;
    put_in(&mut tx, perfume).await?;
    tx.commit().await?;
    Ok(())
}

/// Insert or replace many records in one transaction
pub async fn put_many(db: &Pool<Sqlite>, perfumes: &[Perfume]) -> Result<()> {
    if perfumes.is_empty() {
        return Ok(());
    }
    let mut tx = db.begin().await?;
    for perfume in perfumes {
        put_in(&mut tx, perfume).await?;
    }
    tx.commit().await?;
    Ok(())
}

async fn put_in(tx: &mut sqlx::Transaction<'_, Sqlite>, perfume: &Perfume) -> Result<()> {
    let record = serde_json::to_string(perfume)?;
    sqlx::query(
        r#"
        INSERT INTO perfumes (id, name, brand, rating, data_source, record, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            brand = excluded.brand,
            rating = excluded.rating,
            data_source = excluded.data_source,
            record = excluded.record,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&perfume.id)
    .bind(&perfume.name)
    .bind(&perfume.brand)
    .bind(perfume.rating)
    .bind(perfume.data_source.as_str())
    .bind(record)
    .bind(Utc::now().to_rfc3339())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Delete a record; returns whether a row was removed
pub async fn delete(db: &Pool<Sqlite>, id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM perfumes WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn count(db: &Pool<Sqlite>) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM perfumes")
        .fetch_one(db)
        .await?;
    Ok(count)
}

/// Case-insensitive substring search over name or brand
pub async fn search_local(db: &Pool<Sqlite>, query: &str) -> Result<Vec<Perfume>> {
    let query = query.trim();
    if query.chars().count() < LOCAL_SEARCH_MIN_CHARS {
        return Ok(Vec::new());
    }
    let pattern = format!("%{}%", query.to_lowercase());
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT record FROM perfumes
         WHERE lower(name) LIKE ? OR lower(brand) LIKE ?
         ORDER BY rating DESC, name
         LIMIT ?",
    )
    .bind(&pattern)
    .bind(&pattern)
    .bind(LOCAL_SEARCH_LIMIT as i64)
    .fetch_all(db)
    .await?;
    decode(rows)
}
