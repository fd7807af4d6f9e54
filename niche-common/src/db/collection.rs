//! Collection table operations
//!
//! Entries are the user's overlay on catalog records: owned vs wishlist,
//! personal rating and notes, price and tags.

use crate::perfume::{CollectionEntry, PriceEstimate};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};

#[derive(Debug, sqlx::FromRow)]
struct CollectionRow {
    perfume_id: String,
    added_at: DateTime<Utc>,
    owned: bool,
    personal_rating: Option<f64>,
    personal_notes: Option<String>,
    price_estimate: Option<String>,
    tags: Option<String>,
}

impl CollectionRow {
    fn into_entry(self) -> Result<CollectionEntry> {
        let price_estimate = self
            .price_estimate
            .as_deref()
            .map(serde_json::from_str::<PriceEstimate>)
            .transpose()?;
        let tags = self
            .tags
            .as_deref()
            .map(serde_json::from_str::<Vec<String>>)
            .transpose()?;
        Ok(CollectionEntry {
            perfume_id: self.perfume_id,
            added_at: self.added_at,
            owned: self.owned,
            personal_rating: self.personal_rating,
            personal_notes: self.personal_notes,
            price_estimate,
            tags,
        })
    }
}

/// Partial update of a collection entry; `None` fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owned: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personal_rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personal_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_estimate: Option<PriceEstimate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl CollectionUpdate {
    pub fn is_empty(&self) -> bool {
        self == &CollectionUpdate::default()
    }

    /// Apply to an in-memory entry
    pub fn apply_to(&self, entry: &mut CollectionEntry) {
        if let Some(owned) = self.owned {
            entry.owned = owned;
        }
        if let Some(rating) = self.personal_rating {
            entry.personal_rating = Some(rating);
        }
        if let Some(notes) = &self.personal_notes {
            entry.personal_notes = Some(notes.clone());
        }
        if let Some(price) = &self.price_estimate {
            entry.price_estimate = Some(price.clone());
        }
        if let Some(tags) = &self.tags {
            entry.tags = Some(tags.clone());
        }
    }
}

const SELECT_COLUMNS: &str = "SELECT perfume_id, added_at, owned, personal_rating, personal_notes, price_estimate, tags FROM collection";

pub async fn get_all(db: &Pool<Sqlite>) -> Result<Vec<CollectionEntry>> {
    let rows: Vec<CollectionRow> = sqlx::query_as(&format!("{} ORDER BY added_at", SELECT_COLUMNS))
        .fetch_all(db)
        .await?;
    rows.into_iter().map(CollectionRow::into_entry).collect()
}

pub async fn get(db: &Pool<Sqlite>, perfume_id: &str) -> Result<Option<CollectionEntry>> {
    let row: Option<CollectionRow> =
        sqlx::query_as(&format!("{} WHERE perfume_id = ?", SELECT_COLUMNS))
            .bind(perfume_id)
            .fetch_optional(db)
            .await?;
    row.map(CollectionRow::into_entry).transpose()
}

/// Insert `entry` unless one already exists for its perfume
///
/// Returns `true` when inserted, `false` when an entry was already present
/// (the existing entry is left untouched).
pub async fn add(db: &Pool<Sqlite>, entry: &CollectionEntry) -> Result<bool> {
    let result = bind_entry(
        sqlx::query(
            "INSERT INTO collection (perfume_id, added_at, owned, personal_rating, personal_notes, price_estimate, tags)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(perfume_id) DO NOTHING",
        ),
        entry,
    )?
    .execute(db)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Insert or replace an entry
pub async fn put(db: &Pool<Sqlite>, entry: &CollectionEntry) -> Result<()> {
    let mut tx = db.begin().await?;
    put_in(&mut tx, entry).await?;
    tx.commit().await?;
    Ok(())
}

/// Insert or replace many entries in one transaction
pub async fn put_many(db: &Pool<Sqlite>, entries: &[CollectionEntry]) -> Result<()> {
    if entries.is_empty() {
        return Ok(());
    }
    let mut tx = db.begin().await?;
    for entry in entries {
        put_in(&mut tx, entry).await?;
    }
    tx.commit().await?;
    Ok(())
}

async fn put_in(tx: &mut sqlx::Transaction<'_, Sqlite>, entry: &CollectionEntry) -> Result<()> {
    bind_entry(
        sqlx::query(
            "INSERT OR REPLACE INTO collection (perfume_id, added_at, owned, personal_rating, personal_notes, price_estimate, tags)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        ),
        entry,
    )?
    .execute(&mut **tx)
    .await?;
    Ok(())
}

fn bind_entry<'q>(
    query: sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    entry: &CollectionEntry,
) -> Result<sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>>> {
    let price = entry
        .price_estimate
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let tags = entry.tags.as_ref().map(serde_json::to_string).transpose()?;
    Ok(query
        .bind(entry.perfume_id.clone())
        .bind(entry.added_at)
        .bind(entry.owned)
        .bind(entry.personal_rating)
        .bind(entry.personal_notes.clone())
        .bind(price)
        .bind(tags))
}

/// Apply a partial update; returns the updated entry
pub async fn update(
    db: &Pool<Sqlite>,
    perfume_id: &str,
    changes: &CollectionUpdate,
) -> Result<CollectionEntry> {
    let mut entry = get(db, perfume_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("collection entry {}", perfume_id)))?;
    changes.apply_to(&mut entry);
    put(db, &entry).await?;
    Ok(entry)
}

/// Delete an entry; returns whether a row was removed
pub async fn remove(db: &Pool<Sqlite>, perfume_id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM collection WHERE perfume_id = ?")
        .bind(perfume_id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn count(db: &Pool<Sqlite>) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM collection")
        .fetch_one(db)
        .await?;
    Ok(count)
}
