//! Bulk reference dataset table
//!
//! Read-only for search. Rows are bulk-loaded once and then scanned in
//! descending rating order through a cursor.

use crate::identity::build_key;
use crate::normalize::normalize_concentration;
use crate::Result;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};

/// Rows are inserted in transactions of this size
pub const BULK_BATCH_SIZE: usize = 5000;

/// One dataset row; list columns are comma-separated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DatasetRow {
    pub id: String,
    pub name: String,
    pub brand: String,
    /// 0 when unknown
    pub year: i64,
    pub concentration: String,
    /// 0-10
    pub rating: f64,
    pub accords: String,
    pub top_notes: String,
    pub mid_notes: String,
    pub base_notes: String,
}

impl DatasetRow {
    /// Build a row, deriving its id from brand/name/concentration
    pub fn new(name: &str, brand: &str, concentration: &str, rating: f64) -> Self {
        let canonical = normalize_concentration(Some(concentration));
        Self {
            id: build_key(brand, name, canonical.key_part()),
            name: name.to_string(),
            brand: brand.to_string(),
            year: 0,
            concentration: concentration.to_string(),
            rating,
            accords: String::new(),
            top_notes: String::new(),
            mid_notes: String::new(),
            base_notes: String::new(),
        }
    }
}

/// Insert or replace rows in batches
pub async fn bulk_put(db: &Pool<Sqlite>, rows: &[DatasetRow]) -> Result<()> {
    for batch in rows.chunks(BULK_BATCH_SIZE) {
        let mut tx = db.begin().await?;
        for row in batch {
            sqlx::query(
                "INSERT OR REPLACE INTO dataset_perfumes
                 (id, name, brand, year, concentration, rating, accords, top_notes, mid_notes, base_notes)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&row.id)
            .bind(&row.name)
            .bind(&row.brand)
            .bind(row.year)
            .bind(&row.concentration)
            .bind(row.rating)
            .bind(&row.accords)
            .bind(&row.top_notes)
            .bind(&row.mid_notes)
            .bind(&row.base_notes)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        tracing::debug!(rows = batch.len(), "Dataset batch committed");
    }
    Ok(())
}

pub async fn count(db: &Pool<Sqlite>) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM dataset_perfumes")
        .fetch_one(db)
        .await?;
    Ok(count)
}

/// Cursor over all rows, highest rating first
///
/// Rows are fetched lazily; dropping the stream ends the scan.
pub fn stream_by_rating(db: &Pool<Sqlite>) -> BoxStream<'_, std::result::Result<DatasetRow, sqlx::Error>> {
    sqlx::query_as::<_, DatasetRow>(
        "SELECT id, name, brand, year, concentration, rating, accords, top_notes, mid_notes, base_notes
         FROM dataset_perfumes
         ORDER BY rating DESC, id",
    )
    .fetch(db)
}
