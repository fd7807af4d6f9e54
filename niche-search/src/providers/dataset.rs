//! Bulk dataset provider (Parfumo)
//!
//! Reads the locally stored reference dataset. Rows are scanned through a
//! database cursor in descending rating order and the scan stops as soon as
//! `limit` rows matched, so a query never loads the whole table.

use super::{PerfumeProvider, ProviderError};
use async_trait::async_trait;
use futures::TryStreamExt;
use niche_common::db::dataset::{self, DatasetRow};
use niche_common::db::settings;
use niche_common::normalize::{gender_from_title, normalize_concentration, split_list};
use niche_common::{AccordStrength, DataSource, FragranceNote, NotePyramid, Perfume};
use sqlx::{Pool, Sqlite};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// Dataset version this build expects in the settings table
pub const CURRENT_DATASET_VERSION: u32 = 1;

const NAME: &str = "Parfumo";

/// Local dataset search provider
pub struct ParfumoProvider {
    db: Pool<Sqlite>,
    loaded: AtomicBool,
}

impl ParfumoProvider {
    /// Create the provider; availability starts false until refreshed
    pub fn new(db: Pool<Sqlite>) -> Self {
        Self {
            db,
            loaded: AtomicBool::new(false),
        }
    }

    /// Create the provider and read its availability marker
    pub async fn open(db: Pool<Sqlite>) -> niche_common::Result<Self> {
        let provider = Self::new(db);
        provider.refresh_availability().await?;
        Ok(provider)
    }

    /// Re-read the dataset version marker into the cached flag
    pub async fn refresh_availability(&self) -> niche_common::Result<bool> {
        let version = settings::get_dataset_version(&self.db).await?;
        let loaded = version == Some(CURRENT_DATASET_VERSION);
        self.loaded.store(loaded, Ordering::Release);
        info!(?version, loaded, "Dataset availability refreshed");
        Ok(loaded)
    }
}

#[async_trait]
impl PerfumeProvider for ParfumoProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    fn is_available(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Perfume>, ProviderError> {
        let lowered = query.to_lowercase();
        let terms: Vec<&str> = lowered.split_whitespace().collect();
        if terms.is_empty() || limit == 0 || !self.is_available() {
            return Ok(Vec::new());
        }

        let mut matches = Vec::new();
        let mut scanned = 0usize;
        let mut rows = dataset::stream_by_rating(&self.db);

        while let Some(row) = rows.try_next().await.map_err(|e| ProviderError::Storage {
            provider: NAME,
            detail: e.to_string(),
        })? {
            scanned += 1;
            if row_matches(&row, &terms) {
                matches.push(row_to_perfume(&row));
                if matches.len() >= limit {
                    break;
                }
            }
        }

        debug!(query = %query, scanned, matched = matches.len(), "Dataset scan finished");
        Ok(matches)
    }
}

/// Every term must appear in "name brand"
fn row_matches(row: &DatasetRow, terms: &[&str]) -> bool {
    let searchable = format!("{} {}", row.name, row.brand).to_lowercase();
    terms.iter().all(|term| searchable.contains(term))
}

/// Positional accord strengths: first ~80, last ~20
fn positional_accords(raw: &str) -> Vec<AccordStrength> {
    let names = split_list(raw);
    let len = names.len() as f64;
    names
        .into_iter()
        .enumerate()
        .map(|(i, name)| AccordStrength {
            name,
            percentage: (80.0 - (i as f64 / len) * 60.0).round() as u8,
        })
        .collect()
}

fn notes(raw: &str) -> Vec<FragranceNote> {
    split_list(raw).into_iter().map(FragranceNote::named).collect()
}

fn row_to_perfume(row: &DatasetRow) -> Perfume {
    let concentration = normalize_concentration(Some(&row.concentration));
    let mut perfume = Perfume::new(&row.brand, &row.name, concentration, DataSource::Parfumo);

    perfume.year = (row.year > 0).then_some(row.year as i32);
    perfume.gender = gender_from_title(&row.name, &row.brand);
    perfume.rating = if row.rating.is_finite() {
        (row.rating / 2.0).clamp(0.0, 5.0)
    } else {
        0.0
    };
    perfume.notes = NotePyramid {
        top: notes(&row.top_notes),
        middle: notes(&row.mid_notes),
        base: notes(&row.base_notes),
    };
    perfume.accords = positional_accords(&row.accords);
    perfume
}
