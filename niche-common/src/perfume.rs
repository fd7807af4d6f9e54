//! Canonical perfume record and collection overlay types
//!
//! Every provider maps its upstream schema onto [`Perfume`]. The JSON shape
//! (camelCase field names) is the contract shared with the UI and the remote
//! sync collaborator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::build_key;
use crate::normalize::{default_occasion_scores, default_season_scores};

/// Default longevity/sillage on the 0-10 scale
pub const DEFAULT_PERFORMANCE: u8 = 5;

/// Neutral season/occasion affinity on the 0-100 scale
pub const NEUTRAL_AFFINITY: u8 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Masculine,
    Feminine,
    Unisex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Concentration {
    #[serde(rename = "EDT")]
    Edt,
    #[serde(rename = "EDP")]
    Edp,
    Extrait,
    Parfum,
    #[serde(rename = "EDC")]
    Edc,
    Other,
}

impl Concentration {
    pub fn as_str(&self) -> &'static str {
        match self {
            Concentration::Edt => "EDT",
            Concentration::Edp => "EDP",
            Concentration::Extrait => "Extrait",
            Concentration::Parfum => "Parfum",
            Concentration::Edc => "EDC",
            Concentration::Other => "Other",
        }
    }

    /// Label used as the third identity key part (`Other` contributes nothing)
    pub fn key_part(&self) -> Option<&'static str> {
        match self {
            Concentration::Other => None,
            other => Some(other.as_str()),
        }
    }
}

impl std::fmt::Display for Concentration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Spring,
    Summer,
    Fall,
    Winter,
}

impl Season {
    /// All seasons in canonical order
    pub const ALL: [Season; 4] = [Season::Spring, Season::Summer, Season::Fall, Season::Winter];

    /// Parse a provider label ("Autumn" is accepted for fall)
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "spring" => Some(Season::Spring),
            "summer" => Some(Season::Summer),
            "fall" | "autumn" => Some(Season::Fall),
            "winter" => Some(Season::Winter),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Occasion {
    Professional,
    Casual,
    NightOut,
    Date,
    Special,
}

impl Occasion {
    /// All occasions in canonical order
    pub const ALL: [Occasion; 5] = [
        Occasion::Professional,
        Occasion::Casual,
        Occasion::NightOut,
        Occasion::Date,
        Occasion::Special,
    ];

    /// Parse a provider label; separators and case are ignored ("Night Out", "night_out")
    pub fn from_label(label: &str) -> Option<Self> {
        let compact: String = label
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        match compact.as_str() {
            "professional" | "business" | "work" | "office" => Some(Occasion::Professional),
            "casual" | "daily" | "leisure" => Some(Occasion::Casual),
            "nightout" | "night" | "evening" => Some(Occasion::NightOut),
            "date" => Some(Occasion::Date),
            "special" => Some(Occasion::Special),
            _ => None,
        }
    }
}

/// Provenance tag for a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Parfumo,
    Fragella,
    FragranceFinder,
    Manual,
    Seed,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::Parfumo => "parfumo",
            DataSource::Fragella => "fragella",
            DataSource::FragranceFinder => "fragrancefinder",
            DataSource::Manual => "manual",
            DataSource::Seed => "seed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FragranceNote {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl FragranceNote {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image_url: None,
        }
    }
}

/// Top/middle/base note lists, each in provider order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotePyramid {
    #[serde(default)]
    pub top: Vec<FragranceNote>,
    #[serde(default)]
    pub middle: Vec<FragranceNote>,
    #[serde(default)]
    pub base: Vec<FragranceNote>,
}

impl NotePyramid {
    pub fn is_empty(&self) -> bool {
        self.top.is_empty() && self.middle.is_empty() && self.base.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccordStrength {
    pub name: String,
    /// 0-100
    pub percentage: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonScore {
    pub season: Season,
    /// 0-100
    pub score: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccasionScore {
    pub occasion: Occasion,
    /// 0-100
    pub score: u8,
}

/// Canonical perfume record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Perfume {
    /// Identity key, always `build_key(brand, name, concentration)`
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub brand: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    pub gender: Gender,
    pub concentration: Concentration,
    /// 0-5
    #[serde(default)]
    pub rating: f64,
    /// 0-10
    #[serde(default = "default_performance")]
    pub longevity: u8,
    /// 0-10
    #[serde(default = "default_performance")]
    pub sillage: u8,
    #[serde(default)]
    pub notes: NotePyramid,
    #[serde(default)]
    pub accords: Vec<AccordStrength>,
    #[serde(default = "default_season_scores")]
    pub season_scores: Vec<SeasonScore>,
    #[serde(default = "default_occasion_scores")]
    pub occasion_scores: Vec<OccasionScore>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    pub data_source: DataSource,
}

fn default_performance() -> u8 {
    DEFAULT_PERFORMANCE
}

impl Perfume {
    /// Create a record with every optional signal at its default
    pub fn new(
        brand: impl Into<String>,
        name: impl Into<String>,
        concentration: Concentration,
        data_source: DataSource,
    ) -> Self {
        let mut perfume = Self {
            id: String::new(),
            name: name.into(),
            brand: brand.into(),
            year: None,
            gender: Gender::Unisex,
            concentration,
            rating: 0.0,
            longevity: DEFAULT_PERFORMANCE,
            sillage: DEFAULT_PERFORMANCE,
            notes: NotePyramid::default(),
            accords: Vec::new(),
            season_scores: default_season_scores(),
            occasion_scores: default_occasion_scores(),
            image_url: None,
            description: None,
            source_url: None,
            data_source,
        };
        perfume.refresh_id();
        perfume
    }

    /// Identity key derived from (brand, name, concentration)
    ///
    /// Empty when brand and name carry no usable characters.
    pub fn identity_key(&self) -> String {
        if build_key(&self.brand, &self.name, None).is_empty() {
            return String::new();
        }
        build_key(&self.brand, &self.name, self.concentration.key_part())
    }

    /// Re-derive `id` after brand/name/concentration were edited
    pub fn refresh_id(&mut self) {
        self.id = self.identity_key();
    }

    pub fn season_score(&self, season: Season) -> u8 {
        self.season_scores
            .iter()
            .find(|s| s.season == season)
            .map(|s| s.score)
            .unwrap_or(0)
    }

    pub fn occasion_score(&self, occasion: Occasion) -> u8 {
        self.occasion_scores
            .iter()
            .find(|o| o.occasion == occasion)
            .map(|o| o.score)
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceConfidence {
    Exact,
    Estimate,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceEstimate {
    #[serde(rename = "amountUYU")]
    pub amount_uyu: u32,
    pub source: String,
    pub last_updated: String,
    pub confidence: PriceConfidence,
}

/// User-owned overlay keyed by perfume id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionEntry {
    pub perfume_id: String,
    pub added_at: DateTime<Utc>,
    /// true = collection, false = wishlist
    pub owned: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personal_rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personal_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_estimate: Option<PriceEstimate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl CollectionEntry {
    pub fn new(perfume_id: impl Into<String>, owned: bool) -> Self {
        Self {
            perfume_id: perfume_id.into(),
            added_at: Utc::now(),
            owned,
            personal_rating: None,
            personal_notes: None,
            price_estimate: None,
            tags: None,
        }
    }
}
