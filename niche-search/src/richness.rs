//! Richness scorer
//!
//! Additive point rule over the presence of non-default fields. Used only to
//! pick the representative among duplicate candidates. The score is a pure
//! function of the record, so merges are reproducible.

use niche_common::perfume::{DEFAULT_PERFORMANCE, NEUTRAL_AFFINITY};
use niche_common::Perfume;

/// Points awarded per signal
#[derive(Debug, Clone)]
pub struct RichnessWeights {
    pub rating: u32,
    pub longevity: u32,
    pub sillage: u32,
    pub top_notes: u32,
    pub middle_notes: u32,
    pub base_notes: u32,
    pub accords: u32,
    pub season_signal: u32,
    pub occasion_signal: u32,
    pub image: u32,
    pub year: u32,
    pub description: u32,
}

impl Default for RichnessWeights {
    fn default() -> Self {
        Self {
            rating: 2,
            longevity: 1,
            sillage: 1,
            top_notes: 2,
            middle_notes: 2,
            base_notes: 2,
            accords: 3,
            season_signal: 2,
            occasion_signal: 2,
            image: 1,
            year: 1,
            description: 1,
        }
    }
}

/// Scores how much real data a record carries
#[derive(Debug, Clone, Default)]
pub struct RichnessScorer {
    weights: RichnessWeights,
}

impl RichnessScorer {
    pub fn new(weights: RichnessWeights) -> Self {
        Self { weights }
    }

    pub fn score(&self, perfume: &Perfume) -> u32 {
        let w = &self.weights;
        let mut total = 0;

        if perfume.rating > 0.0 {
            total += w.rating;
        }
        if perfume.longevity != DEFAULT_PERFORMANCE {
            total += w.longevity;
        }
        if perfume.sillage != DEFAULT_PERFORMANCE {
            total += w.sillage;
        }
        if !perfume.notes.top.is_empty() {
            total += w.top_notes;
        }
        if !perfume.notes.middle.is_empty() {
            total += w.middle_notes;
        }
        if !perfume.notes.base.is_empty() {
            total += w.base_notes;
        }
        if !perfume.accords.is_empty() {
            total += w.accords;
        }
        // Neutral scores are what normalizers fill in when a provider is silent
        if perfume.season_scores.iter().any(|s| s.score != NEUTRAL_AFFINITY) {
            total += w.season_signal;
        }
        if perfume.occasion_scores.iter().any(|o| o.score != NEUTRAL_AFFINITY) {
            total += w.occasion_signal;
        }
        if perfume.image_url.is_some() {
            total += w.image;
        }
        if perfume.year.is_some() {
            total += w.year;
        }
        if perfume.description.is_some() {
            total += w.description;
        }

        total
    }
}
