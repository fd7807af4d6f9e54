//! Search aggregator
//!
//! Fans one query out to every available provider concurrently, waits for
//! all of them, then folds the candidates into one deduplicated list.
//!
//! # Failure isolation
//! A provider failure becomes an entry in [`SearchResult::errors`]; it never
//! cancels or corrupts another provider's results and never escapes
//! `search_all`.
//!
//! # Ordering
//! Candidates are folded in provider-priority order (the order providers
//! were registered), not arrival order. Output order is the order in which
//! identity keys were first seen during that fold.

use crate::providers::{PerfumeProvider, ProviderErrorKind};
use crate::richness::RichnessScorer;
use futures::future::join_all;
use niche_common::Perfume;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One provider failure
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderFailure {
    pub provider: String,
    pub error: String,
    pub kind: ProviderErrorKind,
}

/// Outcome class of a search, derived from the result counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SearchStatus {
    /// No provider was available to query
    Unavailable,
    /// Every queried provider failed
    Failed,
    /// Some providers failed; results may still be present
    Partial,
    NoMatches,
    Matches,
}

/// Aggregated search output
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// Query this result answers
    pub query: String,
    pub results: Vec<Perfume>,
    pub errors: Vec<ProviderFailure>,
    pub providers_queried: usize,
}

impl SearchResult {
    fn empty(query: &str) -> Self {
        Self {
            query: query.to_string(),
            results: Vec::new(),
            errors: Vec::new(),
            providers_queried: 0,
        }
    }

    pub fn status(&self) -> SearchStatus {
        if self.providers_queried == 0 {
            SearchStatus::Unavailable
        } else if self.results.is_empty() && self.errors.len() >= self.providers_queried {
            SearchStatus::Failed
        } else if !self.errors.is_empty() {
            SearchStatus::Partial
        } else if self.results.is_empty() {
            SearchStatus::NoMatches
        } else {
            SearchStatus::Matches
        }
    }
}

/// Provider name with its current availability
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderStatus {
    pub name: String,
    pub available: bool,
}

/// Multi-provider search orchestrator
pub struct SearchAggregator {
    providers: Vec<Arc<dyn PerfumeProvider>>,
    scorer: RichnessScorer,
}

impl SearchAggregator {
    /// Create an aggregator; `providers` is in priority order
    pub fn new(providers: Vec<Arc<dyn PerfumeProvider>>) -> Self {
        Self::with_scorer(providers, RichnessScorer::default())
    }

    pub fn with_scorer(providers: Vec<Arc<dyn PerfumeProvider>>, scorer: RichnessScorer) -> Self {
        Self { providers, scorer }
    }

    pub fn provider_status(&self) -> Vec<ProviderStatus> {
        self.providers
            .iter()
            .map(|p| ProviderStatus {
                name: p.name().to_string(),
                available: p.is_available(),
            })
            .collect()
    }

    /// Search every available provider and merge the results
    pub async fn search_all(&self, query: &str, limit: usize) -> SearchResult {
        let selected: Vec<&Arc<dyn PerfumeProvider>> =
            self.providers.iter().filter(|p| p.is_available()).collect();

        if selected.is_empty() {
            info!(query = %query, "No providers available");
            return SearchResult::empty(query);
        }

        let futures = selected.iter().map(|provider| async move {
            let name = provider.name();
            (name, provider.search(query, limit).await)
        });
        let outcomes = join_all(futures).await;

        let mut candidates = Vec::new();
        let mut errors = Vec::new();
        for (name, outcome) in outcomes {
            match outcome {
                Ok(records) => {
                    debug!(provider = name, count = records.len(), "Provider returned results");
                    candidates.extend(records);
                }
                Err(e) => {
                    warn!(provider = name, error = %e, "Provider search failed");
                    errors.push(ProviderFailure {
                        provider: name.to_string(),
                        error: e.to_string(),
                        kind: e.kind(),
                    });
                }
            }
        }

        let candidate_count = candidates.len();
        let results = self.merge_candidates(candidates);
        info!(
            query = %query,
            providers = selected.len(),
            candidates = candidate_count,
            results = results.len(),
            failures = errors.len(),
            "Search complete"
        );

        SearchResult {
            query: query.to_string(),
            results,
            errors,
            providers_queried: selected.len(),
        }
    }

    /// Deduplicate candidates by identity key
    ///
    /// A later candidate replaces the representative only with a strictly
    /// higher richness score. Either way the surviving record back-fills
    /// image, description and year from the other.
    pub fn merge_candidates(&self, candidates: Vec<Perfume>) -> Vec<Perfume> {
        let mut merged: Vec<(Perfume, u32)> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for mut candidate in candidates {
            let key = candidate.identity_key();
            if key.is_empty() {
                debug!(name = %candidate.name, "Skipping candidate without identity");
                continue;
            }
            candidate.id = key.clone();
            let score = self.scorer.score(&candidate);

            match index.get(&key) {
                None => {
                    index.insert(key, merged.len());
                    merged.push((candidate, score));
                }
                Some(&slot) => {
                    let (existing, existing_score) = &mut merged[slot];
                    if score > *existing_score {
                        backfill(&mut candidate, existing);
                        *existing = candidate;
                        *existing_score = score;
                    } else {
                        backfill(existing, &candidate);
                    }
                }
            }
        }

        merged.into_iter().map(|(perfume, _)| perfume).collect()
    }
}

/// Fill image, description and year on `target` from `donor` where missing
fn backfill(target: &mut Perfume, donor: &Perfume) {
    if target.image_url.is_none() {
        target.image_url = donor.image_url.clone();
    }
    if target.description.is_none() {
        target.description = donor.description.clone();
    }
    if target.year.is_none() {
        target.year = donor.year;
    }
}
