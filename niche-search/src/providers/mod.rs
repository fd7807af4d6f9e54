//! Search providers
//!
//! Every upstream (bulk dataset, Fragella, FragranceFinder) implements
//! [`PerfumeProvider`] so the aggregator can fan a query out to all of them
//! uniformly. Each adapter owns its response parsing and error
//! classification; all of them produce canonical [`Perfume`] records.
//!
//! # Providers
//! 1. **dataset** - Parfumo bulk dataset stored locally (always first)
//! 2. **fragella** - Fragella REST API (richest online data)
//! 3. **fragrance_finder** - FragranceFinder via RapidAPI

pub mod dataset;
pub mod envelope;
pub mod fragella;
pub mod fragrance_finder;

pub use dataset::ParfumoProvider;
pub use fragella::FragellaProvider;
pub use fragrance_finder::FragranceFinderProvider;

use async_trait::async_trait;
use niche_common::Perfume;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Request timeout for online providers
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Uniform provider contract
#[async_trait]
pub trait PerfumeProvider: Send + Sync {
    /// Provider name used in error reports
    fn name(&self) -> &'static str;

    /// Cheap synchronous check (credential present, dataset loaded)
    ///
    /// The aggregator never calls `search` when this returns false.
    fn is_available(&self) -> bool;

    /// Search by free-text query, returning at most `limit` records
    ///
    /// An empty or degenerate upstream response is `Ok(vec![])`, not an error.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Perfume>, ProviderError>;
}

/// Provider failure classes surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProviderErrorKind {
    NotConfigured,
    RateLimited,
    Unauthorized,
    TransportOrParse,
}

/// Provider errors
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider} is not configured. Add an API key in Settings.")]
    NotConfigured { provider: &'static str },

    #[error("{provider} search limit reached. Try again later or add the perfume manually.")]
    RateLimited { provider: &'static str },

    #[error("{provider} API key was rejected. Check it in Settings.")]
    Unauthorized { provider: &'static str },

    #[error("{provider} request failed{}: {detail}", status_label(.status))]
    Transport {
        provider: &'static str,
        status: Option<u16>,
        detail: String,
    },

    #[error("{provider} returned an unreadable response: {detail}")]
    Parse { provider: &'static str, detail: String },

    #[error("{provider} dataset could not be read: {detail}")]
    Storage { provider: &'static str, detail: String },
}

fn status_label(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (HTTP {})", code),
        None => String::new(),
    }
}

impl ProviderError {
    pub fn kind(&self) -> ProviderErrorKind {
        match self {
            ProviderError::NotConfigured { .. } => ProviderErrorKind::NotConfigured,
            ProviderError::RateLimited { .. } => ProviderErrorKind::RateLimited,
            ProviderError::Unauthorized { .. } => ProviderErrorKind::Unauthorized,
            ProviderError::Transport { .. }
            | ProviderError::Parse { .. }
            | ProviderError::Storage { .. } => ProviderErrorKind::TransportOrParse,
        }
    }

    pub(crate) fn transport(provider: &'static str, err: reqwest::Error) -> Self {
        ProviderError::Transport {
            provider,
            status: err.status().map(|s| s.as_u16()),
            detail: err.to_string(),
        }
    }
}

/// Map a non-success HTTP status to a provider error
///
/// 429 is a rate limit; any status in `unauthorized` is a credential
/// failure; everything else is a transport failure carrying the status.
pub(crate) fn classify_status(
    provider: &'static str,
    status: u16,
    body: &str,
    unauthorized: &[u16],
) -> ProviderError {
    if status == 429 {
        return ProviderError::RateLimited { provider };
    }
    if unauthorized.contains(&status) {
        return ProviderError::Unauthorized { provider };
    }
    let mut detail: String = body.chars().take(200).collect();
    if detail.trim().is_empty() {
        detail = "no response body".to_string();
    }
    ProviderError::Transport {
        provider,
        status: Some(status),
        detail,
    }
}

/// A JSON value providers send either as a number or as text
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum NumberOrText {
    Number(f64),
    Text(String),
}

impl NumberOrText {
    /// Numeric value; text is parsed leniently ("4.3", " 2012 ")
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            NumberOrText::Number(n) if n.is_finite() => Some(*n),
            NumberOrText::Number(_) => None,
            NumberOrText::Text(t) => t.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        }
    }

    /// Text form; whole numbers render without a fraction
    pub fn as_text(&self) -> String {
        match self {
            NumberOrText::Number(n) if n.fract() == 0.0 => format!("{}", *n as i64),
            NumberOrText::Number(n) => n.to_string(),
            NumberOrText::Text(t) => t.trim().to_string(),
        }
    }

    /// Positive year, if any
    pub fn as_year(&self) -> Option<i32> {
        self.as_f64()
            .map(|y| y.round() as i64)
            .filter(|y| (1..=9999).contains(y))
            .map(|y| y as i32)
    }
}

// ============================================================================
// Mock Provider for Testing
// ============================================================================
