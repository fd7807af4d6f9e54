//! FragranceFinder provider
//!
//! Queries the FragranceFinder API through RapidAPI. Coverage is broad but
//! shallow: no accords or rankings, so records keep neutral defaults for
//! those fields.
//!
//! # API Reference
//! - Endpoint: `GET {base}/perfumes/search?keyword={query}&perPage={n}`
//! - Auth: `X-RapidAPI-Key` / `X-RapidAPI-Host` headers

use super::envelope::{decode_items, lenient, lenient_list, EnvelopeKey, ResponseEnvelope};
use super::{classify_status, NumberOrText, PerfumeProvider, ProviderError, REQUEST_TIMEOUT};
use crate::config::ApiCredential;
use async_trait::async_trait;
use niche_common::normalize::{normalize_concentration, normalize_gender, normalize_rating, split_list};
use niche_common::{DataSource, FragranceNote, NotePyramid, Perfume};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

/// FragranceFinder API base URL
pub const FRAGRANCEFINDER_BASE_URL: &str = "https://fragrancefinder-api.p.rapidapi.com";

/// RapidAPI host header value
const RAPIDAPI_HOST: &str = "fragrancefinder-api.p.rapidapi.com";

/// Image CDN pattern for `imageId`
const IMAGE_CDN_PREFIX: &str = "https://fimgs.net/mdimg/perfume/375x500.";

const NAME: &str = "FragranceFinder";
const ENVELOPE_KEYS: &[EnvelopeKey] = &[EnvelopeKey::Results, EnvelopeKey::Hits, EnvelopeKey::Data];
const UNAUTHORIZED_STATUSES: &[u16] = &[401, 403];

/// FragranceFinder search provider
pub struct FragranceFinderProvider {
    http_client: Client,
    base_url: String,
    credential: ApiCredential,
}

impl FragranceFinderProvider {
    pub fn new(credential: ApiCredential) -> Result<Self, ProviderError> {
        Self::with_base_url(credential, FRAGRANCEFINDER_BASE_URL)
    }

    pub fn with_base_url(
        credential: ApiCredential,
        base_url: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let http_client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::transport(NAME, e))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credential,
        })
    }
}

#[async_trait]
impl PerfumeProvider for FragranceFinderProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    fn is_available(&self) -> bool {
        self.credential.is_set()
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Perfume>, ProviderError> {
        let api_key = self
            .credential
            .get()
            .ok_or(ProviderError::NotConfigured { provider: NAME })?;

        let url = format!("{}/perfumes/search", self.base_url);
        let per_page = limit.to_string();
        debug!(query = %query, limit, "Querying FragranceFinder");

        let response = self
            .http_client
            .get(&url)
            .header("X-RapidAPI-Key", api_key)
            .header("X-RapidAPI-Host", RAPIDAPI_HOST)
            .query(&[("keyword", query), ("perPage", per_page.as_str())])
            .send()
            .await
            .map_err(|e| ProviderError::transport(NAME, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::transport(NAME, e))?;

        if !status.is_success() {
            let err = classify_status(NAME, status.as_u16(), &body, UNAUTHORIZED_STATUSES);
            warn!(status = status.as_u16(), error = %err, "FragranceFinder request failed");
            return Err(err);
        }

        let json: serde_json::Value = serde_json::from_str(&body).map_err(|e| ProviderError::Parse {
            provider: NAME,
            detail: e.to_string(),
        })?;

        let items = ResponseEnvelope::parse(json, ENVELOPE_KEYS).into_items();
        let perfumes: Vec<Perfume> = decode_items::<FfFragrance>(NAME, items)
            .into_iter()
            .filter_map(FfFragrance::into_perfume)
            .take(limit)
            .collect();

        debug!(count = perfumes.len(), "FragranceFinder returned results");
        Ok(perfumes)
    }
}

// ============================================================================
// Wire format
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FfFragrance {
    #[serde(rename = "objectID", deserialize_with = "lenient")]
    object_id: Option<NumberOrText>,
    #[serde(deserialize_with = "lenient")]
    name: Option<String>,
    #[serde(deserialize_with = "lenient")]
    brand: Option<String>,
    #[serde(deserialize_with = "lenient")]
    description: Option<String>,
    #[serde(deserialize_with = "lenient")]
    image: Option<String>,
    #[serde(rename = "imageId", deserialize_with = "lenient")]
    image_id: Option<NumberOrText>,
    #[serde(deserialize_with = "lenient")]
    concentration: Option<String>,
    #[serde(deserialize_with = "lenient")]
    gender: Option<String>,
    #[serde(deserialize_with = "lenient")]
    notes: Option<FfNotes>,
    #[serde(deserialize_with = "lenient_list")]
    scent_notes: Vec<String>,
    #[serde(deserialize_with = "lenient")]
    rating: Option<NumberOrText>,
    #[serde(deserialize_with = "lenient")]
    year: Option<NumberOrText>,
    #[serde(deserialize_with = "lenient")]
    url: Option<String>,
}

/// The notes field comes in three shapes
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FfNotes {
    List(Vec<String>),
    Flat(String),
    Structured {
        #[serde(default, deserialize_with = "lenient_list")]
        top: Vec<String>,
        #[serde(default, deserialize_with = "lenient_list")]
        middle: Vec<String>,
        #[serde(default, deserialize_with = "lenient_list")]
        base: Vec<String>,
    },
}

fn named_notes(names: Vec<String>) -> Vec<FragranceNote> {
    names
        .into_iter()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .map(FragranceNote::named)
        .collect()
}

impl FfFragrance {
    fn pyramid(notes: Option<FfNotes>, scent_notes: Vec<String>) -> NotePyramid {
        let scent_notes = Some(scent_notes).filter(|n| !n.is_empty());
        let flat = match notes {
            Some(FfNotes::Structured { top, middle, base }) => {
                return NotePyramid {
                    top: named_notes(top),
                    middle: named_notes(middle),
                    base: named_notes(base),
                }
            }
            Some(FfNotes::List(list)) => list,
            Some(FfNotes::Flat(text)) => scent_notes.unwrap_or_else(|| split_list(&text)),
            None => scent_notes.unwrap_or_default(),
        };
        NotePyramid {
            top: named_notes(flat),
            middle: Vec::new(),
            base: Vec::new(),
        }
    }

    fn image_url(image: Option<String>, image_id: Option<&NumberOrText>) -> Option<String> {
        if let Some(image) = image.filter(|i| i.starts_with("http")) {
            return Some(image);
        }
        image_id
            .map(NumberOrText::as_text)
            .filter(|id| !id.is_empty())
            .map(|id| format!("{}{}.jpg", IMAGE_CDN_PREFIX, id))
    }

    fn into_perfume(self) -> Option<Perfume> {
        let name = self.name.as_deref().map(str::trim).filter(|n| !n.is_empty())?;
        let brand = self
            .brand
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .unwrap_or("Unknown");

        let concentration = normalize_concentration(self.concentration.as_deref());
        let mut perfume = Perfume::new(brand, name, concentration, DataSource::FragranceFinder);

        perfume.year = self.year.as_ref().and_then(NumberOrText::as_year);
        perfume.gender = normalize_gender(self.gender.as_deref());
        perfume.rating = normalize_rating(self.rating.as_ref().and_then(NumberOrText::as_f64));
        perfume.image_url = Self::image_url(self.image, self.image_id.as_ref());
        perfume.notes = Self::pyramid(self.notes, self.scent_notes);
        perfume.description = self.description.filter(|d| !d.trim().is_empty());
        perfume.source_url = self.url.filter(|u| !u.trim().is_empty());

        if let Some(object_id) = &self.object_id {
            debug!(object_id = %object_id.as_text(), id = %perfume.id, "Mapped FragranceFinder item");
        }
        Some(perfume)
    }
}
