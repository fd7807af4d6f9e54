//! Fragella provider
//!
//! Queries the Fragella REST API, the richest online source (accord
//! strengths, season and occasion rankings, note images).
//!
//! # API Reference
//! - Endpoint: `GET {base}/fragrances?search={query}&limit={n}`
//! - Auth: `x-api-key` header
//! - Response: bare array, or an object with the list under `results` or `data`

use super::envelope::{decode_items, lenient, lenient_list, lenient_map, EnvelopeKey, ResponseEnvelope};
use super::{classify_status, NumberOrText, PerfumeProvider, ProviderError, REQUEST_TIMEOUT};
use crate::config::ApiCredential;
use async_trait::async_trait;
use niche_common::normalize::{
    normalize_accord_strength, normalize_concentration, normalize_gender, normalize_performance,
    normalize_rating, occasion_scores_from, season_scores_from, AccordLevel,
};
use niche_common::{AccordStrength, DataSource, FragranceNote, NotePyramid, Perfume};
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Fragella API base URL
pub const FRAGELLA_BASE_URL: &str = "https://api.fragella.com/api/v1";

const NAME: &str = "Fragella";
const ENVELOPE_KEYS: &[EnvelopeKey] = &[EnvelopeKey::Results, EnvelopeKey::Data];
const UNAUTHORIZED_STATUSES: &[u16] = &[401];

/// Fragella search provider
pub struct FragellaProvider {
    http_client: Client,
    base_url: String,
    credential: ApiCredential,
}

impl FragellaProvider {
    pub fn new(credential: ApiCredential) -> Result<Self, ProviderError> {
        Self::with_base_url(credential, FRAGELLA_BASE_URL)
    }

    /// Create a provider against a custom base URL (proxies, tests)
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
impl PerfumeProvider for FragellaProvider {
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

        let url = format!("{}/fragrances", self.base_url);
        let limit_param = limit.to_string();
        debug!(query = %query, limit, "Querying Fragella");

        let response = self
            .http_client
            .get(&url)
            .header("x-api-key", api_key)
            .query(&[("search", query), ("limit", limit_param.as_str())])
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
            warn!(status = status.as_u16(), error = %err, "Fragella request failed");
            return Err(err);
        }

        let json: serde_json::Value = serde_json::from_str(&body).map_err(|e| ProviderError::Parse {
            provider: NAME,
            detail: e.to_string(),
        })?;

        let items = ResponseEnvelope::parse(json, ENVELOPE_KEYS).into_items();
        let perfumes: Vec<Perfume> = decode_items::<FragellaFragrance>(NAME, items)
            .into_iter()
            .filter_map(FragellaFragrance::into_perfume)
            .take(limit)
            .collect();

        debug!(count = perfumes.len(), "Fragella returned results");
        Ok(perfumes)
    }
}

// ============================================================================
// Wire format
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FragellaFragrance {
    #[serde(rename = "Name", deserialize_with = "lenient")]
    name: Option<String>,
    #[serde(rename = "Brand", deserialize_with = "lenient")]
    brand: Option<String>,
    #[serde(rename = "Year", deserialize_with = "lenient")]
    year: Option<NumberOrText>,
    #[serde(rename = "Gender", deserialize_with = "lenient")]
    gender: Option<String>,
    #[serde(rename = "OilType", deserialize_with = "lenient")]
    oil_type: Option<String>,
    #[serde(rename = "rating", alias = "Rating", deserialize_with = "lenient")]
    rating: Option<NumberOrText>,
    #[serde(rename = "Longevity", deserialize_with = "lenient")]
    longevity: Option<NumberOrText>,
    #[serde(rename = "Sillage", deserialize_with = "lenient")]
    sillage: Option<NumberOrText>,
    #[serde(rename = "Notes", deserialize_with = "lenient")]
    notes: Option<FragellaNotes>,
    #[serde(rename = "Main Accords", alias = "MainAccords", deserialize_with = "lenient_list")]
    main_accords: Vec<AccordEntry>,
    #[serde(
        rename = "Main Accords Percentage",
        alias = "MainAccordsPercentage",
        deserialize_with = "lenient_map"
    )]
    main_accords_percentage: BTreeMap<String, NumberOrText>,
    #[serde(rename = "Season Ranking", alias = "SeasonRanking", deserialize_with = "lenient_list")]
    season_ranking: Vec<RankEntry>,
    #[serde(rename = "Occasion Ranking", alias = "OccasionRanking", deserialize_with = "lenient_list")]
    occasion_ranking: Vec<RankEntry>,
    #[serde(rename = "Image URL", alias = "ImageURL", alias = "ImageUrl", deserialize_with = "lenient")]
    image_url: Option<String>,
    #[serde(rename = "Description", deserialize_with = "lenient")]
    description: Option<String>,
    #[serde(rename = "Purchase URL", alias = "URL", deserialize_with = "lenient")]
    url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FragellaNotes {
    #[serde(rename = "Top", alias = "top", deserialize_with = "lenient_list")]
    top: Vec<NoteEntry>,
    #[serde(rename = "Middle", alias = "middle", alias = "Heart", deserialize_with = "lenient_list")]
    middle: Vec<NoteEntry>,
    #[serde(rename = "Base", alias = "base", deserialize_with = "lenient_list")]
    base: Vec<NoteEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NoteEntry {
    Name(String),
    Detailed {
        name: String,
        #[serde(default, rename = "imageUrl", alias = "image_url", deserialize_with = "lenient")]
        image_url: Option<String>,
    },
}

impl NoteEntry {
    fn into_note(self) -> Option<FragranceNote> {
        let (name, image_url) = match self {
            NoteEntry::Name(name) => (name, None),
            NoteEntry::Detailed { name, image_url } => (name, image_url),
        };
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        Some(FragranceNote {
            name: name.to_string(),
            image_url: image_url.filter(|u| !u.trim().is_empty()),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AccordEntry {
    Name(String),
    Detailed {
        name: String,
        #[serde(default, deserialize_with = "lenient")]
        level: Option<String>,
        #[serde(default, deserialize_with = "lenient")]
        percentage: Option<NumberOrText>,
    },
}

#[derive(Debug, Deserialize)]
struct RankEntry {
    #[serde(alias = "season", alias = "occasion")]
    name: String,
    #[serde(default, deserialize_with = "lenient")]
    score: Option<NumberOrText>,
}

fn convert_notes(entries: Vec<NoteEntry>) -> Vec<FragranceNote> {
    entries.into_iter().filter_map(NoteEntry::into_note).collect()
}

/// Usable (name, score) pairs; entries without a numeric score are ignored
fn convert_rankings(entries: &[RankEntry]) -> Vec<(&str, f64)> {
    entries
        .iter()
        .filter_map(|r| {
            r.score
                .as_ref()
                .and_then(NumberOrText::as_f64)
                .map(|score| (r.name.as_str(), score))
        })
        .collect()
}

impl FragellaFragrance {
    /// Convert into a canonical record; items without a name are dropped
    fn into_perfume(self) -> Option<Perfume> {
        let name = self.name.as_deref().map(str::trim).filter(|n| !n.is_empty())?;
        let brand = self
            .brand
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .unwrap_or("Unknown");

        let concentration = normalize_concentration(self.oil_type.as_deref());
        let mut perfume = Perfume::new(brand, name, concentration, DataSource::Fragella);

        perfume.year = self.year.as_ref().and_then(NumberOrText::as_year);
        perfume.gender = normalize_gender(self.gender.as_deref());
        perfume.rating = normalize_rating(self.rating.as_ref().and_then(NumberOrText::as_f64));
        perfume.longevity =
            normalize_performance(self.longevity.as_ref().and_then(NumberOrText::as_f64));
        perfume.sillage = normalize_performance(self.sillage.as_ref().and_then(NumberOrText::as_f64));

        if let Some(notes) = self.notes {
            perfume.notes = NotePyramid {
                top: convert_notes(notes.top),
                middle: convert_notes(notes.middle),
                base: convert_notes(notes.base),
            };
        }

        perfume.accords = convert_accords(self.main_accords, self.main_accords_percentage);

        perfume.season_scores = season_scores_from(convert_rankings(&self.season_ranking));
        perfume.occasion_scores = occasion_scores_from(convert_rankings(&self.occasion_ranking));

        perfume.image_url = self.image_url.filter(|u| !u.trim().is_empty());
        perfume.description = self.description.filter(|d| !d.trim().is_empty());
        perfume.source_url = self.url.filter(|u| !u.trim().is_empty());
        Some(perfume)
    }
}

/// Accord list with strengths
///
/// An explicit percentage map wins; otherwise each listed accord's level or
/// percentage is normalized.
fn convert_accords(
    listed: Vec<AccordEntry>,
    percentages: BTreeMap<String, NumberOrText>,
) -> Vec<AccordStrength> {
    if !percentages.is_empty() {
        return percentages
            .into_iter()
            .filter(|(name, _)| !name.trim().is_empty())
            .map(|(name, level)| {
                let percentage = match &level {
                    NumberOrText::Number(n) => normalize_accord_strength(AccordLevel::Percentage(*n)),
                    NumberOrText::Text(t) => normalize_accord_strength(AccordLevel::Label(t)),
                };
                AccordStrength {
                    name: name.trim().to_string(),
                    percentage,
                }
            })
            .collect();
    }

    listed
        .into_iter()
        .filter_map(|entry| {
            let (name, percentage) = match entry {
                AccordEntry::Name(name) => (name, normalize_accord_strength(AccordLevel::Label(""))),
                AccordEntry::Detailed {
                    name,
                    level,
                    percentage,
                } => {
                    let strength = match (percentage.as_ref().and_then(NumberOrText::as_f64), level) {
                        (Some(pct), _) => normalize_accord_strength(AccordLevel::Percentage(pct)),
                        (None, Some(level)) => normalize_accord_strength(AccordLevel::Label(&level)),
                        (None, None) => normalize_accord_strength(AccordLevel::Label("")),
                    };
                    (name, strength)
                }
            };
            let name = name.trim();
            (!name.is_empty()).then(|| AccordStrength {
                name: name.to_string(),
                percentage,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use niche_common::{Concentration, Gender, Occasion, Season};
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer, key: Option<&str>) -> FragellaProvider {
        FragellaProvider::with_base_url(ApiCredential::new(key.map(str::to_string)), server.uri())
            .unwrap()
    }

    fn sauvage() -> serde_json::Value {
        json!({
            "Name": "Sauvage",
            "Brand": "Dior",
            "Year": "2015",
            "Gender": "men",
            "OilType": "Eau de Toilette",
            "rating": "4.1",
            "Longevity": 8,
            "Sillage": 7.6,
            "Notes": {
                "Top": [{"name": "Bergamot", "imageUrl": "https://img/bergamot.jpg"}],
                "Middle": ["Pepper", ""],
                "Base": [{"name": "Ambroxan"}]
            },
            "Main Accords": ["fresh spicy", "amber"],
            "Main Accords Percentage": {"fresh spicy": "Dominant", "amber": "Moderate"},
            "Season Ranking": [{"name": "summer", "score": 8.5}, {"name": "winter", "score": 3}],
            "Occasion Ranking": [{"name": "night out", "score": 6}],
            "Image URL": "https://img/sauvage.jpg"
        })
    }

    #[test]
    fn test_normalizes_full_record() {
        let raw: FragellaFragrance = serde_json::from_value(sauvage()).unwrap();
        let perfume = raw.into_perfume().unwrap();

        assert_eq!(perfume.id, "dior-sauvage-edt");
        assert_eq!(perfume.concentration, Concentration::Edt);
        assert_eq!(perfume.gender, Gender::Masculine);
        assert_eq!(perfume.year, Some(2015));
        assert_eq!(perfume.rating, 4.1);
        assert_eq!(perfume.longevity, 8);
        assert_eq!(perfume.sillage, 8);
        assert_eq!(perfume.notes.top[0].image_url.as_deref(), Some("https://img/bergamot.jpg"));
        assert_eq!(perfume.notes.middle.len(), 1);
        assert_eq!(perfume.season_score(Season::Summer), 85);
        assert_eq!(perfume.season_score(Season::Winter), 30);
        assert_eq!(perfume.season_score(Season::Spring), 50);
        assert_eq!(perfume.occasion_score(Occasion::NightOut), 60);
        assert_eq!(perfume.data_source, DataSource::Fragella);

        let fresh = perfume.accords.iter().find(|a| a.name == "fresh spicy").unwrap();
        assert_eq!(fresh.percentage, 85);
    }

    #[test]
    fn test_nameless_item_dropped() {
        let raw: FragellaFragrance = serde_json::from_value(json!({"Brand": "Dior"})).unwrap();
        assert!(raw.into_perfume().is_none());
    }

    #[test]
    fn test_listed_accords_without_percentages() {
        let raw: FragellaFragrance = serde_json::from_value(json!({
            "Name": "X",
            "Main Accords": [{"name": "woody", "level": "Prominent"}, "citrus"]
        }))
        .unwrap();
        let perfume = raw.into_perfume().unwrap();
        assert_eq!(perfume.brand, "Unknown");
        assert_eq!(perfume.accords[0].percentage, 65);
        assert_eq!(perfume.accords[1].percentage, 30);
    }

    fn decode_one(item: serde_json::Value) -> Perfume {
        let decoded = decode_items::<FragellaFragrance>(NAME, vec![item]);
        assert_eq!(decoded.len(), 1, "item should survive decoding");
        decoded.into_iter().next().unwrap().into_perfume().unwrap()
    }

    #[test]
    fn test_null_note_tier_keeps_record() {
        let perfume = decode_one(json!({
            "Name": "Sauvage",
            "Brand": "Dior",
            "Notes": {"Top": null, "Base": ["Ambroxan"]}
        }));
        assert!(perfume.notes.top.is_empty());
        assert_eq!(perfume.notes.base[0].name, "Ambroxan");
    }

    #[test]
    fn test_note_without_name_is_skipped() {
        let perfume = decode_one(json!({
            "Name": "Sauvage",
            "Notes": {"Top": [{"imageUrl": "https://img/x.jpg"}, "Bergamot"]}
        }));
        let names: Vec<_> = perfume.notes.top.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["Bergamot"]);
    }

    #[test]
    fn test_null_ranking_score_is_ignored() {
        let perfume = decode_one(json!({
            "Name": "Sauvage",
            "Season Ranking": [{"name": "summer", "score": null}, {"name": "winter", "score": 4}],
            "Occasion Ranking": "n/a"
        }));
        assert_eq!(perfume.season_score(Season::Summer), 50);
        assert_eq!(perfume.season_score(Season::Winter), 40);
        assert_eq!(perfume.occasion_scores.len(), 5);
    }

    #[test]
    fn test_malformed_scalars_fall_back() {
        let perfume = decode_one(json!({
            "Name": "Sauvage",
            "Brand": 42,
            "Year": {"value": 2015},
            "rating": [4.3],
            "Main Accords Percentage": {"amber": null, "woody": 70},
            "Image URL": false
        }));
        assert_eq!(perfume.brand, "Unknown");
        assert_eq!(perfume.year, None);
        assert_eq!(perfume.rating, 0.0);
        assert_eq!(perfume.accords.len(), 1);
        assert_eq!(perfume.accords[0].name, "woody");
        assert!(perfume.image_url.is_none());
    }

    #[tokio::test]
    async fn test_search_sends_key_and_parses_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fragrances"))
            .and(query_param("search", "sauvage"))
            .and(query_param("limit", "5"))
            .and(header("x-api-key", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": [sauvage(), 42]})))
            .mount(&server)
            .await;

        let results = provider(&server, Some("secret")).search("sauvage", 5).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "Sauvage");
    }

    #[tokio::test]
    async fn test_unrecognized_envelope_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "ok"})))
            .mount(&server)
            .await;

        let results = provider(&server, Some("k")).search("x", 5).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_status_classification() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("search", "limited"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("search", "denied"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("search", "broken"))
            .respond_with(ResponseTemplate::new(500).set_body_string("down"))
            .mount(&server)
            .await;

        let p = provider(&server, Some("k"));
        assert!(matches!(p.search("limited", 5).await, Err(ProviderError::RateLimited { .. })));
        assert!(matches!(p.search("denied", 5).await, Err(ProviderError::Unauthorized { .. })));
        assert!(matches!(
            p.search("broken", 5).await,
            Err(ProviderError::Transport { status: Some(500), .. })
        ));
    }

    #[tokio::test]
    async fn test_non_json_body_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let result = provider(&server, Some("k")).search("x", 5).await;
        assert!(matches!(result, Err(ProviderError::Parse { .. })));
    }

    #[tokio::test]
    async fn test_availability_follows_credential() {
        let server = MockServer::start().await;
        let credential = ApiCredential::new(None);
        let p = FragellaProvider::with_base_url(credential.clone(), server.uri()).unwrap();
        assert!(!p.is_available());
        assert!(matches!(p.search("x", 5).await, Err(ProviderError::NotConfigured { .. })));

        credential.set(Some("new-key".to_string()));
        assert!(p.is_available());
    }
}
