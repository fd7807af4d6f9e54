//! Response envelope detection
//!
//! Upstreams wrap result lists inconsistently: a bare array, or an object
//! with the list under `results`, `data` or `hits`. Each provider declares
//! which keys it accepts, in priority order. Anything unrecognized is an
//! empty result, never an error.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

/// Object key that may carry a result list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeKey {
    Results,
    Data,
    Hits,
}

impl EnvelopeKey {
    pub fn field(self) -> &'static str {
        match self {
            EnvelopeKey::Results => "results",
            EnvelopeKey::Data => "data",
            EnvelopeKey::Hits => "hits",
        }
    }
}

/// Detected shape of a provider response
#[derive(Debug, PartialEq)]
pub enum ResponseEnvelope {
    Bare(Vec<Value>),
    Keyed(EnvelopeKey, Vec<Value>),
    Unrecognized,
}

impl ResponseEnvelope {
    /// Detect the envelope, trying `accepted` keys in order
    pub fn parse(body: Value, accepted: &[EnvelopeKey]) -> Self {
        match body {
            Value::Array(items) => ResponseEnvelope::Bare(items),
            Value::Object(mut map) => {
                for key in accepted {
                    if let Some(Value::Array(items)) = map.remove(key.field()) {
                        return ResponseEnvelope::Keyed(*key, items);
                    }
                }
                ResponseEnvelope::Unrecognized
            }
            _ => ResponseEnvelope::Unrecognized,
        }
    }

    pub fn into_items(self) -> Vec<Value> {
        match self {
            ResponseEnvelope::Bare(items) | ResponseEnvelope::Keyed(_, items) => items,
            ResponseEnvelope::Unrecognized => Vec::new(),
        }
    }
}

/// Decode items one by one, skipping any that do not fit `T`
pub fn decode_items<T: DeserializeOwned>(provider: &str, items: Vec<Value>) -> Vec<T> {
    let total = items.len();
    let decoded: Vec<T> = items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(provider = %provider, error = %e, "Skipping malformed item");
                None
            }
        })
        .collect();

    if decoded.len() < total {
        debug!(
            provider = %provider,
            skipped = total - decoded.len(),
            total,
            "Dropped malformed items from response"
        );
    }
    decoded
}

// ============================================================================
// Lenient field decoding
// ============================================================================
//
// Used with `#[serde(default, deserialize_with = "...")]` on wire structs so
// a bad sub-field degrades to its default instead of failing the item.

/// Decode a field, treating any value that does not fit `T` as absent
pub fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Decode a list, keeping the elements that fit `T`; a non-array is empty
pub fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let items = match Value::deserialize(deserializer)? {
        Value::Array(items) => items,
        _ => return Ok(Vec::new()),
    };
    Ok(items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}

/// Decode a string-keyed map, keeping the entries whose value fits `T`
pub fn lenient_map<'de, D, T>(deserializer: D) -> Result<BTreeMap<String, T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let entries: Map<String, Value> = match Value::deserialize(deserializer)? {
        Value::Object(entries) => entries,
        _ => return Ok(BTreeMap::new()),
    };
    Ok(entries
        .into_iter()
        .filter_map(|(key, value)| serde_json::from_value(value).ok().map(|v| (key, v)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    const ALL: &[EnvelopeKey] = &[EnvelopeKey::Results, EnvelopeKey::Data, EnvelopeKey::Hits];

    #[test]
    fn test_bare_array() {
        let env = ResponseEnvelope::parse(json!([{"a": 1}]), ALL);
        assert!(matches!(env, ResponseEnvelope::Bare(ref items) if items.len() == 1));
    }

    #[test]
    fn test_key_priority() {
        let body = json!({"data": [1, 2], "results": [1]});
        assert_eq!(
            ResponseEnvelope::parse(body, ALL),
            ResponseEnvelope::Keyed(EnvelopeKey::Results, vec![json!(1)])
        );
    }

    #[test]
    fn test_non_array_key_skipped() {
        let body = json!({"results": "oops", "hits": [3]});
        assert_eq!(
            ResponseEnvelope::parse(body, ALL),
            ResponseEnvelope::Keyed(EnvelopeKey::Hits, vec![json!(3)])
        );
    }

    #[test]
    fn test_unrecognized_is_empty() {
        let env = ResponseEnvelope::parse(json!({"message": "nothing"}), ALL);
        assert_eq!(env, ResponseEnvelope::Unrecognized);
        assert!(env.into_items().is_empty());
        assert!(ResponseEnvelope::parse(json!(null), ALL).into_items().is_empty());
    }

    #[test]
    fn test_unaccepted_key_ignored() {
        let env = ResponseEnvelope::parse(json!({"hits": [1]}), &[EnvelopeKey::Results]);
        assert_eq!(env, ResponseEnvelope::Unrecognized);
    }

    #[derive(Deserialize)]
    struct Item {
        name: String,
    }

    #[test]
    fn test_decode_skips_malformed() {
        let items = vec![json!({"name": "ok"}), json!(42), json!({"name": "also"})];
        let decoded: Vec<Item> = decode_items("Test", items);
        let names: Vec<_> = decoded.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["ok", "also"]);
    }

    #[derive(Deserialize, Default)]
    #[serde(default)]
    struct Loose {
        #[serde(deserialize_with = "lenient")]
        year: Option<i32>,
        #[serde(deserialize_with = "lenient_list")]
        tags: Vec<String>,
        #[serde(deserialize_with = "lenient_map")]
        weights: BTreeMap<String, f64>,
    }

    #[test]
    fn test_lenient_fields_degrade_to_defaults() {
        let loose: Loose = serde_json::from_value(json!({
            "year": "soon",
            "tags": ["a", null, 3, "b"],
            "weights": {"x": 1.5, "y": null}
        }))
        .unwrap();
        assert_eq!(loose.year, None);
        assert_eq!(loose.tags, vec!["a", "b"]);
        assert_eq!(loose.weights.len(), 1);

        let nulls: Loose = serde_json::from_value(json!({"tags": null, "weights": []})).unwrap();
        assert!(nulls.tags.is_empty());
        assert!(nulls.weights.is_empty());
    }
}
