//! Identity key derivation
//!
//! Two records whose (brand, name, concentration) produce the same key are
//! the same entity, whichever provider they came from. No transliteration is
//! performed: non-ASCII letters are treated as separators.

/// Build the dedup key for a perfume
///
/// Non-empty parts are joined, lowercased, every run of characters outside
/// `[a-z0-9]` becomes a single `-`, and leading/trailing `-` are stripped.
/// Returns an empty string when every part is empty.
pub fn build_key(brand: &str, name: &str, concentration: Option<&str>) -> String {
    let parts = [Some(brand), Some(name), concentration];
    let joined = parts
        .iter()
        .flatten()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase();

    let mut key = String::with_capacity(joined.len());
    let mut pending_separator = false;
    for c in joined.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_separator && !key.is_empty() {
                key.push('-');
            }
            pending_separator = false;
            key.push(c);
        } else {
            pending_separator = true;
        }
    }
    key
}
