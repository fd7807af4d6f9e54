//! Field normalizers
//!
//! Pure, total functions mapping provider vocabularies onto the canonical
//! enumerations. Unrecognized input always degrades to the documented
//! default.

use crate::perfume::{
    Concentration, Gender, Occasion, OccasionScore, Perfume, Season, SeasonScore,
    NEUTRAL_AFFINITY,
};

const FEMININE_WORDS: &[&str] = &["women", "woman", "female", "her", "femme", "ladies"];
const FEMININE_PREFIXES: &[&str] = &["femini", "femen"];
const MASCULINE_WORDS: &[&str] = &["men", "man", "male", "him", "homme"];
const MASCULINE_PREFIXES: &[&str] = &["mascul"];

/// Map a free-form gender label onto [`Gender`]
///
/// Matching is per word, so "women" never counts as "men". Input naming both
/// or neither yields `Unisex`.
pub fn normalize_gender(raw: Option<&str>) -> Gender {
    let Some(raw) = raw else {
        return Gender::Unisex;
    };
    let lower = raw.to_lowercase();
    let mut feminine = false;
    let mut masculine = false;

    for word in lower.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
        if word == "unisex" {
            return Gender::Unisex;
        }
        if FEMININE_WORDS.contains(&word) || FEMININE_PREFIXES.iter().any(|p| word.starts_with(p)) {
            feminine = true;
        }
        if MASCULINE_WORDS.contains(&word) || MASCULINE_PREFIXES.iter().any(|p| word.starts_with(p)) {
            masculine = true;
        }
    }

    match (masculine, feminine) {
        (true, false) => Gender::Masculine,
        (false, true) => Gender::Feminine,
        _ => Gender::Unisex,
    }
}

/// Derive gender from a perfume title ("Bleu de Chanel pour Homme")
pub fn gender_from_title(name: &str, brand: &str) -> Gender {
    let lower = format!(" {} {} ", name, brand).to_lowercase();
    if lower.contains("pour homme") || lower.contains("for men") || lower.contains(" man ") || lower.contains(" him ") {
        return Gender::Masculine;
    }
    if lower.contains("pour femme") || lower.contains("for women") || lower.contains(" woman ") || lower.contains(" her ") {
        return Gender::Feminine;
    }
    Gender::Unisex
}

/// Map a concentration label onto [`Concentration`]
///
/// Checked in priority order: Extrait (incl. Elixir), EDP, EDT, EDC, Parfum.
pub fn normalize_concentration(raw: Option<&str>) -> Concentration {
    let Some(raw) = raw else {
        return Concentration::Other;
    };
    let upper = raw.to_uppercase();
    if upper.contains("EXTRAIT") || upper.contains("ELIXIR") {
        Concentration::Extrait
    } else if upper.contains("EDP") || upper.contains("EAU DE PARFUM") {
        Concentration::Edp
    } else if upper.contains("EDT") || upper.contains("EAU DE TOILETTE") {
        Concentration::Edt
    } else if upper.contains("EDC") || upper.contains("EAU DE COLOGNE") || upper.contains("COLOGNE") {
        Concentration::Edc
    } else if upper.contains("PARFUM") {
        Concentration::Parfum
    } else {
        Concentration::Other
    }
}

/// Accord strength as reported by a provider: a number or a qualitative label
#[derive(Debug, Clone, PartialEq)]
pub enum AccordLevel<'a> {
    Percentage(f64),
    Label(&'a str),
}

/// Map an accord strength onto 0-100
///
/// Labels: dominant 85, prominent 65, moderate 40, subtle 20, anything else 30.
pub fn normalize_accord_strength(level: AccordLevel<'_>) -> u8 {
    match level {
        AccordLevel::Percentage(value) => clamp_percentage(value),
        AccordLevel::Label(label) => {
            let trimmed = label.trim();
            if let Ok(value) = trimmed.trim_end_matches('%').trim().parse::<f64>() {
                return clamp_percentage(value);
            }
            match trimmed.to_lowercase().as_str() {
                "dominant" => 85,
                "prominent" => 65,
                "moderate" => 40,
                "subtle" => 20,
                _ => 30,
            }
        }
    }
}

fn clamp_percentage(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 100.0) as u8
}

/// One neutral (50) score per season, in canonical order
pub fn default_season_scores() -> Vec<SeasonScore> {
    Season::ALL
        .iter()
        .map(|&season| SeasonScore {
            season,
            score: NEUTRAL_AFFINITY,
        })
        .collect()
}

/// One neutral (50) score per occasion, in canonical order
pub fn default_occasion_scores() -> Vec<OccasionScore> {
    Occasion::ALL
        .iter()
        .map(|&occasion| OccasionScore {
            occasion,
            score: NEUTRAL_AFFINITY,
        })
        .collect()
}

/// Rescale a provider ranking list onto 0-100
///
/// A list whose maximum is at most 10 is read as a 0-10 scale.
fn rescale(values: &[f64]) -> impl Fn(f64) -> u8 {
    let max = values.iter().copied().filter(|v| !v.is_nan()).fold(0.0_f64, f64::max);
    let factor = if max > 0.0 && max <= 10.0 { 10.0 } else { 1.0 };
    move |v: f64| clamp_percentage(v * factor)
}

/// Build a complete season list from raw `(label, score)` pairs
///
/// Unknown labels are dropped, the first score per season wins and missing
/// seasons get the neutral default.
pub fn season_scores_from<'a, I>(raw: I) -> Vec<SeasonScore>
where
    I: IntoIterator<Item = (&'a str, f64)>,
{
    let parsed: Vec<(Season, f64)> = raw
        .into_iter()
        .filter_map(|(label, score)| Season::from_label(label).map(|s| (s, score)))
        .collect();
    let scale = rescale(&parsed.iter().map(|(_, v)| *v).collect::<Vec<_>>());

    Season::ALL
        .iter()
        .map(|&season| SeasonScore {
            season,
            score: parsed
                .iter()
                .find(|(s, _)| *s == season)
                .map(|(_, v)| scale(*v))
                .unwrap_or(NEUTRAL_AFFINITY),
        })
        .collect()
}

/// Build a complete occasion list from raw `(label, score)` pairs
pub fn occasion_scores_from<'a, I>(raw: I) -> Vec<OccasionScore>
where
    I: IntoIterator<Item = (&'a str, f64)>,
{
    let parsed: Vec<(Occasion, f64)> = raw
        .into_iter()
        .filter_map(|(label, score)| Occasion::from_label(label).map(|o| (o, score)))
        .collect();
    let scale = rescale(&parsed.iter().map(|(_, v)| *v).collect::<Vec<_>>());

    Occasion::ALL
        .iter()
        .map(|&occasion| OccasionScore {
            occasion,
            score: parsed
                .iter()
                .find(|(o, _)| *o == occasion)
                .map(|(_, v)| scale(*v))
                .unwrap_or(NEUTRAL_AFFINITY),
        })
        .collect()
}

/// Clamp a provider rating onto 0-5
pub fn normalize_rating(raw: Option<f64>) -> f64 {
    match raw {
        Some(v) if v.is_finite() => v.clamp(0.0, 5.0),
        _ => 0.0,
    }
}

/// Round and clamp a longevity/sillage value onto 0-10
pub fn normalize_performance(raw: Option<f64>) -> u8 {
    match raw {
        Some(v) if v.is_finite() => v.round().clamp(0.0, 10.0) as u8,
        _ => crate::perfume::DEFAULT_PERFORMANCE,
    }
}

/// Split a comma-separated list, trimming and dropping blanks
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Bring a record supplied from outside the providers into canonical shape
///
/// Scores already live on 0-100 and are only clamped, never rescaled.
/// Season and occasion lists are completed to one entry each, first entry
/// winning. The id is not touched.
pub fn canonicalize(perfume: &mut Perfume) {
    perfume.rating = normalize_rating(Some(perfume.rating));
    perfume.longevity = perfume.longevity.min(10);
    perfume.sillage = perfume.sillage.min(10);

    perfume.accords.retain(|a| !a.name.trim().is_empty());
    for accord in &mut perfume.accords {
        accord.percentage = accord.percentage.min(100);
    }

    perfume.season_scores = Season::ALL
        .iter()
        .map(|&season| SeasonScore {
            season,
            score: perfume
                .season_scores
                .iter()
                .find(|s| s.season == season)
                .map(|s| s.score.min(100))
                .unwrap_or(NEUTRAL_AFFINITY),
        })
        .collect();

    perfume.occasion_scores = Occasion::ALL
        .iter()
        .map(|&occasion| OccasionScore {
            occasion,
            score: perfume
                .occasion_scores
                .iter()
                .find(|o| o.occasion == occasion)
                .map(|o| o.score.min(100))
                .unwrap_or(NEUTRAL_AFFINITY),
        })
        .collect();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gender_tokens() {
        assert_eq!(normalize_gender(Some("Men")), Gender::Masculine);
        assert_eq!(normalize_gender(Some("for women")), Gender::Feminine);
        assert_eq!(normalize_gender(Some("Female")), Gender::Feminine);
        assert_eq!(normalize_gender(Some("masculino")), Gender::Masculine);
        assert_eq!(normalize_gender(Some("Femenino")), Gender::Feminine);
        assert_eq!(normalize_gender(Some("Unisex")), Gender::Unisex);
    }

    #[test]
    fn test_gender_ambiguous_or_missing() {
        assert_eq!(normalize_gender(None), Gender::Unisex);
        assert_eq!(normalize_gender(Some("")), Gender::Unisex);
        assert_eq!(normalize_gender(Some("women and men")), Gender::Unisex);
        assert_eq!(normalize_gender(Some("\u{0}garbage\u{fffd}")), Gender::Unisex);
    }

    #[test]
    fn test_gender_from_title() {
        assert_eq!(gender_from_title("Bleu de Chanel Pour Homme", "Chanel"), Gender::Masculine);
        assert_eq!(gender_from_title("Good Girl for Women", "Carolina Herrera"), Gender::Feminine);
        assert_eq!(gender_from_title("Santal 33", "Le Labo"), Gender::Unisex);
    }

    #[test]
    fn test_concentration_labels() {
        assert_eq!(normalize_concentration(Some("Eau de Parfum")), Concentration::Edp);
        assert_eq!(normalize_concentration(Some("edt")), Concentration::Edt);
        assert_eq!(normalize_concentration(Some("Elixir")), Concentration::Extrait);
        assert_eq!(normalize_concentration(Some("Extrait de Parfum")), Concentration::Extrait);
        assert_eq!(normalize_concentration(Some("Parfum")), Concentration::Parfum);
        assert_eq!(normalize_concentration(Some("Eau de Cologne")), Concentration::Edc);
        assert_eq!(normalize_concentration(Some("body mist")), Concentration::Other);
        assert_eq!(normalize_concentration(None), Concentration::Other);
        assert_eq!(normalize_concentration(Some("")), Concentration::Other);
    }

    #[test]
    fn test_accord_strength() {
        assert_eq!(normalize_accord_strength(AccordLevel::Percentage(72.4)), 72);
        assert_eq!(normalize_accord_strength(AccordLevel::Percentage(140.0)), 100);
        assert_eq!(normalize_accord_strength(AccordLevel::Label("Dominant")), 85);
        assert_eq!(normalize_accord_strength(AccordLevel::Label("prominent")), 65);
        assert_eq!(normalize_accord_strength(AccordLevel::Label("Moderate")), 40);
        assert_eq!(normalize_accord_strength(AccordLevel::Label("subtle")), 20);
        assert_eq!(normalize_accord_strength(AccordLevel::Label("whisper")), 30);
        assert_eq!(normalize_accord_strength(AccordLevel::Label("55%")), 55);
    }

    #[test]
    fn test_default_scores_complete() {
        let seasons = default_season_scores();
        assert_eq!(seasons.len(), 4);
        for season in Season::ALL {
            assert!(seasons.iter().any(|s| s.season == season && s.score == 50));
        }
        let occasions = default_occasion_scores();
        assert_eq!(occasions.len(), 5);
        for occasion in Occasion::ALL {
            assert!(occasions.iter().any(|o| o.occasion == occasion && o.score == 50));
        }
    }

    #[test]
    fn test_season_scores_fill_and_rescale() {
        let scores = season_scores_from(vec![("Summer", 9.0), ("winter", 2.0), ("monsoon", 7.0)]);
        assert_eq!(scores.len(), 4);
        assert_eq!(scores[0].score, 50); // spring missing
        assert_eq!(scores[1].score, 90);
        assert_eq!(scores[3].score, 20);
    }

    #[test]
    fn test_occasion_scores_percent_scale_kept() {
        let scores = occasion_scores_from(vec![("night out", 80.0), ("date", 65.0), ("date", 10.0)]);
        assert_eq!(scores.len(), 5);
        assert_eq!(scores[2].score, 80);
        assert_eq!(scores[3].score, 65);
        assert_eq!(scores[0].score, 50);
    }

    #[test]
    fn test_rating_and_performance() {
        assert_eq!(normalize_rating(Some(7.0)), 5.0);
        assert_eq!(normalize_rating(Some(f64::NAN)), 0.0);
        assert_eq!(normalize_performance(Some(7.6)), 8);
        assert_eq!(normalize_performance(None), 5);
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list("Bergamot, Pepper,, "), vec!["Bergamot", "Pepper"]);
        assert!(split_list("").is_empty());
    }

    #[test]
    fn test_canonicalize_clamps_and_completes() {
        use crate::perfume::{AccordStrength, DataSource};

        let mut p = Perfume::new("Dior", "Sauvage", Concentration::Edt, DataSource::Manual);
        p.rating = 9.5;
        p.longevity = 200;
        p.accords = vec![
            AccordStrength { name: "amber".to_string(), percentage: 250 },
            AccordStrength { name: " ".to_string(), percentage: 10 },
        ];
        p.season_scores = vec![
            SeasonScore { season: Season::Summer, score: 250 },
            SeasonScore { season: Season::Summer, score: 10 },
        ];
        p.occasion_scores = Vec::new();

        canonicalize(&mut p);

        assert_eq!(p.rating, 5.0);
        assert_eq!(p.longevity, 10);
        assert_eq!(p.sillage, 5);
        assert_eq!(p.accords.len(), 1);
        assert_eq!(p.accords[0].percentage, 100);
        assert_eq!(p.season_scores.len(), 4);
        assert_eq!(p.season_score(Season::Summer), 100);
        assert_eq!(p.season_score(Season::Winter), NEUTRAL_AFFINITY);
        assert_eq!(p.occasion_scores.len(), 5);
    }

    #[test]
    fn test_canonicalize_keeps_scores_on_their_scale() {
        use crate::perfume::DataSource;

        let mut p = Perfume::new("Dior", "Sauvage", Concentration::Edt, DataSource::Manual);
        p.season_scores = vec![SeasonScore { season: Season::Winter, score: 8 }];
        p.rating = f64::NAN;
        canonicalize(&mut p);
        assert_eq!(p.season_score(Season::Winter), 8);
        assert_eq!(p.rating, 0.0);
    }
}
