//! Collection shelves and statistics
//!
//! A shelf is a filtered, sorted view over the collection joined with the
//! catalog. Members sort by effective rating (personal rating, else catalog
//! rating) descending, then by name.

use crate::prices::lookup_price;
use niche_common::perfume::NEUTRAL_AFFINITY;
use niche_common::{CollectionEntry, Occasion, Perfume, PriceEstimate, Season};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Minimum effective rating for the top-rated shelf
pub const TOP_RATED_THRESHOLD: f64 = 4.0;
/// Minimum accord percentage for a family shelf
pub const ACCORD_THRESHOLD: u8 = 20;
const TIME_HIGH: f64 = 60.0;
const TIME_LOW: f64 = 40.0;

/// Scent families grouped by accord names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScentFamily {
    Woody,
    Oriental,
    Fresh,
    Floral,
    Aromatic,
    Citrus,
}

impl ScentFamily {
    pub const ALL: [ScentFamily; 6] = [
        ScentFamily::Woody,
        ScentFamily::Oriental,
        ScentFamily::Fresh,
        ScentFamily::Floral,
        ScentFamily::Aromatic,
        ScentFamily::Citrus,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ScentFamily::Woody => "woody",
            ScentFamily::Oriental => "oriental",
            ScentFamily::Fresh => "fresh",
            ScentFamily::Floral => "floral",
            ScentFamily::Aromatic => "aromatic",
            ScentFamily::Citrus => "citrus",
        }
    }

    /// Accord names (lowercase) that place a perfume in this family
    pub fn accords(self) -> &'static [&'static str] {
        match self {
            ScentFamily::Woody => &["woody", "amaderado", "warm spicy", "oud"],
            ScentFamily::Oriental => &["oriental", "amber", "sweet", "balsamic", "ámbar"],
            ScentFamily::Fresh => &["fresh", "aquatic", "ozonic", "green", "fresco", "acuático"],
            ScentFamily::Floral => &["floral", "white floral", "rose", "floral blanco"],
            ScentFamily::Aromatic => &["aromatic", "herbal", "lavender", "aromático"],
            ScentFamily::Citrus => &["citrus", "cítrico", "fresh spicy"],
        }
    }
}

/// Shelf identifiers, e.g. `season-summer`, `occasion-nightOut`, `family-woody`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shelf {
    All,
    Wishlist,
    TopRated,
    Season(Season),
    Occasion(Occasion),
    TimeDay,
    TimeNight,
    TimeVersatile,
    Family(ScentFamily),
}

fn season_slug(season: Season) -> &'static str {
    match season {
        Season::Spring => "spring",
        Season::Summer => "summer",
        Season::Fall => "fall",
        Season::Winter => "winter",
    }
}

fn occasion_slug(occasion: Occasion) -> &'static str {
    match occasion {
        Occasion::Professional => "professional",
        Occasion::Casual => "casual",
        Occasion::NightOut => "nightOut",
        Occasion::Date => "date",
        Occasion::Special => "special",
    }
}

impl fmt::Display for Shelf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shelf::All => f.write_str("all"),
            Shelf::Wishlist => f.write_str("wishlist"),
            Shelf::TopRated => f.write_str("top-rated"),
            Shelf::Season(s) => write!(f, "season-{}", season_slug(*s)),
            Shelf::Occasion(o) => write!(f, "occasion-{}", occasion_slug(*o)),
            Shelf::TimeDay => f.write_str("time-day"),
            Shelf::TimeNight => f.write_str("time-night"),
            Shelf::TimeVersatile => f.write_str("time-versatile"),
            Shelf::Family(family) => write!(f, "family-{}", family.as_str()),
        }
    }
}

impl FromStr for Shelf {
    type Err = niche_common::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || niche_common::Error::NotFound(format!("shelf {}", s));
        let shelf = match s {
            "all" => Shelf::All,
            "wishlist" => Shelf::Wishlist,
            "top-rated" => Shelf::TopRated,
            "time-day" => Shelf::TimeDay,
            "time-night" => Shelf::TimeNight,
            "time-versatile" => Shelf::TimeVersatile,
            other => {
                if let Some(season) = other.strip_prefix("season-") {
                    Shelf::Season(Season::from_label(season).ok_or_else(unknown)?)
                } else if let Some(occasion) = other.strip_prefix("occasion-") {
                    Shelf::Occasion(Occasion::from_label(occasion).ok_or_else(unknown)?)
                } else if let Some(family) = other.strip_prefix("family-") {
                    Shelf::Family(
                        ScentFamily::ALL
                            .into_iter()
                            .find(|f| f.as_str() == family)
                            .ok_or_else(unknown)?,
                    )
                } else {
                    return Err(unknown());
                }
            }
        };
        Ok(shelf)
    }
}

/// Catalog record joined with its collection entry
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShelfPerfume {
    #[serde(flatten)]
    pub perfume: Perfume,
    pub collection_data: CollectionEntry,
    pub effective_rating: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_price: Option<PriceEstimate>,
}

impl ShelfPerfume {
    pub fn new(perfume: Perfume, entry: CollectionEntry) -> Self {
        let effective_rating = entry.personal_rating.unwrap_or(perfume.rating);
        let estimated_price = entry
            .price_estimate
            .clone()
            .or_else(|| lookup_price(&perfume.brand));
        Self {
            perfume,
            collection_data: entry,
            effective_rating,
            estimated_price,
        }
    }
}

/// Join entries with their catalog records; entries without a record are skipped
pub fn join_collection(perfumes: Vec<Perfume>, entries: Vec<CollectionEntry>) -> Vec<ShelfPerfume> {
    let mut by_id: HashMap<String, Perfume> = perfumes.into_iter().map(|p| (p.id.clone(), p)).collect();
    entries
        .into_iter()
        .filter_map(|entry| {
            by_id
                .remove(&entry.perfume_id)
                .map(|perfume| ShelfPerfume::new(perfume, entry))
        })
        .collect()
}

fn has_occasion_signal(perfume: &Perfume) -> bool {
    perfume
        .occasion_scores
        .iter()
        .any(|o| o.score != NEUTRAL_AFFINITY)
}

fn time_scores(perfume: &Perfume) -> (f64, f64) {
    let casual = perfume.occasion_score(Occasion::Casual) as f64;
    let professional = perfume.occasion_score(Occasion::Professional) as f64;
    let night = perfume.occasion_score(Occasion::NightOut) as f64;
    ((casual + professional) / 2.0, night)
}

impl Shelf {
    pub fn contains(&self, item: &ShelfPerfume) -> bool {
        let p = &item.perfume;
        match self {
            Shelf::All => item.collection_data.owned,
            Shelf::Wishlist => !item.collection_data.owned,
            Shelf::TopRated => item.effective_rating >= TOP_RATED_THRESHOLD,
            // neutral scores are filler, not signal
            Shelf::Season(season) => p.season_score(*season) > NEUTRAL_AFFINITY,
            Shelf::Occasion(occasion) => p.occasion_score(*occasion) > NEUTRAL_AFFINITY,
            Shelf::TimeDay => {
                let (day, night) = time_scores(p);
                has_occasion_signal(p)
                    && (day >= TIME_HIGH || (day >= TIME_LOW && night < TIME_HIGH))
            }
            Shelf::TimeNight => {
                let (_, night) = time_scores(p);
                has_occasion_signal(p) && night >= TIME_LOW
            }
            Shelf::TimeVersatile => {
                let (day, night) = time_scores(p);
                has_occasion_signal(p) && day >= TIME_LOW && night >= TIME_LOW
            }
            Shelf::Family(family) => p.accords.iter().any(|a| {
                a.percentage >= ACCORD_THRESHOLD
                    && family.accords().contains(&a.name.to_lowercase().as_str())
            }),
        }
    }

    /// Filter and sort members of this shelf
    pub fn select(&self, items: &[ShelfPerfume]) -> Vec<ShelfPerfume> {
        let mut selected: Vec<ShelfPerfume> = items.iter().filter(|i| self.contains(i)).cloned().collect();
        selected.sort_by(|a, b| {
            b.effective_rating
                .total_cmp(&a.effective_rating)
                .then_with(|| a.perfume.name.cmp(&b.perfume.name))
        });
        selected
    }
}

/// Collection summary
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionStats {
    pub total_in_collection: usize,
    pub total_wishlist: usize,
    pub total_catalog: i64,
    /// Average effective rating of owned perfumes, one decimal
    pub avg_rating: f64,
}

pub fn collection_stats(items: &[ShelfPerfume], entries: &[CollectionEntry], total_catalog: i64) -> CollectionStats {
    let owned: Vec<f64> = items
        .iter()
        .filter(|i| i.collection_data.owned)
        .map(|i| i.effective_rating)
        .collect();
    let avg = if owned.is_empty() {
        0.0
    } else {
        owned.iter().sum::<f64>() / owned.len() as f64
    };

    CollectionStats {
        total_in_collection: entries.iter().filter(|e| e.owned).count(),
        total_wishlist: entries.iter().filter(|e| !e.owned).count(),
        total_catalog,
        avg_rating: (avg * 10.0).round() / 10.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use niche_common::normalize::occasion_scores_from;
    use niche_common::{AccordStrength, Concentration, DataSource};

    fn item(name: &str, rating: f64, owned: bool) -> ShelfPerfume {
        let mut perfume = Perfume::new("House", name, Concentration::Edp, DataSource::Manual);
        perfume.rating = rating;
        let entry = CollectionEntry::new(perfume.id.clone(), owned);
        ShelfPerfume::new(perfume, entry)
    }

    #[test]
    fn test_shelf_ids_round_trip() {
        for id in ["all", "top-rated", "season-fall", "occasion-nightOut", "time-versatile", "family-citrus"] {
            let shelf: Shelf = id.parse().unwrap();
            assert_eq!(shelf.to_string(), id);
        }
        assert!("season-monsoon".parse::<Shelf>().is_err());
        assert!("bogus".parse::<Shelf>().is_err());
    }

    #[test]
    fn test_effective_rating_prefers_personal() {
        let mut rated = item("A", 3.0, true);
        assert_eq!(rated.effective_rating, 3.0);

        rated.collection_data.personal_rating = Some(4.5);
        let rejoined = ShelfPerfume::new(rated.perfume.clone(), rated.collection_data.clone());
        assert_eq!(rejoined.effective_rating, 4.5);
    }

    #[test]
    fn test_sorted_by_rating_then_name() {
        let items = vec![item("B", 4.0, true), item("A", 4.0, true), item("C", 4.8, true), item("W", 5.0, false)];
        let names: Vec<_> = Shelf::All
            .select(&items)
            .into_iter()
            .map(|i| i.perfume.name)
            .collect();
        assert_eq!(names, vec!["C", "A", "B"]);
    }

    #[test]
    fn test_neutral_defaults_stay_off_time_and_season_shelves() {
        let items = vec![item("Plain", 4.0, true)];
        assert!(Shelf::Season(Season::Summer).select(&items).is_empty());
        assert!(Shelf::TimeNight.select(&items).is_empty());
        assert!(Shelf::TimeDay.select(&items).is_empty());
    }

    #[test]
    fn test_time_shelves() {
        let mut night = item("Night", 4.0, true);
        night.perfume.occasion_scores = occasion_scores_from([("night out", 9.0), ("casual", 2.0), ("professional", 2.0)]);
        let mut day = item("Day", 4.0, true);
        day.perfume.occasion_scores = occasion_scores_from([("casual", 8.0), ("professional", 7.0), ("night out", 3.0)]);
        let items = vec![night, day];

        let names = |shelf: Shelf| -> Vec<String> { shelf.select(&items).into_iter().map(|i| i.perfume.name).collect() };
        assert_eq!(names(Shelf::TimeNight), vec!["Night"]);
        assert_eq!(names(Shelf::TimeDay), vec!["Day"]);
        assert!(names(Shelf::TimeVersatile).is_empty());
    }

    #[test]
    fn test_family_threshold() {
        let mut woody = item("Woody", 4.0, true);
        woody.perfume.accords = vec![AccordStrength { name: "Oud".into(), percentage: 20 }];
        let mut faint = item("Faint", 4.0, true);
        faint.perfume.accords = vec![AccordStrength { name: "woody".into(), percentage: 19 }];

        let selected = Shelf::Family(ScentFamily::Woody).select(&[woody, faint]);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].perfume.name, "Woody");
    }

    #[test]
    fn test_price_estimate_entry_wins() {
        let mut perfume = Perfume::new("Dior", "Sauvage", Concentration::Edt, DataSource::Manual);
        perfume.rating = 4.0;
        let from_table = ShelfPerfume::new(perfume.clone(), CollectionEntry::new(perfume.id.clone(), true));
        assert_eq!(from_table.estimated_price.unwrap().amount_uyu, 9250);

        let mut entry = CollectionEntry::new(perfume.id.clone(), true);
        entry.price_estimate = Some(PriceEstimate {
            amount_uyu: 7000,
            source: "Receipt".into(),
            last_updated: "2026-03-01".into(),
            confidence: niche_common::perfume::PriceConfidence::Exact,
        });
        assert_eq!(ShelfPerfume::new(perfume, entry).estimated_price.unwrap().amount_uyu, 7000);
    }

    #[test]
    fn test_stats() {
        let mut rated = item("A", 3.0, true);
        rated.effective_rating = 4.5;
        let items = vec![rated, item("B", 4.0, true), item("W", 5.0, false)];
        let entries: Vec<CollectionEntry> = items.iter().map(|i| i.collection_data.clone()).collect();

        let stats = collection_stats(&items, &entries, 10);
        assert_eq!(stats.total_in_collection, 2);
        assert_eq!(stats.total_wishlist, 1);
        assert_eq!(stats.total_catalog, 10);
        assert_eq!(stats.avg_rating, 4.3);
    }
}
