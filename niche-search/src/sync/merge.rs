//! Login merge rules
//!
//! - Catalog: union by id, remote record wins on collision.
//! - Collection: union by perfume id, remote entry wins when its `added_at`
//!   is the same or later than the local one.
//!
//! Output keeps local order first, then remote-only records in remote order.

use niche_common::{CollectionEntry, Perfume};
use std::collections::HashMap;

pub fn merge_catalog(local: Vec<Perfume>, remote: Vec<Perfume>) -> Vec<Perfume> {
    let mut merged = local;
    let mut index: HashMap<String, usize> = merged
        .iter()
        .enumerate()
        .map(|(i, p)| (p.id.clone(), i))
        .collect();

    for perfume in remote {
        match index.get(&perfume.id) {
            Some(&slot) => merged[slot] = perfume,
            None => {
                index.insert(perfume.id.clone(), merged.len());
                merged.push(perfume);
            }
        }
    }
    merged
}

pub fn merge_collection(local: Vec<CollectionEntry>, remote: Vec<CollectionEntry>) -> Vec<CollectionEntry> {
    let mut merged = local;
    let mut index: HashMap<String, usize> = merged
        .iter()
        .enumerate()
        .map(|(i, e)| (e.perfume_id.clone(), i))
        .collect();

    for entry in remote {
        match index.get(&entry.perfume_id) {
            Some(&slot) => {
                if entry.added_at >= merged[slot].added_at {
                    merged[slot] = entry;
                }
            }
            None => {
                index.insert(entry.perfume_id.clone(), merged.len());
                merged.push(entry);
            }
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use niche_common::{Concentration, DataSource};

    fn perfume(name: &str, rating: f64) -> Perfume {
        let mut p = Perfume::new("House", name, Concentration::Edp, DataSource::Manual);
        p.rating = rating;
        p
    }

    #[test]
    fn test_catalog_remote_wins() {
        let merged = merge_catalog(
            vec![perfume("A", 1.0), perfume("B", 1.0)],
            vec![perfume("B", 4.0), perfume("C", 3.0)],
        );
        let summary: Vec<_> = merged.iter().map(|p| (p.name.as_str(), p.rating)).collect();
        assert_eq!(summary, vec![("A", 1.0), ("B", 4.0), ("C", 3.0)]);
    }

    #[test]
    fn test_collection_newer_or_equal_remote_wins() {
        let now = Utc::now();

        let mut local_old = CollectionEntry::new("a", false);
        local_old.added_at = now - Duration::hours(1);
        let mut remote_new = CollectionEntry::new("a", true);
        remote_new.added_at = now;

        let mut local_new = CollectionEntry::new("b", true);
        local_new.added_at = now;
        let mut remote_old = CollectionEntry::new("b", false);
        remote_old.added_at = now - Duration::hours(1);

        let mut local_tie = CollectionEntry::new("c", false);
        local_tie.added_at = now;
        let mut remote_tie = CollectionEntry::new("c", true);
        remote_tie.added_at = now;

        let merged = merge_collection(
            vec![local_old, local_new, local_tie],
            vec![remote_new, remote_old, remote_tie],
        );
        let owned: Vec<_> = merged.iter().map(|e| (e.perfume_id.as_str(), e.owned)).collect();
        assert_eq!(owned, vec![("a", true), ("b", true), ("c", true)]);
    }

    #[test]
    fn test_collection_union() {
        let merged = merge_collection(
            vec![CollectionEntry::new("local", true)],
            vec![CollectionEntry::new("remote", false)],
        );
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[1].perfume_id, "remote");
    }
}
