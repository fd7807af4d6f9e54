//! Catalog and collection service
//!
//! The only writer of the local catalog and collection. Every mutation names
//! its [`Actor`]: the local write commits first, then, for a signed-in user,
//! the same change is queued for the remote store.

use crate::shelves::{collection_stats, join_collection, CollectionStats, Shelf, ShelfPerfume};
use crate::sync::{PropagationQueue, SyncOp, UserId};
use niche_common::db::catalog;
use niche_common::db::collection::{self, CollectionUpdate};
use niche_common::normalize::canonicalize;
use niche_common::{CollectionEntry, Error, Perfume, Result};
use sqlx::{Pool, Sqlite};
use tracing::{debug, info};

/// Who performed a mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    /// Local-only change, never propagated
    Local,
    User(UserId),
}

pub struct CatalogService {
    db: Pool<Sqlite>,
    propagation: Option<PropagationQueue>,
}

impl CatalogService {
    pub fn new(db: Pool<Sqlite>, propagation: Option<PropagationQueue>) -> Self {
        Self { db, propagation }
    }

    pub fn propagation(&self) -> Option<&PropagationQueue> {
        self.propagation.as_ref()
    }

    async fn propagate(&self, actor: &Actor, op: SyncOp) {
        match (actor, &self.propagation) {
            (Actor::User(user), Some(queue)) => queue.enqueue(user.clone(), op).await,
            (Actor::User(user), None) => {
                debug!(user = %user, "No remote store configured; change stays local")
            }
            (Actor::Local, _) => {}
        }
    }

    // ------------------------------------------------------------------
    // Catalog
    // ------------------------------------------------------------------

    pub async fn all_perfumes(&self) -> Result<Vec<Perfume>> {
        catalog::get_all(&self.db).await
    }

    pub async fn perfume(&self, id: &str) -> Result<Perfume> {
        catalog::get(&self.db, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("perfume {}", id)))
    }

    pub async fn search_local(&self, query: &str) -> Result<Vec<Perfume>> {
        catalog::search_local(&self.db, query).await
    }

    /// Store records in the catalog, canonicalized and with re-derived ids
    ///
    /// Records whose identity key is empty are rejected.
    pub async fn save_perfumes(&self, perfumes: Vec<Perfume>, actor: &Actor) -> Result<Vec<Perfume>> {
        let mut accepted = Vec::with_capacity(perfumes.len());
        for mut perfume in perfumes {
            canonicalize(&mut perfume);
            perfume.refresh_id();
            if perfume.id.is_empty() {
                return Err(Error::InvalidInput(format!(
                    "perfume {:?} by {:?} has no usable name or brand",
                    perfume.name, perfume.brand
                )));
            }
            accepted.push(perfume);
        }

        catalog::put_many(&self.db, &accepted).await?;
        info!(count = accepted.len(), "Saved perfumes to catalog");

        for perfume in &accepted {
            self.propagate(actor, SyncOp::PutPerfume(perfume.clone())).await;
        }
        Ok(accepted)
    }

    // ------------------------------------------------------------------
    // Collection
    // ------------------------------------------------------------------

    /// Add a catalog perfume to the collection or wishlist
    ///
    /// Adding an id that is already collected changes nothing and returns
    /// `None`.
    pub async fn add_to_collection(
        &self,
        perfume_id: &str,
        owned: bool,
        actor: &Actor,
    ) -> Result<Option<CollectionEntry>> {
        self.perfume(perfume_id).await?;

        let entry = CollectionEntry::new(perfume_id, owned);
        if !collection::add(&self.db, &entry).await? {
            debug!(perfume_id = %perfume_id, "Already in collection");
            return Ok(None);
        }

        info!(perfume_id = %perfume_id, owned, "Added to collection");
        self.propagate(actor, SyncOp::PutCollectionEntry(entry.clone())).await;
        Ok(Some(entry))
    }

    pub async fn update_collection_entry(
        &self,
        perfume_id: &str,
        changes: &CollectionUpdate,
        actor: &Actor,
    ) -> Result<CollectionEntry> {
        if let Some(rating) = changes.personal_rating {
            if !(0.0..=5.0).contains(&rating) {
                return Err(Error::InvalidInput(format!(
                    "personal rating {} outside 0-5",
                    rating
                )));
            }
        }

        let entry = collection::update(&self.db, perfume_id, changes).await?;
        self.propagate(actor, SyncOp::PutCollectionEntry(entry.clone())).await;
        Ok(entry)
    }

    /// Remove an entry; returns whether one existed
    pub async fn remove_from_collection(&self, perfume_id: &str, actor: &Actor) -> Result<bool> {
        let removed = collection::remove(&self.db, perfume_id).await?;
        if removed {
            info!(perfume_id = %perfume_id, "Removed from collection");
            self.propagate(actor, SyncOp::DeleteCollectionEntry(perfume_id.to_string()))
                .await;
        }
        Ok(removed)
    }

    /// Collection entries joined with their catalog records
    pub async fn collection_view(&self) -> Result<Vec<ShelfPerfume>> {
        let entries = collection::get_all(&self.db).await?;
        let ids: Vec<String> = entries.iter().map(|e| e.perfume_id.clone()).collect();
        let perfumes = catalog::get_many(&self.db, &ids).await?;
        Ok(join_collection(perfumes, entries))
    }

    pub async fn shelf(&self, shelf: Shelf) -> Result<Vec<ShelfPerfume>> {
        Ok(shelf.select(&self.collection_view().await?))
    }

    pub async fn stats(&self) -> Result<CollectionStats> {
        let entries = collection::get_all(&self.db).await?;
        let ids: Vec<String> = entries.iter().map(|e| e.perfume_id.clone()).collect();
        let perfumes = catalog::get_many(&self.db, &ids).await?;
        let total_catalog = catalog::count(&self.db).await?;
        let items = join_collection(perfumes, entries.clone());
        Ok(collection_stats(&items, &entries, total_catalog))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::memory::MemoryRemote;
    use niche_common::db::open_in_memory;
    use niche_common::{Concentration, DataSource};
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    fn perfume(brand: &str, name: &str) -> Perfume {
        Perfume::new(brand, name, Concentration::Edt, DataSource::Fragella)
    }

    fn user() -> Actor {
        Actor::User(UserId("u1".to_string()))
    }

    #[tokio::test]
    async fn test_save_recomputes_ids() {
        let db = open_in_memory().await.unwrap();
        let service = CatalogService::new(db, None);

        let mut p = perfume("Dior", "Sauvage");
        p.id = "provider-123".to_string();
        let saved = service.save_perfumes(vec![p], &Actor::Local).await.unwrap();
        assert_eq!(saved[0].id, "dior-sauvage-edt");
        assert!(service.perfume("dior-sauvage-edt").await.is_ok());
    }

    #[tokio::test]
    async fn test_save_stores_canonical_record() {
        let db = open_in_memory().await.unwrap();
        let service = CatalogService::new(db, None);

        let mut p = perfume("Dior", "Sauvage");
        p.rating = 9.5;
        p.longevity = 200;
        p.season_scores = vec![niche_common::SeasonScore {
            season: niche_common::Season::Summer,
            score: 250,
        }];
        service.save_perfumes(vec![p], &Actor::Local).await.unwrap();

        let stored = service.perfume("dior-sauvage-edt").await.unwrap();
        assert_eq!(stored.rating, 5.0);
        assert_eq!(stored.longevity, 10);
        assert_eq!(stored.season_scores.len(), 4);
        assert_eq!(stored.season_score(niche_common::Season::Summer), 100);
        assert_eq!(stored.occasion_scores.len(), 5);
    }

    #[tokio::test]
    async fn test_save_rejects_empty_identity() {
        let db = open_in_memory().await.unwrap();
        let service = CatalogService::new(db, None);
        let mut p = perfume("", "");
        p.concentration = Concentration::Other;
        let result = service.save_perfumes(vec![p], &Actor::Local).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_add_is_idempotent_and_requires_catalog() {
        let db = open_in_memory().await.unwrap();
        let service = CatalogService::new(db, None);
        service
            .save_perfumes(vec![perfume("Dior", "Sauvage")], &Actor::Local)
            .await
            .unwrap();

        let first = service
            .add_to_collection("dior-sauvage-edt", true, &Actor::Local)
            .await
            .unwrap();
        assert!(first.is_some());
        let second = service
            .add_to_collection("dior-sauvage-edt", false, &Actor::Local)
            .await
            .unwrap();
        assert!(second.is_none());
        assert!(service.collection_view().await.unwrap()[0].collection_data.owned);

        let missing = service.add_to_collection("nope", true, &Actor::Local).await;
        assert!(matches!(missing, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_rating_out_of_range_rejected() {
        let db = open_in_memory().await.unwrap();
        let service = CatalogService::new(db, None);
        let changes = CollectionUpdate {
            personal_rating: Some(7.5),
            ..Default::default()
        };
        let result = service.update_collection_entry("x", &changes, &Actor::Local).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_user_mutations_propagate_local_ones_do_not() {
        let db = open_in_memory().await.unwrap();
        let remote = Arc::new(MemoryRemote::default());
        let (queue, _handle) = PropagationQueue::spawn(remote.clone(), None);
        let service = CatalogService::new(db, Some(queue.clone()));
        let uid = UserId("u1".to_string());

        service
            .save_perfumes(vec![perfume("Creed", "Aventus")], &Actor::Local)
            .await
            .unwrap();
        service
            .save_perfumes(vec![perfume("Dior", "Sauvage")], &user())
            .await
            .unwrap();
        service
            .add_to_collection("dior-sauvage-edt", true, &user())
            .await
            .unwrap();
        queue.wait_idle().await;

        let names: Vec<_> = remote.perfumes(&uid).await.into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Sauvage".to_string()]);
        assert_eq!(remote.collection(&uid).await.len(), 1);

        service
            .remove_from_collection("dior-sauvage-edt", &user())
            .await
            .unwrap();
        queue.wait_idle().await;
        assert!(remote.collection(&uid).await.is_empty());
    }

    #[tokio::test]
    async fn test_remote_failure_keeps_local_state() {
        let db = open_in_memory().await.unwrap();
        let remote = Arc::new(MemoryRemote::default());
        remote.fail.store(true, Ordering::SeqCst);
        let (queue, _handle) = PropagationQueue::spawn(remote, None);
        let service = CatalogService::new(db, Some(queue.clone()));

        service
            .save_perfumes(vec![perfume("Dior", "Sauvage")], &user())
            .await
            .unwrap();
        queue.wait_idle().await;

        assert_eq!(service.all_perfumes().await.unwrap().len(), 1);
        assert_eq!(queue.failures().await.len(), 1);
    }

    #[tokio::test]
    async fn test_shelf_and_stats() {
        let db = open_in_memory().await.unwrap();
        let service = CatalogService::new(db, None);
        let mut good = perfume("Dior", "Sauvage");
        good.rating = 4.5;
        let mut meh = perfume("Zara", "Basic");
        meh.rating = 3.0;
        service.save_perfumes(vec![good, meh], &Actor::Local).await.unwrap();
        service.add_to_collection("dior-sauvage-edt", true, &Actor::Local).await.unwrap();
        service.add_to_collection("zara-basic-edt", false, &Actor::Local).await.unwrap();

        let top = service.shelf(Shelf::TopRated).await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].perfume.name, "Sauvage");

        let stats = service.stats().await.unwrap();
        assert_eq!(stats.total_in_collection, 1);
        assert_eq!(stats.total_wishlist, 1);
        assert_eq!(stats.total_catalog, 2);
        assert_eq!(stats.avg_rating, 4.5);
    }
}
