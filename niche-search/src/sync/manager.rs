//! Login/logout sync lifecycle and change-feed listeners

use super::merge::{merge_catalog, merge_collection};
use super::propagation::{OpKey, PropagationQueue};
use super::{RemoteSnapshot, RemoteStore, SyncError, UserId};
use niche_common::db::{catalog, collection};
use niche_common::{CollectionEntry, DataSource, Perfume};
use serde::Serialize;
use sqlx::{Pool, Sqlite};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Counts from a login merge
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub user_id: UserId,
    pub catalog_records: usize,
    pub collection_entries: usize,
    /// False when the merged state could not be written back to the remote
    pub remote_updated: bool,
    /// True when the remote change feed is being applied
    pub listening: bool,
}

struct ActiveListener {
    user: UserId,
    handle: JoinHandle<()>,
}

pub struct SyncManager {
    db: Pool<Sqlite>,
    remote: Arc<dyn RemoteStore>,
    propagation: Option<PropagationQueue>,
    listener: Mutex<Option<ActiveListener>>,
}

impl SyncManager {
    pub fn new(db: Pool<Sqlite>, remote: Arc<dyn RemoteStore>) -> Self {
        Self {
            db,
            remote,
            propagation: None,
            listener: Mutex::new(None),
        }
    }

    /// Protect records with queued or failed remote writes from snapshots
    pub fn with_propagation(mut self, queue: PropagationQueue) -> Self {
        self.propagation = Some(queue);
        self
    }

    pub fn remote(&self) -> Arc<dyn RemoteStore> {
        Arc::clone(&self.remote)
    }

    /// User whose change feed is currently applied, if any
    pub async fn active_user(&self) -> Option<UserId> {
        self.listener.lock().await.as_ref().map(|l| l.user.clone())
    }

    /// Merge remote and local state, then follow the remote change feed
    ///
    /// Fetch failures abort before anything is written. The local write must
    /// succeed; the remote write-back is best-effort. When the write-back
    /// fails the change feed is not followed, since its snapshots would not
    /// contain the merged local records.
    pub async fn sync_on_login(&self, user: &UserId) -> Result<SyncReport, SyncError> {
        info!(user = %user, "Starting login sync");

        let remote_perfumes = self.remote.fetch_perfumes(user).await?;
        let remote_collection = self.remote.fetch_collection(user).await?;

        let local_perfumes = catalog::get_all_except(&self.db, DataSource::Seed).await?;
        let local_collection = collection::get_all(&self.db).await?;

        let perfumes = merge_catalog(local_perfumes, remote_perfumes);
        let entries = merge_collection(local_collection, remote_collection);

        catalog::put_many(&self.db, &perfumes).await?;
        collection::put_many(&self.db, &entries).await?;

        let remote_updated = match self.write_back(user, &perfumes, &entries).await {
            Ok(()) => true,
            Err(e) => {
                warn!(user = %user, error = %e, "Remote write-back failed; local merge kept");
                false
            }
        };

        let listening = if remote_updated {
            self.start_listener(user).await?;
            true
        } else {
            self.sync_on_logout().await;
            false
        };

        info!(
            user = %user,
            catalog = perfumes.len(),
            collection = entries.len(),
            remote_updated,
            listening,
            "Login sync complete"
        );
        Ok(SyncReport {
            user_id: user.clone(),
            catalog_records: perfumes.len(),
            collection_entries: entries.len(),
            remote_updated,
            listening,
        })
    }

    /// Stop following the remote; local data stays
    pub async fn sync_on_logout(&self) {
        if let Some(listener) = self.listener.lock().await.take() {
            listener.handle.abort();
            info!(user = %listener.user, "Sync listeners stopped");
        }
    }

    async fn write_back(
        &self,
        user: &UserId,
        perfumes: &[Perfume],
        entries: &[CollectionEntry],
    ) -> Result<(), SyncError> {
        self.remote.bulk_write_perfumes(user, perfumes).await?;
        self.remote.bulk_write_collection(user, entries).await
    }

    async fn start_listener(&self, user: &UserId) -> Result<(), SyncError> {
        let mut slot = self.listener.lock().await;
        if let Some(previous) = slot.take() {
            previous.handle.abort();
        }

        let mut feed = self.remote.subscribe(user).await?;
        let db = self.db.clone();
        let propagation = self.propagation.clone();
        let listener_user = user.clone();
        let handle = tokio::spawn(async move {
            while let Some(snapshot) = feed.recv().await {
                let unsettled = propagation
                    .as_ref()
                    .map(|queue| queue.unsettled_keys(&listener_user))
                    .unwrap_or_default();
                if let Err(e) = apply_snapshot(&db, snapshot, &unsettled).await {
                    warn!(user = %listener_user, error = %e, "Failed to apply remote snapshot");
                }
            }
            debug!(user = %listener_user, "Remote change feed closed");
        });

        *slot = Some(ActiveListener {
            user: user.clone(),
            handle,
        });
        Ok(())
    }
}

/// Apply one remote snapshot to the local store
///
/// Catalog snapshots upsert. Collection snapshots upsert and also delete
/// local entries the snapshot no longer contains. Records in `unsettled`
/// have local changes the remote has not acknowledged and are left alone.
pub async fn apply_snapshot(
    db: &Pool<Sqlite>,
    snapshot: RemoteSnapshot,
    unsettled: &HashSet<OpKey>,
) -> niche_common::Result<()> {
    match snapshot {
        RemoteSnapshot::Catalog(perfumes) => {
            let incoming: Vec<Perfume> = perfumes
                .into_iter()
                .filter(|p| !unsettled.contains(&OpKey::Perfume(p.id.clone())))
                .collect();
            catalog::put_many(db, &incoming).await?;
            debug!(count = incoming.len(), "Applied remote catalog snapshot");
        }
        RemoteSnapshot::Collection(entries) => {
            let pending = |id: &str| unsettled.contains(&OpKey::Collection(id.to_string()));
            let keep: HashSet<&str> = entries.iter().map(|e| e.perfume_id.as_str()).collect();
            let mut removed = 0;
            for local in collection::get_all(db).await? {
                if !keep.contains(local.perfume_id.as_str()) && !pending(&local.perfume_id) {
                    collection::remove(db, &local.perfume_id).await?;
                    removed += 1;
                }
            }
            let incoming: Vec<CollectionEntry> =
                entries.into_iter().filter(|e| !pending(&e.perfume_id)).collect();
            collection::put_many(db, &incoming).await?;
            debug!(count = incoming.len(), removed, "Applied remote collection snapshot");
        }
    }
    Ok(())
}
