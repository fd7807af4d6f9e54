//! Remote synchronization
//!
//! The remote store holds one namespace per user with a catalog and a
//! collection. Local storage stays authoritative for reads; the remote is
//! merged in on login, written to after each user mutation, and watched for
//! changes from other devices.

pub mod manager;
pub mod merge;
pub mod propagation;
pub mod rest;

pub use manager::{SyncManager, SyncReport};
pub use propagation::{FailureHook, OpKey, PropagationFailure, PropagationQueue, SyncOp};
pub use rest::{RestRemoteStore, DEFAULT_POLL_INTERVAL};

use async_trait::async_trait;
use niche_common::{CollectionEntry, Perfume};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

/// Remote namespace owner
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sync errors
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Remote request failed: {0}")]
    Network(String),

    #[error("Remote returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Remote response unreadable: {0}")]
    Parse(String),

    #[error("Invalid remote configuration: {0}")]
    Config(String),

    #[error("Local store error: {0}")]
    Local(#[from] niche_common::Error),
}

/// Full state of one remote table, pushed by a subscription
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteSnapshot {
    Catalog(Vec<Perfume>),
    Collection(Vec<CollectionEntry>),
}

/// Remote store contract
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn fetch_perfumes(&self, user: &UserId) -> Result<Vec<Perfume>, SyncError>;

    async fn fetch_collection(&self, user: &UserId) -> Result<Vec<CollectionEntry>, SyncError>;

    async fn bulk_write_perfumes(&self, user: &UserId, perfumes: &[Perfume]) -> Result<(), SyncError>;

    async fn bulk_write_collection(
        &self,
        user: &UserId,
        entries: &[CollectionEntry],
    ) -> Result<(), SyncError>;

    async fn put_perfume(&self, user: &UserId, perfume: &Perfume) -> Result<(), SyncError>;

    async fn put_collection_entry(&self, user: &UserId, entry: &CollectionEntry) -> Result<(), SyncError>;

    async fn delete_collection_entry(&self, user: &UserId, perfume_id: &str) -> Result<(), SyncError>;

    /// Change feed for one user; the feed ends when the receiver is dropped
    async fn subscribe(&self, user: &UserId) -> Result<mpsc::Receiver<RemoteSnapshot>, SyncError>;
}

// ============================================================================
// In-memory remote for tests
// ============================================================================

#[cfg(test)]
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct Namespace {
        perfumes: Vec<Perfume>,
        collection: Vec<CollectionEntry>,
    }

    /// Remote store kept in memory; can be told to fail every call
    #[derive(Default)]
    pub struct MemoryRemote {
        namespaces: Mutex<HashMap<UserId, Namespace>>,
        subscribers: Mutex<Vec<(UserId, mpsc::Sender<RemoteSnapshot>)>>,
        pub fail: std::sync::atomic::AtomicBool,
    }

    impl MemoryRemote {
        fn check(&self) -> Result<(), SyncError> {
            if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
                Err(SyncError::Network("remote offline".to_string()))
            } else {
                Ok(())
            }
        }

        pub async fn seed(&self, user: &UserId, perfumes: Vec<Perfume>, collection: Vec<CollectionEntry>) {
            let mut map = self.namespaces.lock().await;
            let ns = map.entry(user.clone()).or_default();
            ns.perfumes = perfumes;
            ns.collection = collection;
        }

        pub async fn perfumes(&self, user: &UserId) -> Vec<Perfume> {
            let map = self.namespaces.lock().await;
            map.get(user).map(|ns| ns.perfumes.clone()).unwrap_or_default()
        }

        pub async fn collection(&self, user: &UserId) -> Vec<CollectionEntry> {
            let map = self.namespaces.lock().await;
            map.get(user).map(|ns| ns.collection.clone()).unwrap_or_default()
        }

        /// Push a snapshot to every subscriber of `user`
        pub async fn emit(&self, user: &UserId, snapshot: RemoteSnapshot) {
            let subs = self.subscribers.lock().await;
            for (owner, tx) in subs.iter() {
                if owner == user {
                    let _ = tx.send(snapshot.clone()).await;
                }
            }
        }
    }

    #[async_trait]
    impl RemoteStore for MemoryRemote {
        async fn fetch_perfumes(&self, user: &UserId) -> Result<Vec<Perfume>, SyncError> {
            self.check()?;
            Ok(self.perfumes(user).await)
        }

        async fn fetch_collection(&self, user: &UserId) -> Result<Vec<CollectionEntry>, SyncError> {
            self.check()?;
            Ok(self.collection(user).await)
        }

        async fn bulk_write_perfumes(&self, user: &UserId, perfumes: &[Perfume]) -> Result<(), SyncError> {
            self.check()?;
            for perfume in perfumes {
                self.put_perfume(user, perfume).await?;
            }
            Ok(())
        }

        async fn bulk_write_collection(
            &self,
            user: &UserId,
            entries: &[CollectionEntry],
        ) -> Result<(), SyncError> {
            self.check()?;
            for entry in entries {
                self.put_collection_entry(user, entry).await?;
            }
            Ok(())
        }

        async fn put_perfume(&self, user: &UserId, perfume: &Perfume) -> Result<(), SyncError> {
            self.check()?;
            let mut map = self.namespaces.lock().await;
            let ns = map.entry(user.clone()).or_default();
            ns.perfumes.retain(|p| p.id != perfume.id);
            ns.perfumes.push(perfume.clone());
            Ok(())
        }

        async fn put_collection_entry(&self, user: &UserId, entry: &CollectionEntry) -> Result<(), SyncError> {
            self.check()?;
            let mut map = self.namespaces.lock().await;
            let ns = map.entry(user.clone()).or_default();
            ns.collection.retain(|e| e.perfume_id != entry.perfume_id);
            ns.collection.push(entry.clone());
            Ok(())
        }

        async fn delete_collection_entry(&self, user: &UserId, perfume_id: &str) -> Result<(), SyncError> {
            self.check()?;
            let mut map = self.namespaces.lock().await;
            if let Some(ns) = map.get_mut(user) {
                ns.collection.retain(|e| e.perfume_id != perfume_id);
            }
            Ok(())
        }

        async fn subscribe(&self, user: &UserId) -> Result<mpsc::Receiver<RemoteSnapshot>, SyncError> {
            self.check()?;
            let (tx, rx) = mpsc::channel(16);
            self.subscribers.lock().await.push((user.clone(), tx));
            Ok(rx)
        }
    }
}
