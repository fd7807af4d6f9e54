//! REST remote store
//!
//! JSON over HTTP against `{base}/users/{uid}/perfumes` and
//! `{base}/users/{uid}/collection`. The change feed is a poller that
//! re-fetches both tables every interval and emits a snapshot whenever a
//! table differs from the last one seen.

use super::{RemoteSnapshot, RemoteStore, SyncError, UserId};
use async_trait::async_trait;
use niche_common::{CollectionEntry, Perfume};
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Default change-feed polling interval
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const FEED_CAPACITY: usize = 16;

#[derive(Clone)]
pub struct RestRemoteStore {
    http_client: Client,
    base_url: Url,
    poll_interval: Duration,
}

impl RestRemoteStore {
    pub fn new(base_url: &str, poll_interval: Duration) -> Result<Self, SyncError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| SyncError::Config(format!("sync_url {}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(SyncError::Config(format!("sync_url {} cannot be a base URL", base_url)));
        }
        if poll_interval.is_zero() {
            return Err(SyncError::Config("sync_poll_interval_secs must be at least 1".to_string()));
        }

        let http_client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SyncError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url,
            poll_interval,
        })
    }

    fn url(&self, user: &UserId, segments: &[&str]) -> Result<Url, SyncError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SyncError::Config(format!("sync_url {} cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .push("users")
            .push(user.as_str())
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, SyncError> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| SyncError::Network(e.to_string()))?;
        let response = check_status(response).await?;
        response.json::<T>().await.map_err(|e| SyncError::Parse(e.to_string()))
    }

    async fn put_json<T: Serialize + ?Sized>(&self, url: Url, body: &T) -> Result<(), SyncError> {
        let response = self
            .http_client
            .put(url)
            .json(body)
            .send()
            .await
            .map_err(|e| SyncError::Network(e.to_string()))?;
        check_status(response).await?;
        Ok(())
    }
}

async fn check_status(response: Response) -> Result<Response, SyncError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(SyncError::Api {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl RemoteStore for RestRemoteStore {
    async fn fetch_perfumes(&self, user: &UserId) -> Result<Vec<Perfume>, SyncError> {
        self.get_json(self.url(user, &["perfumes"])?).await
    }

    async fn fetch_collection(&self, user: &UserId) -> Result<Vec<CollectionEntry>, SyncError> {
        self.get_json(self.url(user, &["collection"])?).await
    }

    async fn bulk_write_perfumes(&self, user: &UserId, perfumes: &[Perfume]) -> Result<(), SyncError> {
        self.put_json(self.url(user, &["perfumes"])?, perfumes).await
    }

    async fn bulk_write_collection(
        &self,
        user: &UserId,
        entries: &[CollectionEntry],
    ) -> Result<(), SyncError> {
        self.put_json(self.url(user, &["collection"])?, entries).await
    }

    async fn put_perfume(&self, user: &UserId, perfume: &Perfume) -> Result<(), SyncError> {
        self.put_json(self.url(user, &["perfumes", perfume.id.as_str()])?, perfume)
            .await
    }

    async fn put_collection_entry(&self, user: &UserId, entry: &CollectionEntry) -> Result<(), SyncError> {
        self.put_json(self.url(user, &["collection", entry.perfume_id.as_str()])?, entry)
            .await
    }

    async fn delete_collection_entry(&self, user: &UserId, perfume_id: &str) -> Result<(), SyncError> {
        let response = self
            .http_client
            .delete(self.url(user, &["collection", perfume_id])?)
            .send()
            .await
            .map_err(|e| SyncError::Network(e.to_string()))?;
        check_status(response).await?;
        Ok(())
    }

    async fn subscribe(&self, user: &UserId) -> Result<mpsc::Receiver<RemoteSnapshot>, SyncError> {
        let (tx, rx) = mpsc::channel(FEED_CAPACITY);
        let store = Arc::new(self.clone());
        let user = user.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(store.poll_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            let mut last_catalog: Option<Vec<Perfume>> = None;
            let mut last_collection: Option<Vec<CollectionEntry>> = None;

            loop {
                ticker.tick().await;
                if tx.is_closed() {
                    break;
                }

                match store.fetch_perfumes(&user).await {
                    Ok(perfumes) if last_catalog.as_ref() != Some(&perfumes) => {
                        last_catalog = Some(perfumes.clone());
                        if tx.send(RemoteSnapshot::Catalog(perfumes)).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => warn!(user = %user, error = %e, "Catalog poll failed"),
                }

                match store.fetch_collection(&user).await {
                    Ok(entries) if last_collection.as_ref() != Some(&entries) => {
                        last_collection = Some(entries.clone());
                        if tx.send(RemoteSnapshot::Collection(entries)).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => warn!(user = %user, error = %e, "Collection poll failed"),
                }
            }
            debug!(user = %user, "Remote poller stopped");
        });

        Ok(rx)
    }
}
