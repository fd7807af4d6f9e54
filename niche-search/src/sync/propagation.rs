//! Background propagation of local mutations to the remote store
//!
//! Local writes commit first; the matching remote write is queued here and
//! applied by a worker task. A failed remote write is logged, kept for
//! [`PropagationQueue::retry_failed`] and reported to the failure hook. It
//! never rolls back local state.
//!
//! Every task carries a per-queue sequence number. Only the newest task for a
//! given record is ever applied: an older task that reaches the worker after a
//! newer one was queued is skipped, and queuing a new write drops any recorded
//! failure for the same record. A retry can therefore never replay a stale
//! write over a newer one.

use super::{RemoteStore, UserId};
use niche_common::{CollectionEntry, Perfume};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

/// Most failures kept for retry; the oldest is dropped beyond this
pub const MAX_RECORDED_FAILURES: usize = 256;

/// One remote write
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOp {
    PutPerfume(Perfume),
    PutCollectionEntry(CollectionEntry),
    DeleteCollectionEntry(String),
}

impl SyncOp {
    fn label(&self) -> &'static str {
        match self {
            SyncOp::PutPerfume(_) => "put_perfume",
            SyncOp::PutCollectionEntry(_) => "put_collection_entry",
            SyncOp::DeleteCollectionEntry(_) => "delete_collection_entry",
        }
    }

    /// Remote record this op writes
    pub fn key(&self) -> OpKey {
        match self {
            SyncOp::PutPerfume(perfume) => OpKey::Perfume(perfume.id.clone()),
            SyncOp::PutCollectionEntry(entry) => OpKey::Collection(entry.perfume_id.clone()),
            SyncOp::DeleteCollectionEntry(id) => OpKey::Collection(id.clone()),
        }
    }
}

/// Remote record addressed by a [`SyncOp`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OpKey {
    Perfume(String),
    Collection(String),
}

#[derive(Debug, Clone)]
pub struct PropagationTask {
    pub id: Uuid,
    pub user: UserId,
    pub op: SyncOp,
    pub attempts: u32,
    /// Queue order; higher is newer
    pub seq: u64,
}

impl PropagationTask {
    fn key(&self) -> TaskKey {
        (self.user.clone(), self.op.key())
    }
}

#[derive(Debug, Clone)]
pub struct PropagationFailure {
    pub task: PropagationTask,
    pub error: String,
}

/// Called once per failed remote write
pub type FailureHook = Arc<dyn Fn(&PropagationFailure) + Send + Sync>;

type TaskKey = (UserId, OpKey);

/// Per-record bookkeeping, guarded by one lock
#[derive(Default)]
struct Ledger {
    next_seq: u64,
    latest: HashMap<TaskKey, u64>,
    in_flight: HashMap<TaskKey, usize>,
    failed: Vec<PropagationFailure>,
}

impl Ledger {
    fn start(&mut self, key: &TaskKey) {
        *self.in_flight.entry(key.clone()).or_insert(0) += 1;
    }

    fn settle(&mut self, key: &TaskKey) {
        if let Some(count) = self.in_flight.get_mut(key) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.in_flight.remove(key);
            }
        }
    }

    fn is_current(&self, task: &PropagationTask) -> bool {
        self.latest.get(&task.key()).map_or(true, |&seq| seq == task.seq)
    }

    /// Keep at most one failure per record, newest wins
    fn record(&mut self, failure: PropagationFailure) {
        let key = failure.task.key();
        self.failed.retain(|f| f.task.key() != key);
        self.failed.push(failure);
        if self.failed.len() > MAX_RECORDED_FAILURES {
            let dropped = self.failed.remove(0);
            warn!(
                task_id = %dropped.task.id,
                op = dropped.task.op.label(),
                user = %dropped.task.user,
                "Failure list full; dropping oldest"
            );
        }
    }
}

#[derive(Default)]
struct QueueState {
    ledger: Mutex<Ledger>,
    pending: AtomicUsize,
    idle: Notify,
}

impl QueueState {
    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record_failure(&self, failure: PropagationFailure, hook: Option<&FailureHook>) {
        let key = failure.task.key();
        if let Some(hook) = hook {
            hook(&failure);
        }
        let mut ledger = self.ledger();
        if ledger.is_current(&failure.task) {
            ledger.record(failure);
        }
        ledger.settle(&key);
    }

    fn record_success(&self, task: &PropagationTask) {
        let key = task.key();
        let mut ledger = self.ledger();
        ledger.failed.retain(|f| f.task.key() != key || f.task.seq > task.seq);
        ledger.settle(&key);
    }

    fn finish_one(&self) {
        if self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }
}

/// Handle to the propagation worker; cheap to clone
#[derive(Clone)]
pub struct PropagationQueue {
    sender: mpsc::UnboundedSender<PropagationTask>,
    state: Arc<QueueState>,
    hook: Option<FailureHook>,
}

impl PropagationQueue {
    /// Start the worker task
    pub fn spawn(remote: Arc<dyn RemoteStore>, hook: Option<FailureHook>) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::unbounded_channel::<PropagationTask>();
        let state = Arc::new(QueueState::default());

        let worker_state = Arc::clone(&state);
        let worker_hook = hook.clone();
        let handle = tokio::spawn(async move {
            while let Some(mut task) = receiver.recv().await {
                let current = {
                    let mut ledger = worker_state.ledger();
                    let current = ledger.is_current(&task);
                    if !current {
                        ledger.settle(&task.key());
                    }
                    current
                };
                if !current {
                    debug!(task_id = %task.id, op = task.op.label(), user = %task.user, "Superseded; skipped");
                    worker_state.finish_one();
                    continue;
                }
                task.attempts += 1;
                match apply(remote.as_ref(), &task).await {
                    Ok(()) => {
                        debug!(task_id = %task.id, op = task.op.label(), user = %task.user, "Propagated");
                        worker_state.record_success(&task);
                    }
                    Err(e) => {
                        warn!(
                            task_id = %task.id,
                            op = task.op.label(),
                            user = %task.user,
                            attempts = task.attempts,
                            error = %e,
                            "Remote propagation failed; local state kept"
                        );
                        let failure = PropagationFailure {
                            task,
                            error: e.to_string(),
                        };
                        worker_state.record_failure(failure, worker_hook.as_ref());
                    }
                }
                worker_state.finish_one();
            }
            debug!("Propagation worker stopped");
        });

        (Self { sender, state, hook }, handle)
    }

    /// Queue a remote write for `user`
    pub async fn enqueue(&self, user: UserId, op: SyncOp) {
        let task = {
            let mut ledger = self.state.ledger();
            ledger.next_seq += 1;
            let task = PropagationTask {
                id: Uuid::new_v4(),
                user,
                op,
                attempts: 0,
                seq: ledger.next_seq,
            };
            let key = task.key();
            ledger.latest.insert(key.clone(), task.seq);
            ledger.failed.retain(|f| f.task.key() != key);
            ledger.start(&key);
            task
        };
        self.submit(task);
    }

    fn submit(&self, task: PropagationTask) {
        self.state.pending.fetch_add(1, Ordering::AcqRel);
        if let Err(mpsc::error::SendError(task)) = self.sender.send(task) {
            warn!(task_id = %task.id, "Propagation worker gone; recording failure");
            let failure = PropagationFailure {
                task,
                error: "propagation worker stopped".to_string(),
            };
            self.state.record_failure(failure, self.hook.as_ref());
            self.state.finish_one();
        }
    }

    /// Failures recorded so far, oldest first
    pub async fn failures(&self) -> Vec<PropagationFailure> {
        self.state.ledger().failed.clone()
    }

    /// Re-queue every recorded failure; returns how many were re-queued
    pub async fn retry_failed(&self) -> usize {
        let failed = {
            let mut ledger = self.state.ledger();
            let failed = std::mem::take(&mut ledger.failed);
            for failure in &failed {
                ledger.start(&failure.task.key());
            }
            failed
        };
        let count = failed.len();
        for failure in failed {
            self.submit(failure.task);
        }
        count
    }

    /// Records of `user` with a remote write still queued or failed
    ///
    /// Remote snapshots must not overwrite these locally; the remote has not
    /// seen the local change yet.
    pub fn unsettled_keys(&self, user: &UserId) -> HashSet<OpKey> {
        let ledger = self.state.ledger();
        let mut keys: HashSet<OpKey> = ledger
            .in_flight
            .keys()
            .filter(|(owner, _)| owner == user)
            .map(|(_, key)| key.clone())
            .collect();
        keys.extend(
            ledger
                .failed
                .iter()
                .filter(|f| &f.task.user == user)
                .map(|f| f.task.op.key()),
        );
        keys
    }

    /// Wait until every queued task has been attempted
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.state.idle.notified();
            if self.state.pending.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }
}

async fn apply(remote: &dyn RemoteStore, task: &PropagationTask) -> Result<(), super::SyncError> {
    match &task.op {
        SyncOp::PutPerfume(perfume) => remote.put_perfume(&task.user, perfume).await,
        SyncOp::PutCollectionEntry(entry) => remote.put_collection_entry(&task.user, entry).await,
        SyncOp::DeleteCollectionEntry(id) => remote.delete_collection_entry(&task.user, id).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::memory::MemoryRemote;
    use std::sync::atomic::AtomicBool;

    fn user() -> UserId {
        UserId("u1".to_string())
    }

    #[tokio::test]
    async fn test_applies_in_order() {
        let remote = Arc::new(MemoryRemote::default());
        let (queue, _handle) = PropagationQueue::spawn(remote.clone(), None);

        queue
            .enqueue(user(), SyncOp::PutCollectionEntry(CollectionEntry::new("a", true)))
            .await;
        queue.enqueue(user(), SyncOp::DeleteCollectionEntry("a".into())).await;
        queue
            .enqueue(user(), SyncOp::PutCollectionEntry(CollectionEntry::new("b", false)))
            .await;
        queue.wait_idle().await;

        let ids: Vec<_> = remote.collection(&user()).await.into_iter().map(|e| e.perfume_id).collect();
        assert_eq!(ids, vec!["b".to_string()]);
        assert!(queue.failures().await.is_empty());
        assert!(queue.unsettled_keys(&user()).is_empty());
    }

    #[tokio::test]
    async fn test_failure_recorded_hooked_and_retried() {
        let remote = Arc::new(MemoryRemote::default());
        remote.fail.store(true, Ordering::SeqCst);

        let hooked = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&hooked);
        let hook: FailureHook = Arc::new(move |_f: &PropagationFailure| flag.store(true, Ordering::SeqCst));
        let (queue, _handle) = PropagationQueue::spawn(remote.clone(), Some(hook));

        queue
            .enqueue(user(), SyncOp::PutCollectionEntry(CollectionEntry::new("a", true)))
            .await;
        queue.wait_idle().await;

        let failures = queue.failures().await;
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].task.attempts, 1);
        assert!(hooked.load(Ordering::SeqCst));
        assert_eq!(
            queue.unsettled_keys(&user()),
            HashSet::from([OpKey::Collection("a".to_string())])
        );

        remote.fail.store(false, Ordering::SeqCst);
        assert_eq!(queue.retry_failed().await, 1);
        queue.wait_idle().await;

        assert!(queue.failures().await.is_empty());
        assert!(queue.unsettled_keys(&user()).is_empty());
        assert_eq!(remote.collection(&user()).await.len(), 1);
    }

    #[tokio::test]
    async fn test_retry_never_replays_over_newer_write() {
        let remote = Arc::new(MemoryRemote::default());
        let (queue, _handle) = PropagationQueue::spawn(remote.clone(), None);

        remote.fail.store(true, Ordering::SeqCst);
        queue
            .enqueue(user(), SyncOp::PutCollectionEntry(CollectionEntry::new("a", true)))
            .await;
        queue.wait_idle().await;
        assert_eq!(queue.failures().await.len(), 1);

        remote.fail.store(false, Ordering::SeqCst);
        queue.enqueue(user(), SyncOp::DeleteCollectionEntry("a".into())).await;
        queue.wait_idle().await;

        // The delete superseded the failed add
        assert!(queue.failures().await.is_empty());
        assert_eq!(queue.retry_failed().await, 0);
        queue.wait_idle().await;
        assert!(remote.collection(&user()).await.is_empty());
    }

    #[tokio::test]
    async fn test_stale_retry_is_skipped() {
        let remote = Arc::new(MemoryRemote::default());
        let (queue, _handle) = PropagationQueue::spawn(remote.clone(), None);

        remote.fail.store(true, Ordering::SeqCst);
        queue
            .enqueue(user(), SyncOp::PutCollectionEntry(CollectionEntry::new("a", true)))
            .await;
        queue.wait_idle().await;
        remote.fail.store(false, Ordering::SeqCst);

        // Retry and a newer delete race through the same worker
        assert_eq!(queue.retry_failed().await, 1);
        queue.enqueue(user(), SyncOp::DeleteCollectionEntry("a".into())).await;
        queue.wait_idle().await;

        assert!(remote.collection(&user()).await.is_empty());
        assert!(queue.failures().await.is_empty());
    }

    #[tokio::test]
    async fn test_failures_coalesce_per_record_and_stay_bounded() {
        let remote = Arc::new(MemoryRemote::default());
        remote.fail.store(true, Ordering::SeqCst);
        let (queue, _handle) = PropagationQueue::spawn(remote.clone(), None);

        for owned in [true, false, true] {
            queue
                .enqueue(user(), SyncOp::PutCollectionEntry(CollectionEntry::new("a", owned)))
                .await;
        }
        queue.wait_idle().await;
        assert_eq!(queue.failures().await.len(), 1);

        for i in 0..MAX_RECORDED_FAILURES + 10 {
            queue
                .enqueue(user(), SyncOp::DeleteCollectionEntry(format!("id-{i}")))
                .await;
        }
        queue.wait_idle().await;

        let failures = queue.failures().await;
        assert_eq!(failures.len(), MAX_RECORDED_FAILURES);
        // Oldest dropped first
        assert!(failures.iter().all(|f| f.task.op.key() != OpKey::Collection("a".to_string())));
    }
}
