//! Default replication dispatcher.
//!
//! `sync()` records the latest action per [`DistroKey`] and, if the key was
//! not already pending, queues the key to one worker picked by key hash.
//! Pending submissions for the same key coalesce, last action wins.
//!
//! A worker, when it gets to the key, takes the pending action, reads the
//! current datum and pushes it to every peer concurrently. Each peer push is
//! retried with backoff and bounded by the submission's timeout budget.
//! Failures are logged and counted; divergence left behind is repaired by
//! anti-entropy, not here.

use std::collections::hash_map::DefaultHasher;
use std::hash::Hash;
use std::hash::Hasher;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::future::join_all;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::debug;
use tracing::info;
use tracing::trace;
use tracing::warn;

use super::DistroData;
use super::DistroDataStorage;
use super::DistroKey;
use super::DistroProtocol;
use super::DistroTransport;
use crate::async_task::spawn_task;
use crate::async_task::task_with_timeout_and_exponential_backoff;
use crate::metrics;
use crate::ApplyAction;
use crate::BackoffPolicy;
use crate::DistroConfig;
use crate::Error;
use crate::ReplicationError;
use crate::Result;

#[derive(Debug, Clone, Copy)]
struct PendingSync {
    action: ApplyAction,
    budget: Duration,
}

pub struct DistroSyncEngine<T>
where
    T: DistroTransport,
{
    node_id: u32,
    retry: BackoffPolicy,
    transport: Arc<T>,
    storage: Arc<dyn DistroDataStorage>,

    pending: DashMap<DistroKey, PendingSync>,
    worker_txs: Vec<mpsc::UnboundedSender<DistroKey>>,
    /// Taken by `start`
    worker_rxs: Mutex<Vec<mpsc::UnboundedReceiver<DistroKey>>>,
}

impl<T> std::fmt::Debug for DistroSyncEngine<T>
where
    T: DistroTransport,
{
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("DistroSyncEngine")
            .field("node_id", &self.node_id)
            .field("workers", &self.worker_txs.len())
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

impl<T> DistroProtocol for DistroSyncEngine<T>
where
    T: DistroTransport,
{
    fn sync(
        &self,
        key: DistroKey,
        action: ApplyAction,
        timeout: Duration,
    ) {
        let pending = PendingSync {
            action,
            budget: timeout,
        };
        if self.pending.insert(key.clone(), pending).is_some() {
            metrics::SYNC_TASKS_COALESCED.inc();
            trace!(%key, ?action, "sync already pending, merged");
            return;
        }

        let worker = self.worker_for(&key);
        if self.worker_txs[worker].send(key.clone()).is_err() {
            self.pending.remove(&key);
            warn!("{}", ReplicationError::EngineStopped(key.to_string()));
            return;
        }
        metrics::SYNC_TASKS_SCHEDULED.inc();
    }
}

impl<T> DistroSyncEngine<T>
where
    T: DistroTransport,
{
    pub fn new(
        config: &DistroConfig,
        transport: Arc<T>,
        storage: Arc<dyn DistroDataStorage>,
    ) -> Self {
        let worker_count = config.sync.worker_count.max(1);
        let (worker_txs, worker_rxs): (Vec<_>, Vec<_>) =
            (0..worker_count).map(|_| mpsc::unbounded_channel()).unzip();

        Self {
            node_id: config.cluster.node_id,
            retry: config.retry.sync,
            transport,
            storage,
            pending: DashMap::new(),
            worker_txs,
            worker_rxs: Mutex::new(worker_rxs),
        }
    }

    /// Spawns one task per worker. Fails if already started.
    pub fn start(
        self: &Arc<Self>,
        shutdown: watch::Receiver<()>,
    ) -> Result<Vec<JoinHandle<()>>> {
        let receivers = std::mem::take(&mut *self.worker_rxs.lock());
        if receivers.is_empty() {
            return Err(Error::Fatal("sync engine already started".to_string()));
        }

        let mut handles = Vec::with_capacity(receivers.len());
        for (idx, rx) in receivers.into_iter().enumerate() {
            let this = self.clone();
            let shutdown = shutdown.clone();
            spawn_task(
                &format!("distro-sync-{idx}"),
                move || async move {
                    this.run_worker(idx, rx, shutdown).await;
                    Ok(())
                },
                Some(&mut handles),
            );
        }
        Ok(handles)
    }

    /// Submissions not yet picked up by a worker
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn worker_for(
        &self,
        key: &DistroKey,
    ) -> usize {
        let mut hasher = DefaultHasher::new();
        key.resource_key.hash(&mut hasher);
        (hasher.finish() % self.worker_txs.len() as u64) as usize
    }

    async fn run_worker(
        &self,
        idx: usize,
        mut rx: mpsc::UnboundedReceiver<DistroKey>,
        mut shutdown: watch::Receiver<()>,
    ) {
        info!(worker = idx, "Distro sync worker started");

        loop {
            tokio::select! {
                key = rx.recv() => {
                    match key {
                        Some(key) => self.execute(key).await,
                        None => break,
                    }
                }
                _ = shutdown.changed() => {
                    debug!(worker = idx, "Distro sync worker received shutdown signal, draining");
                    rx.close();
                    while let Ok(key) = rx.try_recv() {
                        self.execute(key).await;
                    }
                    break;
                }
            }
        }

        info!(worker = idx, "Distro sync worker stopped");
    }

    async fn execute(
        &self,
        key: DistroKey,
    ) {
        let Some((_, PendingSync { action, budget })) = self.pending.remove(&key) else {
            return;
        };

        let data = match action {
            ApplyAction::Change => match self.storage.get_distro_data(&key) {
                Some(datum) => match DistroData::change(key.clone(), &datum, self.node_id) {
                    Ok(data) => data,
                    Err(e) => {
                        metrics::SYNC_FAILURES.inc();
                        warn!(%key, "failed to encode datum: {:?}", e);
                        return;
                    }
                },
                None => {
                    // Deleted since; the DELETE submission carries the news.
                    debug!(%key, "record gone before sync, skipped");
                    return;
                }
            },
            ApplyAction::Delete => DistroData::delete(key.clone(), self.node_id),
        };

        let peers = self.transport.peers();
        if peers.is_empty() {
            trace!(%key, "no peers to sync to");
            return;
        }

        let results = join_all(
            peers
                .into_iter()
                .map(|peer| self.sync_to_peer(peer, data.clone(), budget)),
        )
        .await;

        for e in results.into_iter().filter_map(|r| r.err()) {
            metrics::SYNC_FAILURES.inc();
            warn!(%key, ?action, "sync failed, left for anti-entropy: {}", e);
        }
    }

    async fn sync_to_peer(
        &self,
        peer: u32,
        data: DistroData,
        budget: Duration,
    ) -> std::result::Result<(), ReplicationError> {
        let transport = self.transport.clone();
        let attempt = || {
            let transport = transport.clone();
            let data = data.clone();
            async move { transport.sync_data(peer, data).await }
        };

        match timeout(budget, task_with_timeout_and_exponential_backoff(attempt, self.retry)).await
        {
            Ok(Ok(())) => {
                trace!(peer, key = %data.key, "synced");
                Ok(())
            }
            Ok(Err(e)) => {
                debug!(peer, key = %data.key, "last attempt error: {:?}", e);
                Err(ReplicationError::RetryExhausted {
                    node_id: peer,
                    attempts: self.retry.max_retries.max(1),
                })
            }
            Err(_) => Err(ReplicationError::Timeout {
                node_id: peer,
                duration: budget,
            }),
        }
    }
}
