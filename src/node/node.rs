//! A running member of the distro cluster.
//!
//! Owns the notifier worker and the sync engine workers. Both stop on the
//! shutdown signal handed to the builder, after draining what is queued.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use crate::DistroConfig;
use crate::DistroConsistencyService;
use crate::DistroData;
use crate::DistroNotifier;
use crate::DistroSyncEngine;
use crate::DistroTransport;
use crate::Error;
use crate::ReplicationError;
use crate::Result;

/// Consistency service as wired by [`DistroNodeBuilder`](super::DistroNodeBuilder)
pub type DistroService<T> = DistroConsistencyService<DistroNotifier, DistroSyncEngine<T>>;

pub struct DistroNode<T>
where
    T: DistroTransport,
{
    pub(crate) node_id: u32,
    pub(crate) service: Arc<DistroService<T>>,
    pub(crate) notifier: Arc<DistroNotifier>,
    pub(crate) sync_engine: Arc<DistroSyncEngine<T>>,

    pub(crate) shutdown_signal: watch::Receiver<()>,
    pub(crate) handles: Mutex<Vec<JoinHandle<()>>>,
    pub(crate) running: AtomicBool,

    pub config: Arc<DistroConfig>,
}

impl<T> std::fmt::Debug for DistroNode<T>
where
    T: DistroTransport,
{
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("DistroNode")
            .field("node_id", &self.node_id)
            .field("running", &self.is_running())
            .field("service", &self.service)
            .finish_non_exhaustive()
    }
}

impl<T> DistroNode<T>
where
    T: DistroTransport,
{
    /// Spawns the notifier and sync workers. A node starts once.
    pub fn start(&self) -> Result<()> {
        if self.running.swap(true, Ordering::AcqRel) {
            return Err(Error::Fatal(format!("distro node {} already started", self.node_id)));
        }

        let notifier_handle = self.notifier.start(self.shutdown_signal.clone())?;
        let sync_handles = self.sync_engine.start(self.shutdown_signal.clone())?;

        let mut handles = self.handles.lock();
        handles.push(notifier_handle);
        handles.extend(sync_handles);

        info!(node_id = self.node_id, workers = handles.len(), "distro node started");
        Ok(())
    }

    /// Waits for every worker to exit. Workers exit once the shutdown signal
    /// fires and their queues are drained.
    pub async fn join(&self) -> Result<()> {
        let handles = std::mem::take(&mut *self.handles.lock());
        for handle in handles {
            handle.await.map_err(ReplicationError::from)?;
        }
        self.running.store(false, Ordering::Release);

        info!(node_id = self.node_id, "distro node stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn node_id(&self) -> u32 {
        self.node_id
    }

    pub fn service(&self) -> &Arc<DistroService<T>> {
        &self.service
    }

    /// Entry point for data pushed by a peer's transport
    pub fn on_receive(
        &self,
        data: DistroData,
    ) -> Result<bool> {
        self.service.on_receive(data)
    }

    /// Replication submissions not yet picked up by a sync worker
    pub fn pending_syncs(&self) -> usize {
        self.sync_engine.pending_len()
    }
}
