//! Single-consumer change notifier.
//!
//! # Architecture
//!
//! ```text
//! Write path:
//!   add_task(key, action) -> [coalesce CHANGE] -> unbounded queue   (non-blocking)
//!                                                      ↓
//! Notifier worker (one tokio task):
//!   recv -> read CURRENT datum from DataStore -> listeners in registration order
//! ```
//!
//! A CHANGE task only says "this key changed": the payload is read at delivery
//! time, so coalesced or late tasks still deliver the latest version. A DELETE
//! task captures the key's listeners when it is enqueued, because the
//! registry entry is dropped right after.
//!
//! Tasks for one key are delivered in queue order. Nothing is ordered across
//! keys.

use std::panic::catch_unwind;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use dashmap::DashSet;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::trace;
use tracing::warn;

use super::ApplyAction;
use super::ListenerRegistry;
use super::Notifier;
use super::RecordListener;
use crate::async_task::spawn_task;
use crate::metrics;
use crate::DataStore;
use crate::Error;
use crate::NotifierConfig;
use crate::Result;

struct NotifyTask {
    key: String,
    action: ApplyAction,
    /// Listeners captured at enqueue time (DELETE only)
    listeners: Option<Vec<Arc<dyn RecordListener>>>,
}

pub struct DistroNotifier {
    data_store: Arc<DataStore>,
    listeners: Arc<ListenerRegistry>,
    coalesce_changes: bool,

    /// Keys with a queued, undelivered CHANGE
    pending_changes: DashSet<String>,

    task_tx: mpsc::UnboundedSender<NotifyTask>,
    /// Taken by the worker on start
    task_rx: Mutex<Option<mpsc::UnboundedReceiver<NotifyTask>>>,
}

impl std::fmt::Debug for DistroNotifier {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("DistroNotifier")
            .field("coalesce_changes", &self.coalesce_changes)
            .field("pending_changes", &self.pending_changes.len())
            .finish_non_exhaustive()
    }
}

impl Notifier for DistroNotifier {
    fn add_task(
        &self,
        key: &str,
        action: ApplyAction,
    ) {
        let listeners = match action {
            ApplyAction::Change => {
                if self.coalesce_changes && !self.pending_changes.insert(key.to_string()) {
                    metrics::NOTIFY_TASKS_COALESCED.inc();
                    trace!(key, "change already pending, merged");
                    return;
                }
                None
            }
            ApplyAction::Delete => {
                // A later CHANGE must be queued behind this DELETE, not merged into
                // a CHANGE that sits ahead of it.
                self.pending_changes.remove(key);
                Some(self.listeners.get(key))
            }
        };

        let task = NotifyTask {
            key: key.to_string(),
            action,
            listeners,
        };
        if self.task_tx.send(task).is_err() {
            warn!(key, ?action, "notifier stopped, task dropped");
            self.pending_changes.remove(key);
            return;
        }
        metrics::NOTIFY_TASKS_ENQUEUED.inc();
    }
}

impl DistroNotifier {
    pub fn new(
        config: &NotifierConfig,
        data_store: Arc<DataStore>,
        listeners: Arc<ListenerRegistry>,
    ) -> Self {
        let (task_tx, task_rx) = mpsc::unbounded_channel();
        Self {
            data_store,
            listeners,
            coalesce_changes: config.coalesce_changes,
            pending_changes: DashSet::new(),
            task_tx,
            task_rx: Mutex::new(Some(task_rx)),
        }
    }

    /// Spawns the worker. Tasks added before `start` are kept and delivered.
    ///
    /// Fails if the worker was already started.
    pub fn start(
        self: &Arc<Self>,
        shutdown: watch::Receiver<()>,
    ) -> Result<JoinHandle<()>> {
        let task_rx = self
            .task_rx
            .lock()
            .take()
            .ok_or_else(|| Error::Fatal("notifier worker already started".to_string()))?;

        let this = self.clone();
        let mut handles = Vec::with_capacity(1);
        spawn_task(
            "distro-notifier",
            move || async move {
                this.run(task_rx, shutdown).await;
                Ok(())
            },
            Some(&mut handles),
        );
        handles
            .pop()
            .ok_or_else(|| Error::Fatal("notifier worker was not spawned".to_string()))
    }

    /// Drains the queue until shutdown, then delivers what is left and exits.
    async fn run(
        &self,
        mut task_rx: mpsc::UnboundedReceiver<NotifyTask>,
        mut shutdown: watch::Receiver<()>,
    ) {
        info!("Distro notifier started");

        loop {
            tokio::select! {
                task = task_rx.recv() => {
                    match task {
                        Some(task) => self.handle(task),
                        None => break,
                    }
                }
                _ = shutdown.changed() => {
                    debug!("Distro notifier received shutdown signal, draining");
                    task_rx.close();
                    while let Ok(task) = task_rx.try_recv() {
                        self.handle(task);
                    }
                    break;
                }
            }
        }

        info!("Distro notifier stopped");
    }

    fn handle(
        &self,
        task: NotifyTask,
    ) {
        let NotifyTask {
            key,
            action,
            listeners,
        } = task;

        if action == ApplyAction::Change {
            // Clear the marker before reading the store: a write landing after
            // the read below must queue a fresh task.
            self.pending_changes.remove(&key);
        }

        let listeners = listeners.unwrap_or_else(|| self.listeners.get(&key));
        if listeners.is_empty() {
            trace!(key = %key, ?action, "no listeners left, skipped");
            return;
        }

        match action {
            ApplyAction::Change => {
                let Some(datum) = self.data_store.get(&key) else {
                    trace!(key = %key, "record removed before change delivery, skipped");
                    return;
                };
                for listener in listeners {
                    Self::deliver(&key, action, || listener.on_change(&key, &datum.value));
                }
            }
            ApplyAction::Delete => {
                for listener in listeners {
                    Self::deliver(&key, action, || listener.on_delete(&key));
                }
            }
        }
    }

    fn deliver<F>(
        key: &str,
        action: ApplyAction,
        f: F,
    ) where
        F: FnOnce() -> Result<()>,
    {
        match catch_unwind(AssertUnwindSafe(f)) {
            Ok(Ok(())) => {
                metrics::NOTIFY_DELIVERIES.inc();
            }
            Ok(Err(e)) => {
                metrics::LISTENER_FAILURES.inc();
                warn!(key, ?action, "listener failed: {:?}", e);
            }
            Err(_) => {
                metrics::LISTENER_FAILURES.inc();
                error!(key, ?action, "listener panicked");
            }
        }
    }

    /// Number of keys with a merged, undelivered CHANGE
    pub fn pending_changes(&self) -> usize {
        self.pending_changes.len()
    }
}
