//! Distro consistency service for ephemeral records.
//!
//! Sequences, for one logical change:
//! 1. key validation (fail fast, no side effects)
//! 2. the synchronous [`DataStore`] mutation
//! 3. a notifier task, only when the key has listeners
//! 4. an unconditional replication dispatch
//!
//! Steps 3 and 4 only schedule work. A successful return means the change is
//! in local memory and replication is scheduled, not that any peer has it.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;
use tracing::trace;

use super::ApplyAction;
use super::ConsistencyService;
use super::ListenerRegistry;
use super::Notifier;
use super::RecordListener;
use crate::time::VersionClock;
use crate::DataStore;
use crate::Datum;
use crate::DistroConfig;
use crate::DistroData;
use crate::DistroKey;
use crate::DistroProtocol;
use crate::KeyBuilder;
use crate::KeyError;
use crate::ParsedKey;
use crate::Record;
use crate::ReplicationError;
use crate::Result;

pub struct DistroConsistencyService<N, P>
where
    N: Notifier,
    P: DistroProtocol,
{
    node_id: u32,
    sync_timeout: Duration,
    clock: VersionClock,

    data_store: Arc<DataStore>,
    listeners: Arc<ListenerRegistry>,
    notifier: Arc<N>,
    protocol: Arc<P>,
}

impl<N, P> std::fmt::Debug for DistroConsistencyService<N, P>
where
    N: Notifier,
    P: DistroProtocol,
{
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("DistroConsistencyService")
            .field("node_id", &self.node_id)
            .field("sync_timeout", &self.sync_timeout)
            .field("records", &self.data_store.len())
            .field("listened_keys", &self.listeners.len())
            .finish()
    }
}

impl<N, P> DistroConsistencyService<N, P>
where
    N: Notifier,
    P: DistroProtocol,
{
    pub fn new(
        config: &DistroConfig,
        data_store: Arc<DataStore>,
        listeners: Arc<ListenerRegistry>,
        notifier: Arc<N>,
        protocol: Arc<P>,
    ) -> Self {
        Self {
            node_id: config.cluster.node_id,
            sync_timeout: config.sync.timeout(),
            clock: VersionClock::new(),
            data_store,
            listeners,
            notifier,
            protocol,
        }
    }

    /// Applies a change replicated from a peer.
    ///
    /// CHANGE is kept only if it supersedes the local datum (last-writer-wins).
    /// DELETE behaves like a local [`remove`](ConsistencyService::remove).
    /// Nothing is dispatched back to the cluster. Returns whether local state
    /// changed.
    pub fn on_receive(
        &self,
        data: DistroData,
    ) -> Result<bool> {
        let key = data.key.resource_key.as_str();
        let parsed = KeyBuilder::parse_ephemeral(key)?;

        match data.action {
            ApplyAction::Change => {
                let datum: Datum =
                    bincode::deserialize(&data.content).map_err(ReplicationError::Codec)?;
                if datum.key != key {
                    return Err(KeyError::Malformed(format!(
                        "payload key {} does not match {}",
                        datum.key, key
                    ))
                    .into());
                }
                Self::check_kind(key, &parsed, &datum.value)?;

                self.clock.observe(datum.version);
                let version = datum.version;
                let applied = self.data_store.put_if_newer(datum);
                if applied && self.listeners.has_listeners(key) {
                    self.notifier.add_task(key, ApplyAction::Change);
                }
                debug!(key, version, source = data.source, applied, "remote change received");
                Ok(applied)
            }
            ApplyAction::Delete => {
                let existed = self.delete_local(key);
                debug!(key, source = data.source, existed, "remote delete received");
                Ok(existed)
            }
        }
    }

    pub fn data_store(&self) -> &Arc<DataStore> {
        &self.data_store
    }

    pub fn listeners(&self) -> &Arc<ListenerRegistry> {
        &self.listeners
    }

    pub fn sync_timeout(&self) -> Duration {
        self.sync_timeout
    }

    fn check_kind(
        key: &str,
        parsed: &ParsedKey,
        value: &Record,
    ) -> Result<()> {
        if value.kind() != parsed.kind {
            return Err(KeyError::KindMismatch {
                key: key.to_string(),
                expected: parsed.kind,
                actual: value.kind(),
            }
            .into());
        }
        Ok(())
    }

    /// Store removal, DELETE notification (enqueued before the listeners are
    /// dropped) and registry cleanup.
    fn delete_local(
        &self,
        key: &str,
    ) -> bool {
        let existed = self.data_store.remove(key).is_some();
        if self.listeners.has_listeners(key) {
            self.notifier.add_task(key, ApplyAction::Delete);
        }
        self.listeners.remove(key);
        existed
    }

    fn dispatch(
        &self,
        key: &str,
        parsed: &ParsedKey,
        action: ApplyAction,
    ) {
        let distro_key = DistroKey::new(key, parsed.kind.resource_type());
        self.protocol.sync(distro_key, action, self.sync_timeout);
    }
}

impl<N, P> ConsistencyService for DistroConsistencyService<N, P>
where
    N: Notifier,
    P: DistroProtocol,
{
    fn put(
        &self,
        key: &str,
        value: Record,
    ) -> Result<()> {
        let parsed = KeyBuilder::parse_ephemeral(key)?;
        Self::check_kind(key, &parsed, &value)?;

        let datum = self.data_store.put_with(key, |prev| {
            let version = self.clock.next_after(prev.map(|d| d.version));
            Datum::new(key, value, version, self.node_id)
        });

        if self.listeners.has_listeners(key) {
            self.notifier.add_task(key, ApplyAction::Change);
        }

        self.dispatch(key, &parsed, ApplyAction::Change);

        trace!(key, version = datum.version, "put scheduled");
        Ok(())
    }

    fn remove(
        &self,
        key: &str,
    ) -> Result<()> {
        let parsed = KeyBuilder::parse_ephemeral(key)?;

        let existed = self.delete_local(key);
        self.dispatch(key, &parsed, ApplyAction::Delete);

        trace!(key, existed, "remove scheduled");
        Ok(())
    }

    fn get(
        &self,
        key: &str,
    ) -> Option<Datum> {
        self.data_store.get(key)
    }

    fn contains(
        &self,
        key: &str,
    ) -> bool {
        self.data_store.contains(key)
    }

    fn listen(
        &self,
        key: &str,
        listener: Arc<dyn RecordListener>,
    ) -> Result<()> {
        KeyBuilder::parse_ephemeral(key)?;
        self.listeners.listen(key, listener);
        Ok(())
    }

    fn unlisten(
        &self,
        key: &str,
        listener: &Arc<dyn RecordListener>,
    ) -> Result<bool> {
        KeyBuilder::parse_ephemeral(key)?;
        Ok(self.listeners.unlisten(key, listener))
    }
}
