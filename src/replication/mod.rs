//! Boundary to the cluster replication layer.
//!
//! The consistency core only depends on [`DistroProtocol::sync`], a
//! fire-and-forget submission. [`DistroSyncEngine`] is the in-process adapter
//! that turns those submissions into peer pushes through an external
//! [`DistroTransport`]. Anti-entropy and membership live elsewhere.

mod sync_engine;

pub use sync_engine::*;


use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
#[cfg(test)]
use mockall::automock;
use serde::Deserialize;
use serde::Serialize;

use crate::ApplyAction;
use crate::DataStore;
use crate::Datum;
use crate::Result;

/// What changed, without the value itself.
///
/// The dispatcher reads current state when it actually replicates, so a
/// queued descriptor never ships a stale payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DistroKey {
    pub resource_key: String,
    pub resource_type: String,
}

impl DistroKey {
    pub fn new(
        resource_key: impl Into<String>,
        resource_type: impl Into<String>,
    ) -> Self {
        Self {
            resource_key: resource_key.into(),
            resource_type: resource_type.into(),
        }
    }
}

impl std::fmt::Display for DistroKey {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "{}[{}]", self.resource_key, self.resource_type)
    }
}

/// Unit shipped to a peer. `content` is a bincode [`Datum`] for CHANGE and
/// empty for DELETE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistroData {
    pub key: DistroKey,
    pub action: ApplyAction,
    pub content: Bytes,
    /// Node that sent this data
    pub source: u32,
}

impl DistroData {
    pub fn change(
        key: DistroKey,
        datum: &Datum,
        source: u32,
    ) -> Result<Self> {
        let content = bincode::serialize(datum).map_err(crate::ReplicationError::Codec)?;
        Ok(Self {
            key,
            action: ApplyAction::Change,
            content: Bytes::from(content),
            source,
        })
    }

    pub fn delete(
        key: DistroKey,
        source: u32,
    ) -> Self {
        Self {
            key,
            action: ApplyAction::Delete,
            content: Bytes::new(),
            source,
        }
    }
}

/// Replication dispatcher contract consumed by the consistency core.
///
/// Must return immediately having scheduled the work, and must never report
/// network failures back to the caller.
#[cfg_attr(test, automock)]
pub trait DistroProtocol: Send + Sync + 'static {
    fn sync(
        &self,
        key: DistroKey,
        action: ApplyAction,
        timeout: Duration,
    );
}

/// Byte shipping to peers. Implemented by the transport layer.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DistroTransport: Send + Sync + 'static {
    /// Current peers, excluding this node
    fn peers(&self) -> Vec<u32>;

    async fn sync_data(
        &self,
        target: u32,
        data: DistroData,
    ) -> Result<()>;
}

/// Read access the dispatcher needs at replication time.
pub trait DistroDataStorage: Send + Sync + 'static {
    fn get_distro_data(
        &self,
        key: &DistroKey,
    ) -> Option<Datum>;
}

impl DistroDataStorage for DataStore {
    fn get_distro_data(
        &self,
        key: &DistroKey,
    ) -> Option<Datum> {
        self.get(&key.resource_key)
    }
}
