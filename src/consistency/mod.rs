//! Ephemeral consistency core: local mutation, change notification and
//! replication dispatch for one logical write.
//!
//! ```text
//! caller ─> DistroConsistencyService ─┬─> DataStore          (sync)
//!                                     ├─> Notifier           (async, only if listened)
//!                                     └─> DistroProtocol     (async, always)
//! ```

mod distro_consistency_service;
mod listener_registry;
mod notifier;

pub use distro_consistency_service::*;
pub use listener_registry::*;
pub use notifier::*;


use std::sync::Arc;

#[cfg(test)]
use mockall::automock;
use serde::Deserialize;
use serde::Serialize;

use crate::Datum;
use crate::Record;
use crate::Result;

/// Semantic of a mutation, independent of whether anyone listens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApplyAction {
    Change,
    Delete,
}

/// Subscriber callback for one key.
///
/// Callbacks run on the notifier worker, never on the writer's stack. An
/// error (or panic) is logged and does not affect other listeners.
#[cfg_attr(test, automock)]
pub trait RecordListener: Send + Sync + 'static {
    fn on_change(
        &self,
        key: &str,
        value: &Record,
    ) -> Result<()>;

    fn on_delete(
        &self,
        key: &str,
    ) -> Result<()>;
}

/// Asynchronous local fan-out.
///
/// `add_task` must return without waiting for any listener to run.
#[cfg_attr(test, automock)]
pub trait Notifier: Send + Sync + 'static {
    fn add_task(
        &self,
        key: &str,
        action: ApplyAction,
    );
}

/// Write/read/subscribe surface of the ephemeral dataset.
pub trait ConsistencyService: Send + Sync {
    /// Stores `value` under `key` and schedules notification and replication.
    fn put(
        &self,
        key: &str,
        value: Record,
    ) -> Result<()>;

    /// Deletes `key`, notifies and drops its listeners, schedules replication.
    fn remove(
        &self,
        key: &str,
    ) -> Result<()>;

    fn get(
        &self,
        key: &str,
    ) -> Option<Datum>;

    fn contains(
        &self,
        key: &str,
    ) -> bool;

    fn listen(
        &self,
        key: &str,
        listener: Arc<dyn RecordListener>,
    ) -> Result<()>;

    /// Returns whether the listener was registered for `key`.
    fn unlisten(
        &self,
        key: &str,
        listener: &Arc<dyn RecordListener>,
    ) -> Result<bool>;
}
