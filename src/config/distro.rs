use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_SYNC_TIMEOUT_MS;
use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SyncConfig {
    /// Budget handed to the replication dispatcher with every change.
    /// Bounds how long delivery to one peer is pursued before giving up on
    /// that attempt. Writers never wait on it.
    #[serde(default = "default_sync_timeout_ms")]
    pub timeout_ms: u64,

    /// Number of dispatcher workers. Keys are partitioned across them by hash,
    /// so one key is always handled by the same worker.
    #[serde(default = "default_sync_worker_count")]
    pub worker_count: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_sync_timeout_ms(),
            worker_count: default_sync_worker_count(),
        }
    }
}

impl SyncConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "sync.timeout_ms must be greater than 0".into(),
            )));
        }
        if self.worker_count == 0 {
            return Err(Error::Config(ConfigError::Message(
                "sync.worker_count must be at least 1".into(),
            )));
        }
        Ok(())
    }
}

fn default_sync_timeout_ms() -> u64 {
    DEFAULT_SYNC_TIMEOUT_MS
}
fn default_sync_worker_count() -> usize {
    1
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NotifierConfig {
    /// Merge a CHANGE into an already pending, undelivered CHANGE for the same
    /// key. Listeners still observe the latest value at delivery time.
    #[serde(default = "default_coalesce_changes")]
    pub coalesce_changes: bool,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            coalesce_changes: default_coalesce_changes(),
        }
    }
}

impl NotifierConfig {
    pub fn validate(&self) -> Result<()> {
        Ok(())
    }
}

fn default_coalesce_changes() -> bool {
    true
}
