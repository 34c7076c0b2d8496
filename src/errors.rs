//! Distro Error Hierarchy
//!
//! Defines the error types surfaced by the ephemeral consistency core,
//! categorized by where they originate and who is expected to handle them.
//!
//! Only [`KeyError`] ever reaches a `put`/`remove`/`listen` caller.
//! Replication and listener failures are owned by the background workers and
//! are logged there.

use std::time::Duration;

use config::ConfigError;
use tokio::task::JoinError;

use crate::key::KeyKind;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Caller supplied a malformed key or a value that does not fit the key
    #[error(transparent)]
    Key(#[from] KeyError),

    /// Configuration loading and validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Cluster replication failures (never surfaced to writers)
    #[error(transparent)]
    Replication(#[from] ReplicationError),

    /// A listener callback reported a failure
    #[error("Listener failed: {0}")]
    Listener(String),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    /// Key is empty
    #[error("Key must not be empty")]
    Empty,

    /// Key does not start with any known record prefix
    #[error("Unknown key prefix: {0}")]
    UnknownPrefix(String),

    /// Key is missing the namespace/service connector
    #[error("Malformed key (expected <prefix><namespace>##<service>): {0}")]
    Malformed(String),

    /// Distro only handles ephemeral records
    #[error("Key is not ephemeral: {0}")]
    NotEphemeral(String),

    /// Value tag does not agree with the record kind encoded in the key
    #[error("Value kind {actual:?} does not match key kind {expected:?} for {key}")]
    KindMismatch {
        key: String,
        expected: KeyKind,
        actual: KeyKind,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ReplicationError {
    /// The dispatcher worker pool is not accepting tasks anymore
    #[error("Sync engine is stopped, task for {0} dropped")]
    EngineStopped(String),

    /// Peer did not acknowledge within the timeout budget
    #[error("Sync to node {node_id} timed out after {duration:?}")]
    Timeout { node_id: u32, duration: Duration },

    /// A single attempt exceeded its own timeout
    #[error("Attempt timed out after {0:?}")]
    AttemptTimeout(Duration),

    /// Retry policy exhaustion
    #[error("Sync to node {node_id} failed after {attempts} attempts")]
    RetryExhausted { node_id: u32, attempts: usize },

    /// Transport reported a failure for a single attempt
    #[error("Transport error: {0}")]
    Transport(String),

    /// Serialization of replicated data failed
    #[error(transparent)]
    Codec(#[from] bincode::Error),

    /// Background task panicked or was cancelled
    #[error("Background task failed: {0}")]
    TaskFailed(#[from] JoinError),
}
