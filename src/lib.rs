//! # distro-engine
//!
//! Eventually consistent, in-memory store for ephemeral service registration
//! data (instance lists and service metadata).
//!
//! Every node accepts writes for the keys it is responsible for, applies them
//! locally, notifies local subscribers asynchronously and pushes the change to
//! its peers in the background. Writers never wait on the network.
//!
//! ## Layout
//!
//! - [`KeyBuilder`] - reversible record keys
//! - [`DataStore`] - the local, concurrent record map
//! - [`DistroNotifier`] - single-consumer listener fan-out
//! - [`DistroConsistencyService`] - sequences one logical write
//! - [`DistroSyncEngine`] - coalescing peer replication over a [`DistroTransport`]
//! - [`DistroNodeBuilder`] / [`DistroNode`] - wiring and lifecycle
//!
//! ## Quick start
//!
//! ```ignore
//! let (shutdown_tx, shutdown_rx) = watch::channel(());
//! let node = DistroNodeBuilder::new(None, shutdown_rx)?
//!     .transport(Arc::new(my_transport))
//!     .build()?
//!     .ready()?;
//! node.start()?;
//!
//! let key = KeyBuilder::build_instance_list_key("public", "orders", true);
//! node.service().put(&key, instances.into())?;
//! ```

mod config;
mod consistency;
mod constants;
mod errors;
mod key;
pub mod metrics;
mod node;
mod replication;
mod storage;
pub mod utils;

pub use config::*;
pub use consistency::*;
pub use constants::*;
pub use errors::*;
pub use key::*;
pub use node::*;
pub use replication::*;
pub use storage::*;
pub use utils::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
