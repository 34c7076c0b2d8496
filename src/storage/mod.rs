//! In-memory record storage.
//!
//! There is no persistence layer: a restarted node rebuilds its view through
//! re-registration and replication from peers.

mod data_store;
mod datum;

pub use data_store::*;
pub use datum::*;
