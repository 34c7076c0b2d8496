//! Shared fixtures for unit tests: logger setup, keys and records, and
//! recording fakes for the listener and transport seams.
mod common;
mod mock;

pub use common::*;
pub use mock::*;
