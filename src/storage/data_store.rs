//! Authoritative local view of the ephemeral dataset.
//!
//! Backed by a sharded [`DashMap`], so writers to different keys proceed in
//! parallel while each single-key operation is atomic. Nothing here blocks on
//! I/O or notifies anyone.

use std::collections::HashMap;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::trace;

use super::Datum;

#[derive(Debug, Default)]
pub struct DataStore {
    data: DashMap<String, Datum>,
}

impl DataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upserts `datum` under `key`.
    pub fn put(
        &self,
        key: &str,
        datum: Datum,
    ) {
        self.data.insert(key.to_string(), datum);
    }

    /// Builds the new datum from the current one under the key's shard lock
    /// and stores it. Returns a copy of what was stored.
    pub fn put_with<F>(
        &self,
        key: &str,
        f: F,
    ) -> Datum
    where
        F: FnOnce(Option<&Datum>) -> Datum,
    {
        match self.data.entry(key.to_string()) {
            Entry::Occupied(mut e) => {
                let datum = f(Some(e.get()));
                e.insert(datum.clone());
                datum
            }
            Entry::Vacant(e) => {
                let datum = f(None);
                e.insert(datum.clone());
                datum
            }
        }
    }

    /// Stores `datum` only if it supersedes the current one (or none exists).
    pub fn put_if_newer(
        &self,
        datum: Datum,
    ) -> bool {
        match self.data.entry(datum.key.clone()) {
            Entry::Occupied(mut e) => {
                if datum.supersedes(e.get()) {
                    e.insert(datum);
                    true
                } else {
                    trace!(
                        key = %datum.key,
                        incoming = datum.version,
                        current = e.get().version,
                        "stale datum ignored"
                    );
                    false
                }
            }
            Entry::Vacant(e) => {
                e.insert(datum);
                true
            }
        }
    }

    /// Deleting an absent key is a no-op.
    pub fn remove(
        &self,
        key: &str,
    ) -> Option<Datum> {
        self.data.remove(key).map(|(_, d)| d)
    }

    pub fn get(
        &self,
        key: &str,
    ) -> Option<Datum> {
        self.data.get(key).map(|d| d.value().clone())
    }

    pub fn contains(
        &self,
        key: &str,
    ) -> bool {
        self.data.contains_key(key)
    }

    /// Present keys only; absent ones are skipped.
    pub fn batch_get(
        &self,
        keys: &[String],
    ) -> HashMap<String, Datum> {
        keys.iter()
            .filter_map(|k| self.get(k).map(|d| (k.clone(), d)))
            .collect()
    }

    pub fn keys(&self) -> Vec<String> {
        self.data.iter().map(|e| e.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
