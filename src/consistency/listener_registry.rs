use std::sync::Arc;

use dashmap::DashMap;
use tracing::trace;

use super::RecordListener;

/// Key -> subscribers, in registration order.
///
/// A key's entry is created by its first listener and disappears either when
/// the record is removed or when its last listener unregisters.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: DashMap<String, Vec<Arc<dyn RecordListener>>>,
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("keys", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identical registrations are not deduplicated.
    pub fn listen(
        &self,
        key: &str,
        listener: Arc<dyn RecordListener>,
    ) {
        let mut entry = self.listeners.entry(key.to_string()).or_default();
        entry.push(listener);
        trace!(key, listeners = entry.len(), "listener registered");
    }

    /// Removes every registration of `listener` under `key`.
    pub fn unlisten(
        &self,
        key: &str,
        listener: &Arc<dyn RecordListener>,
    ) -> bool {
        let mut found = false;
        // remove_if_mut keeps the emptiness check and the removal atomic
        self.listeners.remove_if_mut(key, |_, listeners| {
            let before = listeners.len();
            listeners.retain(|l| !std::ptr::addr_eq(Arc::as_ptr(l), Arc::as_ptr(listener)));
            found = listeners.len() != before;
            listeners.is_empty()
        });
        found
    }

    pub fn has_listeners(
        &self,
        key: &str,
    ) -> bool {
        self.listeners.get(key).is_some_and(|l| !l.is_empty())
    }

    /// Snapshot of the current subscribers of `key`.
    pub fn get(
        &self,
        key: &str,
    ) -> Vec<Arc<dyn RecordListener>> {
        self.listeners.get(key).map(|l| l.clone()).unwrap_or_default()
    }

    /// Drops the whole entry for `key`.
    pub fn remove(
        &self,
        key: &str,
    ) -> Option<Vec<Arc<dyn RecordListener>>> {
        self.listeners.remove(key).map(|(_, l)| l)
    }

    pub fn listener_count(
        &self,
        key: &str,
    ) -> usize {
        self.listeners.get(key).map(|l| l.len()).unwrap_or(0)
    }

    pub fn contains_key(
        &self,
        key: &str,
    ) -> bool {
        self.listeners.contains_key(key)
    }

    /// Number of keys with at least one listener
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}
