use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

/// return millisecond
pub(crate) fn timestamp_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Node-local version source for datum writes.
///
/// Every value handed out is strictly greater than all values previously
/// handed out or observed, and never lags the wall clock.
#[derive(Debug, Default)]
pub struct VersionClock {
    last: AtomicU64,
}

impl VersionClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next version, strictly greater than `floor` when given.
    pub fn next_after(
        &self,
        floor: Option<u64>,
    ) -> u64 {
        let now = timestamp_millis();
        let floor = floor.map(|f| f.saturating_add(1)).unwrap_or(0);

        let prev = self
            .last
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                Some(now.max(last.saturating_add(1)).max(floor))
            })
            .unwrap_or_else(|last| last);

        now.max(prev.saturating_add(1)).max(floor)
    }

    /// Moves the clock forward past a version received from a peer
    pub fn observe(
        &self,
        version: u64,
    ) {
        self.last.fetch_max(version, Ordering::AcqRel);
    }

    pub fn current(&self) -> u64 {
        self.last.load(Ordering::Acquire)
    }
}
