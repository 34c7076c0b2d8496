use std::collections::HashMap;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::DistroData;
use crate::DistroTransport;
use crate::Error;
use crate::Record;
use crate::RecordListener;
use crate::ReplicationError;
use crate::Result;

#[derive(Debug, Clone, PartialEq)]
pub enum ListenerEvent {
    Change(String, Record),
    Delete(String),
}

/// Listener that keeps every callback it receives.
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<ListenerEvent>>,
    fail: bool,
    panic: bool,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records, then returns an error from every callback
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Records, then panics in every callback
    pub fn panicking() -> Self {
        Self {
            panic: true,
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<ListenerEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    fn record(
        &self,
        event: ListenerEvent,
    ) -> Result<()> {
        self.events.lock().push(event);
        if self.panic {
            panic!("listener panic for test");
        }
        if self.fail {
            return Err(Error::Listener("listener failure for test".to_string()));
        }
        Ok(())
    }
}

impl RecordListener for RecordingListener {
    fn on_change(
        &self,
        key: &str,
        value: &Record,
    ) -> Result<()> {
        self.record(ListenerEvent::Change(key.to_string(), value.clone()))
    }

    fn on_delete(
        &self,
        key: &str,
    ) -> Result<()> {
        self.record(ListenerEvent::Delete(key.to_string()))
    }
}

/// Transport that records every delivered [`DistroData`] per target.
///
/// `fail_first(n)` makes the first `n` deliveries fail, `delay` holds every
/// delivery for the given time before it completes.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    peers: Vec<u32>,
    delivered: Mutex<HashMap<u32, Vec<DistroData>>>,
    attempts: AtomicUsize,
    fail_first: usize,
    delay: Option<Duration>,
}

impl RecordingTransport {
    pub fn new(peers: Vec<u32>) -> Self {
        Self {
            peers,
            ..Self::default()
        }
    }

    pub fn fail_first(
        mut self,
        n: usize,
    ) -> Self {
        self.fail_first = n;
        self
    }

    pub fn delay(
        mut self,
        delay: Duration,
    ) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn delivered_to(
        &self,
        peer: u32,
    ) -> Vec<DistroData> {
        self.delivered.lock().get(&peer).cloned().unwrap_or_default()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DistroTransport for RecordingTransport {
    fn peers(&self) -> Vec<u32> {
        self.peers.clone()
    }

    async fn sync_data(
        &self,
        target: u32,
        data: DistroData,
    ) -> Result<()> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if attempt < self.fail_first {
            return Err(ReplicationError::Transport(format!("injected failure {attempt}")).into());
        }
        self.delivered.lock().entry(target).or_default().push(data);
        Ok(())
    }
}
