//! A builder pattern implementation for assembling a [`DistroNode`].
//!
//! The [`DistroNodeBuilder`] wires the data store, listener registry,
//! notifier, sync engine and consistency service around a caller supplied
//! [`DistroTransport`].
//!
//! ## Example
//! ```ignore
//! let (shutdown_tx, shutdown_rx) = watch::channel(());
//! let node = DistroNodeBuilder::new(None, shutdown_rx)?
//!     .transport(Arc::new(my_transport))
//!     .build()?
//!     .ready()?;
//! node.start()?;
//!
//! node.service().put(&key, instances.into())?;
//!
//! shutdown_tx.send(())?;
//! node.join().await?;
//! ```

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::sync::Once;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::info;

use super::DistroNode;
use crate::metrics;
use crate::DataStore;
use crate::DistroConfig;
use crate::DistroConsistencyService;
use crate::DistroNotifier;
use crate::DistroSyncEngine;
use crate::DistroTransport;
use crate::Error;
use crate::ListenerRegistry;
use crate::Result;

static METRICS_INIT: Once = Once::new();

pub struct DistroNodeBuilder<T>
where
    T: DistroTransport,
{
    pub(super) config: DistroConfig,
    pub(super) transport: Option<Arc<T>>,
    pub(super) data_store: Option<Arc<DataStore>>,
    pub(super) listeners: Option<Arc<ListenerRegistry>>,
    pub(super) shutdown_signal: watch::Receiver<()>,

    pub(super) node: Option<Arc<DistroNode<T>>>,
}

impl<T> DistroNodeBuilder<T>
where
    T: DistroTransport,
{
    /// Loads configuration from defaults, `CONFIG_PATH` and `DISTRO__*`
    /// environment variables, then applies `config_path` on top if given.
    pub fn new(
        config_path: Option<&str>,
        shutdown_signal: watch::Receiver<()>,
    ) -> Result<Self> {
        let mut config = DistroConfig::new()?;
        if let Some(p) = config_path {
            info!("with_override_config from: {}", &p);
            config = config.with_override_config(p)?;
        }
        Ok(Self::from_config(config, shutdown_signal))
    }

    /// Uses an in-memory configuration as is. It is validated by `build`.
    pub fn from_config(
        config: DistroConfig,
        shutdown_signal: watch::Receiver<()>,
    ) -> Self {
        Self {
            config,
            transport: None,
            data_store: None,
            listeners: None,
            shutdown_signal,
            node: None,
        }
    }

    /// Sets the peer transport. Required.
    pub fn transport(
        mut self,
        transport: Arc<T>,
    ) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Shares an existing data store instead of creating an empty one
    pub fn data_store(
        mut self,
        data_store: Arc<DataStore>,
    ) -> Self {
        self.data_store = Some(data_store);
        self
    }

    pub fn listeners(
        mut self,
        listeners: Arc<ListenerRegistry>,
    ) -> Self {
        self.listeners = Some(listeners);
        self
    }

    /// Replaces the entire node configuration
    pub fn config(
        mut self,
        config: DistroConfig,
    ) -> Self {
        self.config = config;
        self
    }

    /// Validates the configuration and assembles the node.
    ///
    /// Nothing is spawned here; background workers start with
    /// [`DistroNode::start`].
    pub fn build(mut self) -> Result<Self> {
        let config = self.config.clone().validate()?;
        let transport = self
            .transport
            .take()
            .ok_or_else(|| Error::Fatal("transport is required to build a distro node".to_string()))?;

        let data_store = self.data_store.take().unwrap_or_default();
        let listeners = self.listeners.take().unwrap_or_default();

        let notifier = Arc::new(DistroNotifier::new(
            &config.notifier,
            data_store.clone(),
            listeners.clone(),
        ));
        let sync_engine = Arc::new(DistroSyncEngine::new(&config, transport, data_store.clone()));
        let service = Arc::new(DistroConsistencyService::new(
            &config,
            data_store,
            listeners,
            notifier.clone(),
            sync_engine.clone(),
        ));

        METRICS_INIT.call_once(|| metrics::register_custom_metrics(&metrics::REGISTRY));

        info!(node_id = config.cluster.node_id, ?config, "distro node built");

        self.node = Some(Arc::new(DistroNode {
            node_id: config.cluster.node_id,
            service,
            notifier,
            sync_engine,
            shutdown_signal: self.shutdown_signal.clone(),
            handles: Mutex::new(Vec::new()),
            running: AtomicBool::new(false),
            config: Arc::new(config),
        }));
        Ok(self)
    }

    /// Returns the built node.
    ///
    /// # Errors
    /// Returns [`Error::Fatal`] if `build` has not completed
    pub fn ready(self) -> Result<Arc<DistroNode<T>>> {
        self.node
            .ok_or_else(|| Error::Fatal("distro node has not been built".to_string()))
    }
}
