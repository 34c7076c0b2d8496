//! In-process cluster: every node's transport calls the target node's
//! `on_receive` directly. Nodes can be marked down to drop their traffic.

use std::sync::Arc;
use std::sync::Weak;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::DashSet;
use distro_engine::DistroConfig;
use distro_engine::DistroData;
use distro_engine::DistroNode;
use distro_engine::DistroNodeBuilder;
use distro_engine::DistroTransport;
use distro_engine::Instance;
use distro_engine::Instances;
use distro_engine::KeyBuilder;
use distro_engine::Record;
use distro_engine::ReplicationError;
use distro_engine::Result;
use tokio::sync::watch;
use tokio::time::sleep;
use tokio::time::Instant;

pub const WAIT: Duration = Duration::from_secs(3);

pub type TestNode = DistroNode<InMemoryTransport>;

#[derive(Default)]
pub struct InMemoryNetwork {
    nodes: DashMap<u32, Weak<TestNode>>,
    down: DashSet<u32>,
}

impl InMemoryNetwork {
    pub fn set_down(
        &self,
        node_id: u32,
        down: bool,
    ) {
        if down {
            self.down.insert(node_id);
        } else {
            self.down.remove(&node_id);
        }
    }
}

pub struct InMemoryTransport {
    node_id: u32,
    network: Arc<InMemoryNetwork>,
}

#[async_trait]
impl DistroTransport for InMemoryTransport {
    fn peers(&self) -> Vec<u32> {
        let mut peers: Vec<u32> = self
            .network
            .nodes
            .iter()
            .map(|e| *e.key())
            .filter(|id| *id != self.node_id)
            .collect();
        peers.sort_unstable();
        peers
    }

    async fn sync_data(
        &self,
        target: u32,
        data: DistroData,
    ) -> Result<()> {
        if self.network.down.contains(&target) || self.network.down.contains(&self.node_id) {
            return Err(ReplicationError::Transport(format!("node {target} unreachable")).into());
        }
        let node = self
            .network
            .nodes
            .get(&target)
            .and_then(|n| n.upgrade())
            .ok_or_else(|| ReplicationError::Transport(format!("node {target} is gone")))?;
        node.on_receive(data)?;
        Ok(())
    }
}

pub struct TestCluster {
    pub network: Arc<InMemoryNetwork>,
    pub nodes: Vec<Arc<TestNode>>,
    shutdown_tx: watch::Sender<()>,
}

impl TestCluster {
    /// Builds and starts `size` nodes with ids `1..=size`.
    pub fn start(size: u32) -> Self {
        crate::enable_logger();
        let network = Arc::new(InMemoryNetwork::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(());

        let nodes: Vec<Arc<TestNode>> = (1..=size)
            .map(|node_id| {
                let transport = Arc::new(InMemoryTransport {
                    node_id,
                    network: network.clone(),
                });
                let node = DistroNodeBuilder::from_config(node_config(node_id), shutdown_rx.clone())
                    .transport(transport)
                    .build()
                    .expect("build node")
                    .ready()
                    .expect("node ready");
                network.nodes.insert(node_id, Arc::downgrade(&node));
                node
            })
            .collect();

        for node in &nodes {
            node.start().expect("start node");
        }

        Self {
            network,
            nodes,
            shutdown_tx,
        }
    }

    /// Node with id `node_id`
    pub fn node(
        &self,
        node_id: u32,
    ) -> &Arc<TestNode> {
        &self.nodes[(node_id - 1) as usize]
    }

    pub async fn stop(self) {
        self.shutdown_tx.send(()).expect("send shutdown");
        for node in &self.nodes {
            node.join().await.expect("join node");
        }
    }
}

pub fn node_config(node_id: u32) -> DistroConfig {
    let mut config = DistroConfig::default();
    config.cluster.node_id = node_id;
    config.sync.timeout_ms = 500;
    config.retry.sync.max_retries = 2;
    config.retry.sync.timeout_ms = 100;
    config.retry.sync.base_delay_ms = 5;
    config.retry.sync.max_delay_ms = 20;
    config
}

pub fn service_key(service_name: &str) -> String {
    KeyBuilder::build_instance_list_key("public", service_name, true)
}

pub fn instances(addresses: &[(&str, u16)]) -> Record {
    Instances::new(
        addresses
            .iter()
            .map(|(ip, port)| Instance::new(*ip, *port))
            .collect(),
    )
    .into()
}

pub async fn wait_until<F>(
    within: Duration,
    mut cond: F,
) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + within;
    loop {
        if cond() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        sleep(Duration::from_millis(10)).await;
    }
}
