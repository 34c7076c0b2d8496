use std::sync::Arc;

use distro_engine::ConsistencyService;
use distro_engine::Record;
use distro_engine::RecordListener;
use distro_engine::Result;
use parking_lot::Mutex;

use crate::common::instances;
use crate::common::service_key;
use crate::common::wait_until;
use crate::common::TestCluster;
use crate::common::WAIT;

#[derive(Default)]
struct CollectingListener {
    changes: Mutex<Vec<Record>>,
    deletes: Mutex<usize>,
}

impl RecordListener for CollectingListener {
    fn on_change(
        &self,
        _key: &str,
        value: &Record,
    ) -> Result<()> {
        self.changes.lock().push(value.clone());
        Ok(())
    }

    fn on_delete(
        &self,
        _key: &str,
    ) -> Result<()> {
        *self.deletes.lock() += 1;
        Ok(())
    }
}

#[tokio::test]
async fn test_put_converges_on_every_node() {
    let cluster = TestCluster::start(3);
    let key = service_key("orders");
    let value = instances(&[("10.0.0.1", 8080), ("10.0.0.2", 8080)]);

    cluster.node(1).service().put(&key, value.clone()).unwrap();

    // Local read is immediate
    assert_eq!(cluster.node(1).service().get(&key).unwrap().value, value);
    assert!(
        wait_until(WAIT, || {
            cluster
                .nodes
                .iter()
                .all(|n| n.service().get(&key).is_some_and(|d| d.value == value))
        })
        .await
    );

    let origin = cluster.node(3).service().get(&key).unwrap().origin;
    assert_eq!(origin, 1);

    cluster.stop().await;
}

#[tokio::test]
async fn test_remove_converges_on_every_node() {
    let cluster = TestCluster::start(3);
    let key = service_key("orders");
    cluster
        .node(1)
        .service()
        .put(&key, instances(&[("10.0.0.1", 8080)]))
        .unwrap();
    assert!(wait_until(WAIT, || cluster.nodes.iter().all(|n| n.service().contains(&key))).await);

    cluster.node(2).service().remove(&key).unwrap();

    assert!(!cluster.node(2).service().contains(&key));
    assert!(wait_until(WAIT, || cluster.nodes.iter().all(|n| !n.service().contains(&key))).await);

    cluster.stop().await;
}

#[tokio::test]
async fn test_concurrent_writers_converge_to_one_value() {
    let cluster = TestCluster::start(3);
    let key = service_key("orders");

    cluster
        .node(1)
        .service()
        .put(&key, instances(&[("10.0.0.1", 1)]))
        .unwrap();
    cluster
        .node(2)
        .service()
        .put(&key, instances(&[("10.0.0.2", 2)]))
        .unwrap();

    assert!(
        wait_until(WAIT, || {
            let data: Vec<_> = cluster.nodes.iter().map(|n| n.service().get(&key)).collect();
            data.iter().all(|d| d.is_some()) && data.windows(2).all(|w| w[0] == w[1])
        })
        .await,
        "nodes did not agree on a single value"
    );

    cluster.stop().await;
}

#[tokio::test]
async fn test_remote_change_notifies_local_listener() {
    let cluster = TestCluster::start(2);
    let key = service_key("orders");
    let listener = Arc::new(CollectingListener::default());
    cluster.node(2).service().listen(&key, listener.clone()).unwrap();

    let value = instances(&[("10.0.0.1", 8080)]);
    cluster.node(1).service().put(&key, value.clone()).unwrap();

    assert!(wait_until(WAIT, || listener.changes.lock().last() == Some(&value)).await);

    cluster.node(1).service().remove(&key).unwrap();

    assert!(wait_until(WAIT, || *listener.deletes.lock() == 1).await);
    assert!(!cluster.node(2).service().listeners().has_listeners(&key));

    cluster.stop().await;
}

#[tokio::test]
async fn test_invalid_key_is_rejected_without_replication() {
    let cluster = TestCluster::start(2);

    let result = cluster
        .node(1)
        .service()
        .put("not-a-distro-key", instances(&[("10.0.0.1", 8080)]));

    assert!(result.is_err());
    assert_eq!(cluster.node(1).pending_syncs(), 0);
    assert!(cluster.node(2).service().data_store().is_empty());

    cluster.stop().await;
}
