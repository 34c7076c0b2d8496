use distro_engine::metrics;
use distro_engine::ConsistencyService;

use crate::common::instances;
use crate::common::service_key;
use crate::common::wait_until;
use crate::common::TestCluster;
use crate::common::WAIT;

#[tokio::test]
async fn test_write_succeeds_while_peer_is_down() {
    let cluster = TestCluster::start(3);
    cluster.network.set_down(3, true);
    let failures_before = metrics::SYNC_FAILURES.get();
    let key = service_key("orders");

    cluster
        .node(1)
        .service()
        .put(&key, instances(&[("10.0.0.1", 8080)]))
        .unwrap();

    assert!(cluster.node(1).service().contains(&key));
    assert!(wait_until(WAIT, || cluster.node(2).service().contains(&key)).await);
    assert!(wait_until(WAIT, || metrics::SYNC_FAILURES.get() > failures_before).await);
    assert!(!cluster.node(3).service().contains(&key));

    cluster.stop().await;
}

#[tokio::test]
async fn test_next_write_reaches_recovered_peer() {
    let cluster = TestCluster::start(2);
    let key = service_key("orders");
    cluster.network.set_down(2, true);
    cluster
        .node(1)
        .service()
        .put(&key, instances(&[("10.0.0.1", 8080)]))
        .unwrap();
    assert!(wait_until(WAIT, || cluster.node(1).pending_syncs() == 0).await);

    cluster.network.set_down(2, false);
    let latest = instances(&[("10.0.0.1", 8080), ("10.0.0.3", 8080)]);
    cluster.node(1).service().put(&key, latest.clone()).unwrap();

    assert!(
        wait_until(WAIT, || {
            cluster
                .node(2)
                .service()
                .get(&key)
                .is_some_and(|d| d.value == latest)
        })
        .await
    );

    cluster.stop().await;
}
