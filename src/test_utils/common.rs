use std::time::Duration;

use tokio::time::sleep;
use tokio::time::Instant;

use crate::DistroConfig;
use crate::Instance;
use crate::Instances;
use crate::KeyBuilder;

pub const TEST_NAMESPACE: &str = "ns1";

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    env_logger::init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
    println!("setup logger for unit test.");
}

/// Ephemeral instance-list key of `service_name` in [`TEST_NAMESPACE`]
pub fn test_key(service_name: &str) -> String {
    KeyBuilder::build_instance_list_key(TEST_NAMESPACE, service_name, true)
}

/// Ephemeral service-meta key of `service_name` in [`TEST_NAMESPACE`]
pub fn test_meta_key(service_name: &str) -> String {
    KeyBuilder::build_service_meta_key(TEST_NAMESPACE, service_name, true)
}

/// Builds an instance list from `ip:port` strings
pub fn instances_of(addresses: &[&str]) -> Instances {
    Instances::new(
        addresses
            .iter()
            .map(|addr| {
                let (ip, port) = addr.rsplit_once(':').expect("address must be ip:port");
                Instance::new(ip, port.parse().expect("port must be numeric"))
            })
            .collect(),
    )
}

/// Default config with retries short enough for tests
pub fn test_config(node_id: u32) -> DistroConfig {
    let mut config = DistroConfig::default();
    config.cluster.node_id = node_id;
    config.retry.sync.max_retries = 2;
    config.retry.sync.timeout_ms = 50;
    config.retry.sync.base_delay_ms = 5;
    config.retry.sync.max_delay_ms = 10;
    config
}

/// Polls `cond` every few milliseconds until it holds or `within` elapses.
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
        sleep(Duration::from_millis(5)).await;
    }
}
