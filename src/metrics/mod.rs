use lazy_static::lazy_static;
use prometheus::Encoder;
use prometheus::IntCounter;
use prometheus::Registry;
use prometheus::TextEncoder;
use tracing::warn;


lazy_static! {
    pub static ref NOTIFY_TASKS_ENQUEUED: IntCounter = IntCounter::new(
        "notify_tasks_enqueued",
        "Notifier tasks queued for delivery"
    )
    .expect("metric can not be created");

    pub static ref NOTIFY_TASKS_COALESCED: IntCounter = IntCounter::new(
        "notify_tasks_coalesced",
        "CHANGE notifications merged into an already pending task"
    )
    .expect("metric can not be created");

    pub static ref NOTIFY_DELIVERIES: IntCounter = IntCounter::new(
        "notify_deliveries",
        "Successful listener callbacks"
    )
    .expect("metric can not be created");

    pub static ref LISTENER_FAILURES: IntCounter = IntCounter::new(
        "listener_failures",
        "Listener callbacks that returned an error or panicked"
    )
    .expect("metric can not be created");

    pub static ref SYNC_TASKS_SCHEDULED: IntCounter = IntCounter::new(
        "sync_tasks_scheduled",
        "Replication submissions queued to a sync worker"
    )
    .expect("metric can not be created");

    pub static ref SYNC_TASKS_COALESCED: IntCounter = IntCounter::new(
        "sync_tasks_coalesced",
        "Replication submissions merged into a pending one"
    )
    .expect("metric can not be created");

    pub static ref SYNC_FAILURES: IntCounter = IntCounter::new(
        "sync_failures",
        "Peer deliveries abandoned after retries or timeout"
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new();
}

/// Registers every distro collector into `registry`.
///
/// Registering twice into the same registry is logged and otherwise ignored.
pub fn register_custom_metrics(registry: &Registry) {
    let collectors: [&IntCounter; 7] = [
        &*NOTIFY_TASKS_ENQUEUED,
        &*NOTIFY_TASKS_COALESCED,
        &*NOTIFY_DELIVERIES,
        &*LISTENER_FAILURES,
        &*SYNC_TASKS_SCHEDULED,
        &*SYNC_TASKS_COALESCED,
        &*SYNC_FAILURES,
    ];
    for c in collectors {
        if let Err(e) = registry.register(Box::new(c.clone())) {
            warn!("collector can not be registered: {:?}", e);
        }
    }
}

/// Text exposition of `registry`, for whatever exporter the host runs.
pub fn gather_text(registry: &Registry) -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&registry.gather(), &mut buffer) {
        warn!("could not encode metrics: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_default()
}
