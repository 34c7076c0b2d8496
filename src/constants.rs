// -
// Key namespaces

/// Prefix of instance-list records, also their replication resource type
pub const INSTANCE_LIST_KEY_PREFIX: &str = "distro.iplist.";

/// Prefix of service metadata records, also their replication resource type
pub const SERVICE_META_KEY_PREFIX: &str = "distro.meta.";

/// Marker placed right after the record prefix for in-memory only records
pub const EPHEMERAL_KEY_PREFIX: &str = "ephemeral.";

/// Separates namespace and service name inside a key
pub const NAMESPACE_KEY_CONNECTOR: &str = "##";

// -
// Defaults

pub(crate) const DEFAULT_SYNC_TIMEOUT_MS: u64 = 1000;
