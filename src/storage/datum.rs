use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::KeyKind;

/// One registered service instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub ip: String,
    pub port: u16,
    pub cluster_name: String,
    pub weight: f64,
    pub healthy: bool,
    pub enabled: bool,
    pub ephemeral: bool,
    /// Last heartbeat, ms since epoch
    pub last_beat: u64,
    pub metadata: BTreeMap<String, String>,
}

impl Instance {
    pub fn new(
        ip: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            ip: ip.into(),
            port,
            cluster_name: "DEFAULT".to_string(),
            weight: 1.0,
            healthy: true,
            enabled: true,
            ephemeral: true,
            last_beat: 0,
            metadata: BTreeMap::new(),
        }
    }

    /// `ip:port`, unique within one instance list
    pub fn address(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}

/// Full instance list of one service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Instances {
    pub instances: Vec<Instance>,
}

impl Instances {
    pub fn new(instances: Vec<Instance>) -> Self {
        Self { instances }
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceMeta {
    pub protect_threshold: f32,
    pub selector: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

/// Type-tagged record payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Record {
    Instances(Instances),
    ServiceMeta(ServiceMeta),
}

impl Record {
    /// Key kind this payload may be stored under
    pub fn kind(&self) -> KeyKind {
        match self {
            Record::Instances(_) => KeyKind::InstanceList,
            Record::ServiceMeta(_) => KeyKind::ServiceMeta,
        }
    }

    pub fn as_instances(&self) -> Option<&Instances> {
        match self {
            Record::Instances(i) => Some(i),
            _ => None,
        }
    }
}

impl From<Instances> for Record {
    fn from(value: Instances) -> Self {
        Record::Instances(value)
    }
}

impl From<ServiceMeta> for Record {
    fn from(value: ServiceMeta) -> Self {
        Record::ServiceMeta(value)
    }
}

/// Stored record: payload plus the version used for last-writer-wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Datum {
    pub key: String,
    pub value: Record,
    pub version: u64,
    /// Node that produced this version
    pub origin: u32,
}

impl Datum {
    pub fn new(
        key: impl Into<String>,
        value: Record,
        version: u64,
        origin: u32,
    ) -> Self {
        Self {
            key: key.into(),
            value,
            version,
            origin,
        }
    }

    /// Last-writer-wins: higher version wins, equal versions fall back to the
    /// higher origin node id. A datum never supersedes itself.
    pub fn supersedes(
        &self,
        other: &Datum,
    ) -> bool {
        (self.version, self.origin) > (other.version, other.origin)
    }
}
