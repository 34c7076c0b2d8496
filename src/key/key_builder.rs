//! Deterministic, reversible record keys.
//!
//! A key is laid out as
//!
//! ```text
//! <kind prefix>[ephemeral.]<namespace>##<service name>
//! ```
//!
//! The kind prefix routes a record to the right listener and replication
//! category. It doubles as the `resource_type` of a [`DistroKey`].
//!
//! [`DistroKey`]: crate::replication::DistroKey

use serde::Deserialize;
use serde::Serialize;

use crate::constants::EPHEMERAL_KEY_PREFIX;
use crate::constants::INSTANCE_LIST_KEY_PREFIX;
use crate::constants::NAMESPACE_KEY_CONNECTOR;
use crate::constants::SERVICE_META_KEY_PREFIX;
use crate::KeyError;

/// Record type encoded in the key prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyKind {
    InstanceList,
    ServiceMeta,
}

impl KeyKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            KeyKind::InstanceList => INSTANCE_LIST_KEY_PREFIX,
            KeyKind::ServiceMeta => SERVICE_META_KEY_PREFIX,
        }
    }

    /// Replication category of records of this kind
    pub fn resource_type(&self) -> &'static str {
        self.prefix()
    }

    fn from_key(key: &str) -> Option<(KeyKind, &str)> {
        [KeyKind::InstanceList, KeyKind::ServiceMeta]
            .into_iter()
            .find_map(|kind| key.strip_prefix(kind.prefix()).map(|rest| (kind, rest)))
    }
}

/// Components recovered from a key by [`KeyBuilder::parse`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedKey {
    pub kind: KeyKind,
    pub namespace: String,
    pub service_name: String,
    pub ephemeral: bool,
}

pub struct KeyBuilder;

impl KeyBuilder {
    pub fn build_instance_list_key(
        namespace: &str,
        service_name: &str,
        ephemeral: bool,
    ) -> String {
        Self::build(KeyKind::InstanceList, namespace, service_name, ephemeral)
    }

    pub fn build_service_meta_key(
        namespace: &str,
        service_name: &str,
        ephemeral: bool,
    ) -> String {
        Self::build(KeyKind::ServiceMeta, namespace, service_name, ephemeral)
    }

    pub fn build(
        kind: KeyKind,
        namespace: &str,
        service_name: &str,
        ephemeral: bool,
    ) -> String {
        let marker = if ephemeral { EPHEMERAL_KEY_PREFIX } else { "" };
        format!(
            "{}{}{}{}{}",
            kind.prefix(),
            marker,
            namespace,
            NAMESPACE_KEY_CONNECTOR,
            service_name
        )
    }

    /// Splits a key back into its components.
    ///
    /// Namespace and service name must both be non-empty. The service name may
    /// itself contain the connector, only the first occurrence separates.
    pub fn parse(key: &str) -> std::result::Result<ParsedKey, KeyError> {
        if key.is_empty() {
            return Err(KeyError::Empty);
        }

        let (kind, rest) =
            KeyKind::from_key(key).ok_or_else(|| KeyError::UnknownPrefix(key.to_string()))?;

        let (ephemeral, rest) = match rest.strip_prefix(EPHEMERAL_KEY_PREFIX) {
            Some(rest) => (true, rest),
            None => (false, rest),
        };

        let (namespace, service_name) = rest
            .split_once(NAMESPACE_KEY_CONNECTOR)
            .filter(|(ns, svc)| !ns.is_empty() && !svc.is_empty())
            .ok_or_else(|| KeyError::Malformed(key.to_string()))?;

        Ok(ParsedKey {
            kind,
            namespace: namespace.to_string(),
            service_name: service_name.to_string(),
            ephemeral,
        })
    }

    /// Parses the key and requires it to address an ephemeral record.
    pub fn parse_ephemeral(key: &str) -> std::result::Result<ParsedKey, KeyError> {
        let parsed = Self::parse(key)?;
        if !parsed.ephemeral {
            return Err(KeyError::NotEphemeral(key.to_string()));
        }
        Ok(parsed)
    }

    pub fn matches_ephemeral_key(key: &str) -> bool {
        Self::parse_ephemeral(key).is_ok()
    }

    pub fn matches_instance_list_key(key: &str) -> bool {
        key.starts_with(INSTANCE_LIST_KEY_PREFIX)
    }

    pub fn matches_service_meta_key(key: &str) -> bool {
        key.starts_with(SERVICE_META_KEY_PREFIX)
    }

    pub fn resource_type(key: &str) -> std::result::Result<&'static str, KeyError> {
        Ok(Self::parse(key)?.kind.resource_type())
    }
}
