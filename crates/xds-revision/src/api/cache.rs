//! The desired-state record.

use serde::{Deserialize, Serialize};
use xds_core::ResourceVersion;

use super::conditions::Conditions;
use super::meta::{Object, ObjectKey, ObjectMeta};
use super::resources::{EnvoyResources, Serialization};

/// Whether the published version is the desired one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheState {
    InSync,
    Rollback,
}

impl CacheState {
    /// State for a pair of versions.
    pub fn of(desired: &ResourceVersion, published: &ResourceVersion) -> Self {
        if !published.is_empty() && desired == published {
            CacheState::InSync
        } else {
            CacheState::Rollback
        }
    }
}

/// An entry of the revision history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigRevisionRef {
    pub version: ResourceVersion,
    #[serde(rename = "ref")]
    pub reference: ObjectKey,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeConfigCacheSpec {
    #[serde(rename = "nodeID")]
    pub node_id: String,
    #[serde(default)]
    pub serialization: Serialization,
    #[serde(default)]
    pub resources: EnvoyResources,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeConfigCacheStatus {
    #[serde(default, skip_serializing_if = "ResourceVersion::is_empty")]
    pub desired_version: ResourceVersion,
    #[serde(default, skip_serializing_if = "ResourceVersion::is_empty")]
    pub published_version: ResourceVersion,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_state: Option<CacheState>,
    /// Oldest first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub config_revisions: Vec<ConfigRevisionRef>,
    #[serde(default, skip_serializing_if = "Conditions::is_empty")]
    pub conditions: Conditions,
}

/// Desired proxy configuration for one node.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeConfigCache {
    pub metadata: ObjectMeta,
    pub spec: NodeConfigCacheSpec,
    #[serde(default)]
    pub status: NodeConfigCacheStatus,
}

impl NodeConfigCache {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        node_id: impl Into<String>,
        resources: EnvoyResources,
    ) -> Self {
        Self {
            metadata: ObjectMeta::new(namespace, name),
            spec: NodeConfigCacheSpec {
                node_id: node_id.into(),
                serialization: Serialization::default(),
                resources,
            },
            status: NodeConfigCacheStatus::default(),
        }
    }

    /// Same record with a different serialization.
    pub fn with_serialization(mut self, serialization: Serialization) -> Self {
        self.spec.serialization = serialization;
        self
    }
}

impl Object for NodeConfigCache {
    const KIND: &'static str = "NodeConfigCache";

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_state_of_versions() {
        let v1 = ResourceVersion::new("v1");
        let v2 = ResourceVersion::new("v2");
        assert_eq!(CacheState::of(&v1, &v1), CacheState::InSync);
        assert_eq!(CacheState::of(&v2, &v1), CacheState::Rollback);
        assert_eq!(
            CacheState::of(&v1, &ResourceVersion::empty()),
            CacheState::Rollback
        );
    }

    #[test]
    fn wire_format() {
        let raw = serde_json::json!({
            "metadata": {"name": "gateway", "namespace": "default"},
            "spec": {
                "nodeID": "gateway",
                "serialization": "yaml",
                "resources": {"listeners": [{"name": "l1", "value": "name: l1"}]}
            }
        });
        let ncc: NodeConfigCache = serde_json::from_value(raw).unwrap();
        assert_eq!(ncc.spec.node_id, "gateway");
        assert_eq!(ncc.spec.serialization, Serialization::Yaml);
        assert_eq!(ncc.spec.resources.listeners.len(), 1);
        assert_eq!(ncc.status, NodeConfigCacheStatus::default());
    }
}
