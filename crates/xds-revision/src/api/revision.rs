//! The revision record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use xds_core::ResourceVersion;

use super::conditions::{
    ConditionStatus, Conditions, RESOURCES_OUT_OF_SYNC, REVISION_PUBLISHED, REVISION_TAINTED,
};
use super::meta::{Object, ObjectMeta};
use super::resources::{EnvoyResources, Serialization};

/// `RevisionTainted` reasons written when loading the revision fails.
pub const LOAD_FAILURE_REASONS: [&str; 3] =
    ["ResourceDecodeError", "ResourceValidationError", "InvalidObject"];

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeConfigRevisionSpec {
    #[serde(rename = "nodeID")]
    pub node_id: String,
    pub version: ResourceVersion,
    #[serde(default)]
    pub serialization: Serialization,
    #[serde(default)]
    pub resources: EnvoyResources,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeConfigRevisionStatus {
    /// The snapshot of this revision has been pushed or confirmed.
    #[serde(default)]
    pub published: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tainted: bool,
    #[serde(default, skip_serializing_if = "Conditions::is_empty")]
    pub conditions: Conditions,
}

/// Immutable, content-addressed copy of a desired-state specification.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeConfigRevision {
    pub metadata: ObjectMeta,
    pub spec: NodeConfigRevisionSpec,
    #[serde(default)]
    pub status: NodeConfigRevisionStatus,
}

impl NodeConfigRevision {
    /// Selected for publication. This is the condition, not `status.published`.
    pub fn is_selected(&self) -> bool {
        self.status.conditions.is_true_for(REVISION_PUBLISHED)
    }

    /// Tainted by the revision loop or by an operator.
    pub fn is_tainted(&self) -> bool {
        self.status.tainted || self.status.conditions.is_true_for(REVISION_TAINTED)
    }

    /// Tainted by someone other than the revision loop. Only they can lift it.
    pub fn is_held(&self) -> bool {
        self.status.conditions.get(REVISION_TAINTED).is_some_and(|c| {
            c.status == ConditionStatus::True && !LOAD_FAILURE_REASONS.contains(&c.reason.as_str())
        })
    }

    /// Drop a taint left by a failed load. Returns whether anything changed.
    pub fn clear_load_taint(&mut self) -> bool {
        if self.is_held() {
            return false;
        }
        let flagged = std::mem::replace(&mut self.status.tainted, false);
        let conditioned = self.status.conditions.remove(REVISION_TAINTED);
        flagged || conditioned
    }

    /// Another controller asked for the snapshot to be pushed again.
    pub fn resync_requested(&self) -> bool {
        self.status.conditions.is_true_for(RESOURCES_OUT_OF_SYNC)
    }
}

impl Object for NodeConfigRevision {
    const KIND: &'static str = "NodeConfigRevision";

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}
