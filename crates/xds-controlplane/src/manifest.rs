//! Multi-document YAML manifests and status reports.
//!
//! A manifest is a stream of `---`-separated documents, each carrying a
//! `kind` of `NodeConfigCache` or `Secret` in the same shape the store holds.
//!
//! ```yaml
//! kind: NodeConfigCache
//! metadata:
//!   name: edge
//! spec:
//!   nodeID: edge
//!   serialization: yaml
//!   resources:
//!     clusters:
//!       - name: backend
//!         value: "name: backend\ntype: STATIC"
//! ```

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use xds_cache::Cache;
use xds_core::{NodeId, XdsResult};
use xds_revision::api::{
    CacheState, Condition, NodeConfigCache, NodeConfigRevision, Object, Secret, NODE_ID_LABEL,
};
use xds_revision::store::{LabelSelector, ObjectStore};

/// Namespace assigned to manifest objects that do not name one.
pub const DEFAULT_NAMESPACE: &str = "default";

/// One manifest document.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "kind")]
pub enum ManifestObject {
    /// Desired proxy configuration.
    NodeConfigCache(NodeConfigCache),
    /// Credentials referenced by TLS secret resources.
    Secret(Secret),
}

impl ManifestObject {
    fn namespace_mut(&mut self) -> &mut String {
        match self {
            ManifestObject::NodeConfigCache(ncc) => &mut ncc.metadata_mut().namespace,
            ManifestObject::Secret(secret) => &mut secret.metadata_mut().namespace,
        }
    }
}

/// Parse every non-empty document of a manifest.
pub fn parse_manifest(raw: &str) -> Result<Vec<ManifestObject>> {
    let mut objects = Vec::new();
    for (index, document) in serde_yaml::Deserializer::from_str(raw).enumerate() {
        let value = serde_yaml::Value::deserialize(document)
            .with_context(|| format!("manifest document {index} is not valid YAML"))?;
        if value.is_null() {
            continue;
        }
        let mut object: ManifestObject = serde_yaml::from_value(value)
            .with_context(|| format!("manifest document {index} is not a known object"))?;
        let namespace = object.namespace_mut();
        if namespace.is_empty() {
            *namespace = DEFAULT_NAMESPACE.to_string();
        }
        objects.push(object);
    }
    if objects.is_empty() {
        bail!("manifest contains no objects");
    }
    Ok(objects)
}

/// Create every object in the store, secrets first.
pub async fn apply_manifest<S: ObjectStore>(
    store: &S,
    mut objects: Vec<ManifestObject>,
) -> Result<usize> {
    objects.sort_by_key(|object| matches!(object, ManifestObject::NodeConfigCache(_)));
    let count = objects.len();
    for object in objects {
        match object {
            ManifestObject::Secret(secret) => {
                let key = secret.key();
                store
                    .create(secret)
                    .await
                    .with_context(|| format!("cannot create Secret {key}"))?;
            }
            ManifestObject::NodeConfigCache(ncc) => {
                let key = ncc.key();
                store
                    .create(ncc)
                    .await
                    .with_context(|| format!("cannot create NodeConfigCache {key}"))?;
            }
        }
    }
    Ok(count)
}

/// State of one revision in a [`CacheReport`].
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionReport {
    /// Content hash.
    pub version: String,
    /// Selected for publication.
    pub selected: bool,
    /// Successfully loaded into the cache at least once.
    pub published: bool,
    /// Excluded from publication.
    pub tainted: bool,
}

/// Status summary of one desired-state record.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheReport {
    /// `namespace/name` of the record.
    pub key: String,
    /// Node the record configures.
    pub node_id: String,
    /// Hash of the current spec.
    pub desired_version: String,
    /// Version selected for publication.
    pub published_version: String,
    /// Whether desired and published versions match.
    pub cache_state: Option<CacheState>,
    /// Version of the snapshot currently in the cache, if any.
    pub cached_version: Option<String>,
    /// History, oldest first, joined with the revision records.
    pub revisions: Vec<RevisionReport>,
    /// Conditions on the record.
    pub conditions: Vec<Condition>,
}

/// Summarize every desired-state record together with the cache contents.
pub async fn report<S: ObjectStore>(store: &S, cache: &dyn Cache) -> XdsResult<Vec<CacheReport>> {
    let caches: Vec<NodeConfigCache> = store.list(None, &LabelSelector::everything()).await?;
    let mut reports = Vec::with_capacity(caches.len());
    for ncc in caches {
        let revisions: Vec<NodeConfigRevision> = store
            .list(
                Some(&ncc.metadata.namespace),
                &LabelSelector::everything().with(NODE_ID_LABEL, ncc.spec.node_id.clone()),
            )
            .await?;
        let cached_version = NodeId::new(&ncc.spec.node_id)
            .ok()
            .and_then(|node| cache.get_snapshot(&node))
            .map(|snapshot| snapshot.version().to_string());

        reports.push(CacheReport {
            key: ncc.key().to_string(),
            node_id: ncc.spec.node_id.clone(),
            desired_version: ncc.status.desired_version.to_string(),
            published_version: ncc.status.published_version.to_string(),
            cache_state: ncc.status.cache_state,
            cached_version,
            revisions: ncc
                .status
                .config_revisions
                .iter()
                .map(|entry| {
                    let record = revisions.iter().find(|r| r.spec.version == entry.version);
                    RevisionReport {
                        version: entry.version.to_string(),
                        selected: record.is_some_and(NodeConfigRevision::is_selected),
                        published: record.is_some_and(|r| r.status.published),
                        tainted: record.map_or(true, NodeConfigRevision::is_tainted),
                    }
                })
                .collect(),
            conditions: ncc.status.conditions.iter().cloned().collect(),
        });
    }
    Ok(reports)
}
