//! Revision lifecycle.
//!
//! A revision is an immutable copy of a desired-state specification named by
//! the hash of its content. Each desired-state record keeps an ordered,
//! bounded history of the versions it has described; the newest untainted
//! entry is the one to publish.

use std::sync::Arc;

use tracing::{debug, info};
use xds_core::{NodeId, ResourceVersion, XdsError, XdsResult};

use crate::api::{
    ConfigRevisionRef, Condition, EnvoyResource, EnvoyResources, NodeConfigCache,
    NodeConfigRevision, NodeConfigRevisionSpec, NodeConfigRevisionStatus, Object, ObjectMeta,
    Serialization, NODE_ID_LABEL, REVISION_PUBLISHED, VERSION_LABEL,
};
use crate::metrics::ControllerMetrics;
use crate::store::{LabelSelector, ObjectStore};

/// Hash of a specification.
///
/// Resource lists are sorted by name then value before hashing, so reordering
/// a list keeps the version while any change to a name, a value, a secret
/// reference or the serialization produces a new one.
///
/// # Example
///
/// ```rust
/// use xds_revision::api::{EnvoyResource, EnvoyResources, Serialization};
/// use xds_revision::revision::compute_desired_version;
///
/// let a = EnvoyResources {
///     listeners: vec![EnvoyResource::new("l1", "{}"), EnvoyResource::new("l2", "{}")],
///     ..Default::default()
/// };
/// let mut b = a.clone();
/// b.listeners.reverse();
///
/// assert_eq!(
///     compute_desired_version(Serialization::Json, &a),
///     compute_desired_version(Serialization::Json, &b),
/// );
/// ```
pub fn compute_desired_version(
    serialization: Serialization,
    resources: &EnvoyResources,
) -> ResourceVersion {
    let mut canonical = Vec::new();
    push_field(&mut canonical, serialization.as_str());

    let lists: [(&str, &[EnvoyResource]); 5] = [
        ("endpoints", &resources.endpoints),
        ("clusters", &resources.clusters),
        ("routes", &resources.routes),
        ("listeners", &resources.listeners),
        ("runtimes", &resources.runtimes),
    ];
    for (label, entries) in lists {
        let mut sorted: Vec<&EnvoyResource> = entries.iter().collect();
        sorted.sort();
        push_field(&mut canonical, label);
        canonical.extend_from_slice(&(sorted.len() as u64).to_be_bytes());
        for entry in sorted {
            push_field(&mut canonical, &entry.name);
            push_field(&mut canonical, &entry.value);
        }
    }

    let mut secrets: Vec<_> = resources.secrets.iter().collect();
    secrets.sort();
    push_field(&mut canonical, "secrets");
    canonical.extend_from_slice(&(secrets.len() as u64).to_be_bytes());
    for secret in secrets {
        push_field(&mut canonical, &secret.name);
        push_field(&mut canonical, &secret.reference.namespace);
        push_field(&mut canonical, &secret.reference.name);
    }

    ResourceVersion::from_content(&canonical)
}

/// Length-prefixed so field boundaries cannot be shifted between entries.
fn push_field(buf: &mut Vec<u8>, field: &str) {
    buf.extend_from_slice(&(field.len() as u64).to_be_bytes());
    buf.extend_from_slice(field.as_bytes());
}

/// Fold the desired version into the history.
///
/// The desired entry always ends up newest: appended when absent, moved to the
/// end when present elsewhere. Oldest entries beyond `retention` are dropped,
/// skipping the published and desired versions. Returns whether the history
/// changed.
pub fn consolidate_history(
    history: &mut Vec<ConfigRevisionRef>,
    desired: ConfigRevisionRef,
    published: &ResourceVersion,
    retention: usize,
) -> bool {
    let mut changed = false;
    match history.iter().position(|r| r.version == desired.version) {
        Some(pos) if pos + 1 == history.len() => {}
        Some(pos) => {
            let entry = history.remove(pos);
            history.push(entry);
            changed = true;
        }
        None => {
            history.push(desired);
            changed = true;
        }
    }

    let retention = retention.max(1);
    while history.len() > retention {
        let newest = history.len() - 1;
        let Some(pos) = history[..newest]
            .iter()
            .position(|r| &r.version != published)
        else {
            break;
        };
        history.remove(pos);
        changed = true;
    }
    changed
}

/// Newest history entry whose revision exists and is not tainted.
///
/// A history entry without a matching record is skipped like a tainted one.
pub fn select_publishable(
    history: &[ConfigRevisionRef],
    revisions: &[NodeConfigRevision],
) -> Option<ResourceVersion> {
    history
        .iter()
        .rev()
        .find(|entry| {
            revisions
                .iter()
                .any(|rev| rev.spec.version == entry.version && !rev.is_tainted())
        })
        .map(|entry| entry.version.clone())
}

/// Store-backed revision operations.
#[derive(Debug)]
pub struct RevisionManager<S> {
    store: Arc<S>,
    metrics: ControllerMetrics,
}

impl<S> Clone for RevisionManager<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            metrics: self.metrics.clone(),
        }
    }
}

impl<S: ObjectStore> RevisionManager<S> {
    pub fn new(store: Arc<S>, metrics: ControllerMetrics) -> Self {
        Self { store, metrics }
    }

    /// All revision records of a node.
    pub async fn list(&self, namespace: &str, node: &NodeId) -> XdsResult<Vec<NodeConfigRevision>> {
        self.store
            .list(
                Some(namespace),
                &LabelSelector::everything().with(NODE_ID_LABEL, node.as_str()),
            )
            .await
    }

    /// Find or create the revision of `cache` at `version`.
    pub async fn ensure_revision(
        &self,
        cache: &NodeConfigCache,
        node: &NodeId,
        version: &ResourceVersion,
    ) -> XdsResult<NodeConfigRevision> {
        let namespace = cache.metadata.namespace.as_str();
        let selector = LabelSelector::everything()
            .with(NODE_ID_LABEL, node.as_str())
            .with(VERSION_LABEL, version.as_str());
        let existing: Vec<NodeConfigRevision> = self.store.list(Some(namespace), &selector).await?;
        if let Some(revision) = existing.into_iter().next() {
            return Ok(revision);
        }

        let mut metadata = ObjectMeta::new(namespace, format!("{node}-{version}"));
        metadata
            .labels
            .insert(NODE_ID_LABEL.to_string(), node.to_string());
        metadata
            .labels
            .insert(VERSION_LABEL.to_string(), version.to_string());
        metadata.owner_references.push(cache.owner_reference(true));

        let revision = NodeConfigRevision {
            metadata,
            spec: NodeConfigRevisionSpec {
                node_id: node.to_string(),
                version: version.clone(),
                serialization: cache.spec.serialization,
                resources: cache.spec.resources.clone(),
            },
            status: NodeConfigRevisionStatus::default(),
        };
        let key = revision.key();

        match self.store.create(revision).await {
            Ok(created) => {
                self.metrics.revision_created();
                info!(node = %node, version = %version, "created revision");
                Ok(created)
            }
            Err(XdsError::AlreadyExists { .. }) => self.store.get(&key).await,
            Err(e) => Err(e),
        }
    }

    /// Delete the node's revisions that are neither in `history` nor published.
    pub async fn garbage_collect(
        &self,
        namespace: &str,
        node: &NodeId,
        history: &[ConfigRevisionRef],
        published: &ResourceVersion,
    ) -> XdsResult<usize> {
        let mut deleted = 0;
        for revision in self.list(namespace, node).await? {
            let version = &revision.spec.version;
            if version == published || history.iter().any(|r| &r.version == version) {
                continue;
            }
            match self.store.delete::<NodeConfigRevision>(&revision.key()).await {
                Ok(()) => {
                    debug!(node = %node, version = %version, "garbage collected revision");
                    deleted += 1;
                }
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }
        self.metrics.revisions_collected(deleted);
        Ok(deleted)
    }

    /// Select `version` for publication and deselect every other revision.
    pub async fn mark_published(
        &self,
        namespace: &str,
        node: &NodeId,
        version: &ResourceVersion,
    ) -> XdsResult<()> {
        let revisions = self.list(namespace, node).await?;
        if !revisions.iter().any(|r| &r.spec.version == version) {
            return Err(XdsError::not_found(
                NodeConfigRevision::KIND,
                format!("{namespace}/{node}-{version}"),
            ));
        }

        for mut revision in revisions {
            let changed = if &revision.spec.version == version {
                revision.status.conditions.set(Condition::truthy(
                    REVISION_PUBLISHED,
                    "VersionPublished",
                    format!("Version '{version}' has been published"),
                ))
            } else {
                let was_published = std::mem::take(&mut revision.status.published);
                revision.status.conditions.remove(REVISION_PUBLISHED) || was_published
            };
            if changed {
                debug!(
                    node = %node,
                    version = %revision.spec.version,
                    selected = revision.spec.version == *version,
                    "updating revision selection"
                );
                self.store.update_status(revision).await?;
            }
        }
        Ok(())
    }
}
