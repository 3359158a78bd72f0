//! Snapshot reconciler.
//!
//! Loads the revision selected for publication into a snapshot and pushes it
//! to the cache. Content that cannot be loaded taints the revision so the
//! desired-state reconciler can fall back to an older one.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, error, info, instrument, warn};
use xds_core::{NodeId, XdsError, XdsResult};

use super::{Action, Reconciler};
use crate::api::{
    Condition, NodeConfigRevision, Object, ObjectKey, Secret, RESOURCES_OUT_OF_SYNC,
    REVISION_TAINTED,
};
use crate::config::ControllerConfig;
use crate::loader::SnapshotLoader;
use crate::metrics::ControllerMetrics;
use crate::publisher::{CachePublisher, PublishOutcome};
use crate::store::{LabelSelector, ObjectStore, StoreEvent};

/// Reconciles `NodeConfigRevision` records.
#[derive(Debug)]
pub struct RevisionReconciler<S> {
    store: Arc<S>,
    loader: SnapshotLoader<S>,
    publisher: CachePublisher,
    config: ControllerConfig,
    metrics: ControllerMetrics,
}

impl<S: ObjectStore> RevisionReconciler<S> {
    pub fn new(
        store: Arc<S>,
        publisher: CachePublisher,
        config: ControllerConfig,
        metrics: ControllerMetrics,
    ) -> Self {
        Self {
            loader: SnapshotLoader::new(Arc::clone(&store)),
            store,
            publisher,
            config,
            metrics,
        }
    }

    async fn taint(&self, mut revision: NodeConfigRevision, cause: &XdsError) -> XdsResult<Action> {
        error!(
            key = %revision.key(),
            version = %revision.spec.version,
            error = %cause,
            "revision cannot be loaded, marking it tainted"
        );
        let flagged = !std::mem::replace(&mut revision.status.tainted, true);
        let conditioned = revision.status.conditions.set(Condition::truthy(
            REVISION_TAINTED,
            cause.reason(),
            cause.to_string(),
        ));
        if flagged || conditioned {
            self.store.update_status(revision).await?;
            self.metrics.revision_tainted(cause.reason());
        }
        Ok(Action::RequeueAfter(self.config.tainted_retry_delay))
    }

    /// Whether `revision` loads the secret at `key`.
    fn references_secret(revision: &NodeConfigRevision, key: &ObjectKey) -> bool {
        revision.spec.resources.secrets.iter().any(|entry| {
            let namespace = if entry.reference.namespace.is_empty() {
                revision.metadata.namespace.as_str()
            } else {
                entry.reference.namespace.as_str()
            };
            namespace == key.namespace && entry.reference.name == key.name
        })
    }
}

#[async_trait]
impl<S: ObjectStore> Reconciler for RevisionReconciler<S> {
    const NAME: &'static str = "nodeconfigrevision";

    #[instrument(name = "reconcile_revision", skip_all, fields(key = %key))]
    async fn reconcile(&self, key: &ObjectKey) -> XdsResult<Action> {
        let revision: NodeConfigRevision = match self.store.get(key).await {
            Ok(revision) => revision,
            Err(e) if e.is_not_found() => return Ok(Action::Done),
            Err(e) => return Err(e),
        };
        if revision.metadata.is_deleting() || !revision.is_selected() {
            return Ok(Action::Done);
        }
        if revision.is_held() {
            debug!(key = %key, version = %revision.spec.version, "revision held tainted, not publishing");
            return Ok(Action::Done);
        }

        let node = match NodeId::new(&revision.spec.node_id) {
            Ok(node) => node,
            Err(e) => return self.taint(revision, &e).await,
        };

        let snapshot = match self
            .loader
            .load_resources(
                &revision.metadata.namespace,
                &revision.spec.version,
                revision.spec.serialization,
                &revision.spec.resources,
            )
            .await
        {
            Ok(snapshot) => snapshot,
            Err(e) if e.is_specification() => return self.taint(revision, &e).await,
            Err(e) => return Err(e),
        };

        // Selection may have moved while the resources were loading.
        let mut revision: NodeConfigRevision = match self.store.get(key).await {
            Ok(revision) => revision,
            Err(e) if e.is_not_found() => return Ok(Action::Done),
            Err(e) => return Err(e),
        };
        if !revision.is_selected() || revision.is_held() {
            debug!(key = %key, version = %revision.spec.version, "selection changed while loading");
            return Ok(Action::Done);
        }

        let mut changed = revision.clear_load_taint();
        if changed {
            info!(node = %node, version = %revision.spec.version, "revision loads cleanly, taint lifted");
        }

        if revision.resync_requested() {
            self.publisher.publish(&node, snapshot);
            changed |= revision.status.conditions.remove(RESOURCES_OUT_OF_SYNC);
        } else {
            match self.publisher.publish_if_changed(&node, snapshot) {
                PublishOutcome::Published => {}
                PublishOutcome::Unchanged => {
                    debug!(node = %node, version = %revision.spec.version, "cache already up to date")
                }
            }
        }

        if !revision.status.published {
            revision.status.published = true;
            revision.status.last_published_at = Some(Utc::now());
            info!(node = %node, version = %revision.spec.version, "revision published");
            changed = true;
        }
        if changed {
            self.store.update_status(revision).await?;
        }
        Ok(Action::Done)
    }

    async fn map_event(&self, event: &StoreEvent) -> Vec<ObjectKey> {
        if event.kind == NodeConfigRevision::KIND {
            return vec![event.key.clone()];
        }
        if event.kind != Secret::KIND {
            return Vec::new();
        }

        // Rotated credentials must reach the proxies without a spec change.
        let revisions: Vec<NodeConfigRevision> =
            match self.store.list(None, &LabelSelector::everything()).await {
                Ok(revisions) => revisions,
                Err(e) => {
                    warn!(secret = %event.key, error = %e, "cannot list revisions for secret");
                    return Vec::new();
                }
            };
        revisions
            .iter()
            .filter(|r| r.is_selected() && Self::references_secret(r, &event.key))
            .map(Object::key)
            .collect()
    }

    async fn list_keys(&self) -> XdsResult<Vec<ObjectKey>> {
        let revisions: Vec<NodeConfigRevision> =
            self.store.list(None, &LabelSelector::everything()).await?;
        Ok(revisions.iter().map(Object::key).collect())
    }
}
