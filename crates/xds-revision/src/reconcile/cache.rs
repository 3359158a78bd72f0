//! Desired-state reconciler.
//!
//! Turns a `NodeConfigCache` into a revision, folds it into the history and
//! selects the newest untainted revision for publication. The revision
//! reconciler then loads the selected revision into the cache.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};
use xds_core::{NodeId, XdsError, XdsResult};

use super::{Action, Reconciler};
use crate::api::{
    CacheState, Condition, ConfigRevisionRef, NodeConfigCache, NodeConfigCacheStatus,
    NodeConfigRevision, Object, ObjectKey, CACHE_OUT_OF_SYNC, NODE_CONFIG_CACHE_FINALIZER,
    NODE_ID_LABEL,
};
use crate::config::ControllerConfig;
use crate::metrics::ControllerMetrics;
use crate::publisher::CachePublisher;
use crate::revision::{
    compute_desired_version, consolidate_history, select_publishable, RevisionManager,
};
use crate::store::{LabelSelector, ObjectStore, StoreEvent};

const TAINTED_MESSAGE: &str =
    "The revision that describes the current spec is tainted due to detected failures";

/// Reconciles `NodeConfigCache` records.
#[derive(Debug)]
pub struct CacheReconciler<S> {
    store: Arc<S>,
    revisions: RevisionManager<S>,
    publisher: CachePublisher,
    config: ControllerConfig,
    metrics: ControllerMetrics,
}

impl<S: ObjectStore> CacheReconciler<S> {
    pub fn new(
        store: Arc<S>,
        publisher: CachePublisher,
        config: ControllerConfig,
        metrics: ControllerMetrics,
    ) -> Self {
        Self {
            revisions: RevisionManager::new(Arc::clone(&store), metrics.clone()),
            store,
            publisher,
            config,
            metrics,
        }
    }

    /// Drop the node's cache entry and release the record.
    async fn finalize(&self, mut ncc: NodeConfigCache) -> XdsResult<Action> {
        if !ncc.metadata.has_finalizer(NODE_CONFIG_CACHE_FINALIZER) {
            return Ok(Action::Done);
        }
        match NodeId::new(&ncc.spec.node_id) {
            Ok(node) => self.publisher.clear(&node),
            Err(e) => debug!(key = %ncc.key(), error = %e, "no cache entry to clear"),
        }
        ncc.metadata.remove_finalizer(NODE_CONFIG_CACHE_FINALIZER);
        info!(key = %ncc.key(), "removed finalizer");
        self.store.update(ncc).await?;
        Ok(Action::Done)
    }

    /// Surface a record that cannot be reconciled until it is edited.
    async fn report_invalid(&self, ncc: NodeConfigCache, error: XdsError) -> XdsResult<Action> {
        warn!(key = %ncc.key(), error = %error, "invalid NodeConfigCache");
        let mut status = ncc.status.clone();
        status.conditions.set(Condition::truthy(
            CACHE_OUT_OF_SYNC,
            error.reason(),
            error.to_string(),
        ));
        self.write_status(ncc, status).await?;
        Ok(Action::Done)
    }

    async fn write_status(
        &self,
        mut ncc: NodeConfigCache,
        status: NodeConfigCacheStatus,
    ) -> XdsResult<()> {
        if ncc.status == status {
            return Ok(());
        }
        ncc.status = status;
        self.store.update_status(ncc).await?;
        Ok(())
    }

    fn check_node_label(ncc: &NodeConfigCache, node: &NodeId) -> XdsResult<()> {
        match ncc.metadata.label(NODE_ID_LABEL) {
            Some(label) if label != node.as_str() => Err(XdsError::InvalidObject {
                kind: NodeConfigCache::KIND.to_string(),
                name: ncc.key().to_string(),
                reason: format!(
                    "spec.nodeID cannot change once set (was '{label}', now '{node}')"
                ),
            }),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl<S: ObjectStore> Reconciler for CacheReconciler<S> {
    const NAME: &'static str = "nodeconfigcache";

    #[instrument(name = "reconcile_cache", skip_all, fields(key = %key))]
    async fn reconcile(&self, key: &ObjectKey) -> XdsResult<Action> {
        let mut ncc: NodeConfigCache = match self.store.get(key).await {
            Ok(ncc) => ncc,
            Err(e) if e.is_not_found() => {
                debug!(key = %key, "NodeConfigCache gone");
                return Ok(Action::Done);
            }
            Err(e) => return Err(e),
        };

        if ncc.metadata.is_deleting() {
            return self.finalize(ncc).await;
        }

        let node = match NodeId::new(&ncc.spec.node_id)
            .and_then(|node| Self::check_node_label(&ncc, &node).map(|()| node))
        {
            Ok(node) => node,
            Err(e) => return self.report_invalid(ncc, e).await,
        };

        let mut changed = ncc.metadata.add_finalizer(NODE_CONFIG_CACHE_FINALIZER);
        if ncc.metadata.label(NODE_ID_LABEL).is_none() {
            ncc.metadata
                .labels
                .insert(NODE_ID_LABEL.to_string(), node.to_string());
            changed = true;
        }
        if changed {
            ncc = self.store.update(ncc).await?;
            debug!(key = %key, "added finalizer and node label");
        }

        let namespace = ncc.metadata.namespace.clone();
        let desired = compute_desired_version(ncc.spec.serialization, &ncc.spec.resources);
        let revision = self.revisions.ensure_revision(&ncc, &node, &desired).await?;

        let mut status = ncc.status.clone();
        status.desired_version = desired.clone();
        let published = status.published_version.clone();
        consolidate_history(
            &mut status.config_revisions,
            ConfigRevisionRef {
                version: desired.clone(),
                reference: revision.key(),
            },
            &published,
            self.config.revision_retention,
        );

        let revisions = self.revisions.list(&namespace, &node).await?;
        match select_publishable(&status.config_revisions, &revisions) {
            Some(version) => {
                self.revisions
                    .mark_published(&namespace, &node, &version)
                    .await?;
                if version != desired {
                    info!(
                        node = %node,
                        desired = %desired,
                        published = %version,
                        "desired revision tainted, rolled back"
                    );
                }
                status.published_version = version;
                status.cache_state = Some(CacheState::of(&desired, &status.published_version));
                status.conditions.remove(CACHE_OUT_OF_SYNC);
            }
            None => {
                warn!(node = %node, desired = %desired, "no untainted revision to publish");
                status.cache_state = Some(CacheState::of(&desired, &status.published_version));
                status.conditions.set(Condition::truthy(
                    CACHE_OUT_OF_SYNC,
                    XdsError::RevisionTainted {
                        node_id: node.to_string(),
                        desired: desired.to_string(),
                    }
                    .reason(),
                    TAINTED_MESSAGE,
                ));
                self.metrics.cache_out_of_sync();
            }
        }

        let history = status.config_revisions.clone();
        let published = status.published_version.clone();
        self.write_status(ncc, status).await?;
        self.revisions
            .garbage_collect(&namespace, &node, &history, &published)
            .await?;

        Ok(Action::Done)
    }

    async fn map_event(&self, event: &StoreEvent) -> Vec<ObjectKey> {
        if event.kind == NodeConfigCache::KIND {
            return vec![event.key.clone()];
        }
        if event.kind == NodeConfigRevision::KIND {
            return event
                .owners
                .iter()
                .filter(|owner| owner.controller && owner.kind == NodeConfigCache::KIND)
                .map(|owner| ObjectKey::new(event.key.namespace.clone(), owner.name.clone()))
                .collect();
        }
        Vec::new()
    }

    async fn list_keys(&self) -> XdsResult<Vec<ObjectKey>> {
        let caches: Vec<NodeConfigCache> =
            self.store.list(None, &LabelSelector::everything()).await?;
        Ok(caches.iter().map(Object::key).collect())
    }
}
