//! Shared fixtures for the integration tests.
//!
//! [`Harness`] drives both reconcilers by hand so a test can observe every
//! intermediate state; tests of the spawned runtime use
//! [`ControlPlane::start`] directly.

use std::sync::Arc;

use xds_cache::{Cache, ShardedCache, Snapshot};
use xds_core::{NodeId, XdsResult};
use xds_revision::api::{
    EnvoyResource, EnvoyResources, NodeConfigCache, NodeConfigRevision, ObjectKey, NODE_ID_LABEL,
};
use xds_revision::store::{LabelSelector, MemoryStore, ObjectStore};
use xds_revision::{Action, ControlPlane, ControllerConfig, Reconciler};

/// Namespace used by every fixture.
pub const NAMESPACE: &str = "default";

/// JSON for a listener bound to `port`.
pub fn listener_json(name: &str, port: u32) -> String {
    serde_json::json!({
        "name": name,
        "address": {"socket_address": {"address": "0.0.0.0", "port_value": port}}
    })
    .to_string()
}

/// JSON for a route configuration with one catch-all virtual host.
pub fn route_json(name: &str, cluster: &str) -> String {
    serde_json::json!({
        "name": name,
        "virtual_hosts": [{
            "name": "all",
            "domains": ["*"],
            "routes": [{"match": {"prefix": "/"}, "route": {"cluster": cluster}}]
        }]
    })
    .to_string()
}

/// One listener, nothing else.
pub fn single_listener(name: &str, port: u32) -> EnvoyResources {
    EnvoyResources {
        listeners: vec![EnvoyResource::new(name, listener_json(name, port))],
        ..Default::default()
    }
}

/// Reconcilers driven step by step against an in-memory store.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub plane: ControlPlane<MemoryStore>,
    caches: xds_revision::CacheReconciler<MemoryStore>,
    revisions: xds_revision::RevisionReconciler<MemoryStore>,
}

impl Harness {
    pub fn new(config: ControllerConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let plane = ControlPlane::new(Arc::clone(&store), config);
        Self {
            caches: plane.cache_reconciler(),
            revisions: plane.revision_reconciler(),
            store,
            plane,
        }
    }

    pub fn cache(&self) -> &Arc<ShardedCache> {
        self.plane.cache()
    }

    pub fn snapshot(&self, node: &str) -> Option<Arc<Snapshot>> {
        self.cache().get_snapshot(&NodeId::new(node).ok()?)
    }

    pub async fn create(&self, name: &str, node: &str, resources: EnvoyResources) {
        self.store
            .create(NodeConfigCache::new(NAMESPACE, name, node, resources))
            .await
            .unwrap();
    }

    pub async fn edit(&self, name: &str, edit: impl FnOnce(&mut NodeConfigCache)) {
        let mut ncc = self.get(name).await;
        edit(&mut ncc);
        self.store.update(ncc).await.unwrap();
    }

    pub async fn get(&self, name: &str) -> NodeConfigCache {
        self.store
            .get(&ObjectKey::new(NAMESPACE, name))
            .await
            .unwrap()
    }

    pub async fn revisions(&self, node: &str) -> Vec<NodeConfigRevision> {
        self.store
            .list(
                Some(NAMESPACE),
                &LabelSelector::everything().with(NODE_ID_LABEL, node),
            )
            .await
            .unwrap()
    }

    pub async fn revision(&self, node: &str, version: &str) -> NodeConfigRevision {
        self.revisions(node)
            .await
            .into_iter()
            .find(|r| r.spec.version == version)
            .unwrap()
    }

    /// Run the desired-state reconciler once for `name`.
    pub async fn reconcile_cache(&self, name: &str) -> XdsResult<Action> {
        self.caches
            .reconcile(&ObjectKey::new(NAMESPACE, name))
            .await
    }

    /// Run the revision reconciler once for every revision of `node`.
    pub async fn reconcile_revisions(&self, node: &str) -> Vec<XdsResult<Action>> {
        let mut results = Vec::new();
        for revision in self.revisions(node).await {
            results.push(
                self.revisions
                    .reconcile(&ObjectKey::new(NAMESPACE, revision.metadata.name))
                    .await,
            );
        }
        results
    }

    /// Both reconcilers, desired state first.
    pub async fn step(&self, name: &str, node: &str) -> Vec<XdsResult<Action>> {
        self.reconcile_cache(name).await.unwrap();
        self.reconcile_revisions(node).await
    }
}
