//! Wiring of both controllers around one store and one cache.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info};
use xds_cache::ShardedCache;

use crate::config::ControllerConfig;
use crate::metrics::ControllerMetrics;
use crate::publisher::CachePublisher;
use crate::reconcile::{CacheReconciler, RevisionReconciler};
use crate::runtime::{Controller, WorkTracker};
use crate::shutdown::ShutdownController;
use crate::store::ObjectStore;

/// The desired-state and revision controllers sharing a store and a cache.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use std::time::Duration;
/// use xds_revision::{api::{EnvoyResource, EnvoyResources, NodeConfigCache}, ControlPlane, ControllerConfig};
/// use xds_revision::store::{MemoryStore, ObjectStore};
/// use xds_cache::Cache;
/// use xds_core::NodeId;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let store = Arc::new(MemoryStore::new());
/// let plane = ControlPlane::new(Arc::clone(&store), ControllerConfig::default());
/// let running = plane.start();
///
/// let resources = EnvoyResources {
///     listeners: vec![EnvoyResource::new("http", r#"{"name":"http"}"#)],
///     ..Default::default()
/// };
/// store.create(NodeConfigCache::new("default", "edge", "edge", resources)).await.unwrap();
///
/// running.wait_settled(Duration::from_millis(100)).await;
/// assert!(plane.cache().get_snapshot(&NodeId::new("edge").unwrap()).is_some());
/// running.shutdown(Duration::from_secs(1)).await;
/// # });
/// ```
#[derive(Debug)]
pub struct ControlPlane<S> {
    store: Arc<S>,
    cache: Arc<ShardedCache>,
    config: ControllerConfig,
    metrics: ControllerMetrics,
    shutdown: ShutdownController,
}

impl<S: ObjectStore> ControlPlane<S> {
    pub fn new(store: Arc<S>, config: ControllerConfig) -> Self {
        Self {
            store,
            cache: Arc::new(ShardedCache::new()),
            config,
            metrics: ControllerMetrics::new(),
            shutdown: ShutdownController::new(),
        }
    }

    /// Publish into an existing cache, e.g. one a discovery server reads.
    pub fn with_cache(mut self, cache: Arc<ShardedCache>) -> Self {
        self.cache = cache;
        self
    }

    #[inline]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    #[inline]
    pub fn cache(&self) -> &Arc<ShardedCache> {
        &self.cache
    }

    #[inline]
    pub fn metrics(&self) -> &ControllerMetrics {
        &self.metrics
    }

    #[inline]
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    fn publisher(&self) -> CachePublisher {
        CachePublisher::new(self.cache.clone(), self.metrics.clone())
    }

    pub fn cache_reconciler(&self) -> CacheReconciler<S> {
        CacheReconciler::new(
            Arc::clone(&self.store),
            self.publisher(),
            self.config.clone(),
            self.metrics.clone(),
        )
    }

    pub fn revision_reconciler(&self) -> RevisionReconciler<S> {
        RevisionReconciler::new(
            Arc::clone(&self.store),
            self.publisher(),
            self.config.clone(),
            self.metrics.clone(),
        )
    }

    /// Spawn both controllers on the current runtime.
    pub fn start(&self) -> RunningControlPlane {
        let tracker = WorkTracker::new();
        // Subscribe before spawning so no event between listing and the first
        // receive is lost.
        let cache_events = self.store.subscribe();
        let revision_events = self.store.subscribe();

        let handles = vec![
            Controller::new(
                self.cache_reconciler(),
                self.config.clone(),
                self.metrics.clone(),
                self.shutdown.clone(),
            )
            .with_tracker(tracker.clone())
            .spawn(cache_events),
            Controller::new(
                self.revision_reconciler(),
                self.config.clone(),
                self.metrics.clone(),
                self.shutdown.clone(),
            )
            .with_tracker(tracker.clone())
            .spawn(revision_events),
        ];
        info!(
            revision_retention = self.config.revision_retention,
            "control plane started"
        );

        RunningControlPlane {
            handles,
            tracker,
            shutdown: self.shutdown.clone(),
        }
    }
}

/// Handle to the spawned controllers.
#[derive(Debug)]
pub struct RunningControlPlane {
    handles: Vec<JoinHandle<()>>,
    tracker: WorkTracker,
    shutdown: ShutdownController,
}

impl RunningControlPlane {
    #[inline]
    pub fn tracker(&self) -> &WorkTracker {
        &self.tracker
    }

    pub fn shutdown_controller(&self) -> &ShutdownController {
        &self.shutdown
    }

    /// Wait until both controllers have been idle for `quiet`.
    pub async fn wait_settled(&self, quiet: Duration) {
        self.tracker.wait_settled(quiet).await;
    }

    /// Stop both controllers. Returns `false` if reconciles were still running
    /// when `grace_period` ran out.
    pub async fn shutdown(self, grace_period: Duration) -> bool {
        let graceful = self.shutdown.shutdown(grace_period).await;
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!(error = %e, "controller task failed");
            }
        }
        graceful
    }
}
