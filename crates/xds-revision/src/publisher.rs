//! Cache publication.
//!
//! Writing an equal snapshot would still bump the version the proxies see
//! and trigger a full push, so publication compares content first.

use std::sync::Arc;

use tracing::{debug, info};
use xds_cache::{snapshots_equal, Cache, Snapshot};
use xds_core::NodeId;

use crate::metrics::ControllerMetrics;

/// Result of [`CachePublisher::publish_if_changed`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The snapshot was written.
    Published,
    /// The cache already held equal content; nothing was written.
    Unchanged,
}

/// Writes snapshots into the shared per-node cache.
#[derive(Clone)]
pub struct CachePublisher {
    cache: Arc<dyn Cache>,
    metrics: ControllerMetrics,
}

impl std::fmt::Debug for CachePublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachePublisher")
            .field("snapshots", &self.cache.snapshot_count())
            .finish()
    }
}

impl CachePublisher {
    pub fn new(cache: Arc<dyn Cache>, metrics: ControllerMetrics) -> Self {
        Self { cache, metrics }
    }

    #[inline]
    pub fn current(&self, node: &NodeId) -> Option<Arc<Snapshot>> {
        self.cache.get_snapshot(node)
    }

    /// Write `snapshot` unless the cache already holds equal content.
    pub fn publish_if_changed(&self, node: &NodeId, snapshot: Snapshot) -> PublishOutcome {
        if let Some(current) = self.cache.get_snapshot(node) {
            if snapshots_equal(&current, &snapshot) {
                debug!(
                    node = %node,
                    version = %current.version(),
                    "snapshot unchanged, skipping publication"
                );
                self.metrics.snapshot_unchanged();
                return PublishOutcome::Unchanged;
            }
        }
        self.publish(node, snapshot);
        PublishOutcome::Published
    }

    /// Write unconditionally.
    pub fn publish(&self, node: &NodeId, snapshot: Snapshot) {
        info!(
            node = %node,
            version = %snapshot.version(),
            resources = snapshot.total_resources(),
            "publishing snapshot"
        );
        self.cache.set_snapshot(node, snapshot);
        self.metrics.snapshot_published();
    }

    pub fn clear(&self, node: &NodeId) {
        info!(node = %node, "clearing snapshot");
        self.cache.clear_snapshot(node);
    }
}
