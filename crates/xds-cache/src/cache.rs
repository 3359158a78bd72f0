//! Cache trait and ShardedCache implementation.
//!
//! The cache stores snapshots keyed by node identity. The [`ShardedCache`]
//! implementation uses `DashMap` so writers for different nodes never contend
//! on a global lock.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, trace};
use xds_core::NodeId;

use crate::snapshot::Snapshot;
use crate::stats::CacheStats;

/// Trait for per-node snapshot caches.
///
/// This is the surface a discovery server reads from and the revision
/// controller writes to.
pub trait Cache: Send + Sync {
    /// Get the snapshot for a node.
    fn get_snapshot(&self, node: &NodeId) -> Option<Arc<Snapshot>>;

    /// Set the snapshot for a node, replacing any previous one.
    fn set_snapshot(&self, node: &NodeId, snapshot: Snapshot);

    /// Clear the snapshot for a node.
    fn clear_snapshot(&self, node: &NodeId);

    /// Get the number of cached snapshots.
    fn snapshot_count(&self) -> usize;
}

/// A sharded snapshot cache using DashMap.
///
/// ## Thread Safety
///
/// All operations are thread-safe. The cache uses `DashMap` internally,
/// which provides fine-grained locking at the shard level rather than
/// a global lock.
///
/// ## Important
///
/// Shard guards are never returned to callers: reads clone the `Arc` and
/// release the guard immediately, so no lock is held across an `.await`.
#[derive(Debug)]
pub struct ShardedCache {
    snapshots: DashMap<NodeId, Arc<Snapshot>>,
    stats: CacheStats,
}

impl Default for ShardedCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ShardedCache {
    /// Create a new sharded cache with default settings.
    pub fn new() -> Self {
        Self::with_capacity(64)
    }

    /// Create a new sharded cache with a specific initial capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            snapshots: DashMap::with_capacity(capacity),
            stats: CacheStats::new(),
        }
    }

    /// Get cache statistics.
    #[inline]
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Get all nodes with a cached snapshot.
    pub fn nodes(&self) -> Vec<NodeId> {
        self.snapshots.iter().map(|r| r.key().clone()).collect()
    }

    /// Check if a snapshot exists for a node.
    pub fn has_snapshot(&self, node: &NodeId) -> bool {
        self.snapshots.contains_key(node)
    }
}

impl Cache for ShardedCache {
    fn get_snapshot(&self, node: &NodeId) -> Option<Arc<Snapshot>> {
        let result = self.snapshots.get(node).map(|r| Arc::clone(&*r));

        if result.is_some() {
            self.stats.record_hit();
            trace!(node = %node, "cache hit");
        } else {
            self.stats.record_miss();
            trace!(node = %node, "cache miss");
        }

        result
    }

    fn set_snapshot(&self, node: &NodeId, snapshot: Snapshot) {
        let version = snapshot.version().clone();
        let resources = snapshot.total_resources();

        let previous = self.snapshots.insert(node.clone(), Arc::new(snapshot));
        self.stats.record_set(previous.is_some());

        debug!(
            node = %node,
            version = %version,
            resources,
            replaced = previous.is_some(),
            "set snapshot"
        );
    }

    fn clear_snapshot(&self, node: &NodeId) {
        if self.snapshots.remove(node).is_some() {
            self.stats.record_clear();
            debug!(node = %node, "cleared snapshot");
        }
    }

    fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }
}
