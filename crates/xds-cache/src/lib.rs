//! # xds-cache
//!
//! Per-node snapshot cache for proxy configuration.
//!
//! - [`ShardedCache`] - DashMap-based concurrent cache, one entry per node
//! - [`Snapshot`] - The six-category resource set for a node at one version
//! - [`snapshots_equal`] - Content comparison that ignores versions
//!
//! ## Key Design Decisions
//!
//! - Uses `DashMap` so nodes never contend with each other
//! - Snapshots are replaced atomically per node and shared behind `Arc`
//! - No `DashMap` guard escapes a method, so none is held across `.await`
//!
//! ## Example
//!
//! ```rust
//! use xds_cache::{Cache, ShardedCache, Snapshot};
//! use xds_core::NodeId;
//!
//! let cache = ShardedCache::new();
//! let node = NodeId::new("node-1").unwrap();
//!
//! cache.set_snapshot(&node, Snapshot::builder().version("v1").build());
//! assert_eq!(cache.get_snapshot(&node).unwrap().version(), "v1");
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod equality;
mod snapshot;
mod stats;

pub use cache::{Cache, ShardedCache};
pub use equality::snapshots_equal;
pub use snapshot::{Snapshot, SnapshotBuilder, SnapshotResources};
pub use stats::CacheStats;
