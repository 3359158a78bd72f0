//! # xds-controlplane
//!
//! Revision-controlled configuration publication for Envoy control planes.
//!
//! Declarative `NodeConfigCache` records are hashed into immutable revisions;
//! the newest untainted revision of each node is decoded into a typed snapshot
//! and published to a per-node cache that a discovery server can read.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use xds_controlplane::prelude::*;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let store = Arc::new(MemoryStore::new());
//! let plane = ControlPlane::new(Arc::clone(&store), ControllerConfig::default());
//! let running = plane.start();
//!
//! let resources = EnvoyResources {
//!     clusters: vec![EnvoyResource::new("backend", r#"{"name":"backend","type":"STATIC"}"#)],
//!     ..Default::default()
//! };
//! store
//!     .create(NodeConfigCache::new("default", "edge", "edge", resources))
//!     .await
//!     .unwrap();
//!
//! running.wait_settled(Duration::from_millis(100)).await;
//! let node = NodeId::new("edge").unwrap();
//! assert!(plane.cache().get_snapshot(&node).is_some());
//! running.shutdown(Duration::from_secs(1)).await;
//! # });
//! ```
//!
//! ## Architecture
//!
//! - `xds-core` - Errors, node ids, versions, resource categories
//! - `xds-types` - Typed proxy configuration objects
//! - `xds-cache` - Per-node snapshot cache and snapshot equality
//! - `xds-revision` - Object model, store, reconcilers and runtime
//!
//! This crate re-exports all of them and ships the `xds-controlplane` binary,
//! which runs the controllers against a YAML manifest.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod manifest;

pub use xds_cache as cache;
pub use xds_core as core;
pub use xds_revision as revision;
pub use xds_types as types;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use xds_core::{NodeId, ResourceCategory, ResourceVersion, XdsError, XdsResult};

    pub use xds_cache::{Cache, ShardedCache, Snapshot};

    pub use xds_revision::api::{
        CacheState, EnvoyResource, EnvoyResources, EnvoySecretResource, NodeConfigCache,
        NodeConfigRevision, Object, ObjectKey, Secret, Serialization,
    };
    pub use xds_revision::{
        ControlPlane, ControllerConfig, MemoryStore, ObjectStore, RunningControlPlane,
    };
}

/// Version information for this crate.
pub mod version {
    /// Crate version.
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");

    /// Minimum supported Rust version.
    pub const MSRV: &str = "1.75";

    /// Get version info as a string.
    pub fn version_string() -> String {
        format!("xds-controlplane {VERSION} (MSRV {MSRV})")
    }
}

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn prelude_imports_work() {
        let cache = ShardedCache::new();
        let node = NodeId::new("test-node").unwrap();

        cache.set_snapshot(&node, Snapshot::builder().version("v1").build());

        assert_eq!(cache.get_snapshot(&node).unwrap().version(), "v1");
    }

    #[test]
    fn version_info() {
        assert!(super::version::version_string().contains("xds-controlplane"));
    }
}
