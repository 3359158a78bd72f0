//! # xds-revision
//!
//! Revision-controlled publication of proxy configuration.
//!
//! Two cooperating controllers keep a per-node snapshot cache in line with
//! declarative records held in an [`ObjectStore`]:
//!
//! - [`CacheReconciler`] - hashes each `NodeConfigCache` into an immutable
//!   revision, keeps a bounded history and selects the newest untainted
//!   revision for publication, rolling back when the newest one is tainted
//! - [`RevisionReconciler`] - decodes the selected revision into a typed
//!   snapshot and pushes it to the cache only when its content changed
//!
//! [`ControlPlane`] wires both onto one store and one cache.
//!
//! ## Example
//!
//! ```rust
//! use xds_revision::api::{EnvoyResource, EnvoyResources, Serialization};
//! use xds_revision::revision::compute_desired_version;
//!
//! let resources = EnvoyResources {
//!     clusters: vec![EnvoyResource::new("backend", "name: backend\ntype: STATIC")],
//!     ..Default::default()
//! };
//! let version = compute_desired_version(Serialization::Yaml, &resources);
//! assert_eq!(version.as_str().len(), 32);
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(unsafe_code)]

pub mod api;
pub mod config;
pub mod controlplane;
pub mod decoder;
pub mod loader;
pub mod metrics;
pub mod publisher;
pub mod reconcile;
pub mod revision;
pub mod runtime;
pub mod shutdown;
pub mod store;

pub use config::ControllerConfig;
pub use controlplane::{ControlPlane, RunningControlPlane};
pub use loader::SnapshotLoader;
pub use metrics::ControllerMetrics;
pub use publisher::{CachePublisher, PublishOutcome};
pub use reconcile::{Action, CacheReconciler, Reconciler, RevisionReconciler};
pub use revision::RevisionManager;
pub use runtime::{Controller, WorkTracker};
pub use shutdown::ShutdownController;
pub use store::{MemoryStore, ObjectStore};
