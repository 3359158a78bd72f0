//! Declarative object model.
//!
//! Two record kinds drive the controllers:
//!
//! - [`NodeConfigCache`] - user-authored desired state for one node
//! - [`NodeConfigRevision`] - immutable copy of a specification at one version
//!
//! [`Secret`] is read by the snapshot loader to build TLS resources.

mod cache;
mod conditions;
mod meta;
mod resources;
mod revision;
mod secret;

pub use cache::{CacheState, ConfigRevisionRef, NodeConfigCache, NodeConfigCacheSpec, NodeConfigCacheStatus};
pub use conditions::{
    Condition, ConditionStatus, Conditions, CACHE_OUT_OF_SYNC, RESOURCES_OUT_OF_SYNC,
    REVISION_PUBLISHED, REVISION_TAINTED,
};
pub use meta::{Object, ObjectKey, ObjectMeta, OwnerReference};
pub use resources::{EnvoyResource, EnvoyResources, EnvoySecretResource, SecretRef, Serialization};
pub use revision::{
    NodeConfigRevision, NodeConfigRevisionSpec, NodeConfigRevisionStatus, LOAD_FAILURE_REASONS,
};
pub use secret::{ByteString, Secret, TLS_CERTIFICATE, TLS_PRIVATE_KEY, TLS_SECRET_TYPE};

/// Finalizer guarding cache cleanup of desired-state records.
pub const NODE_CONFIG_CACHE_FINALIZER: &str = "finalizer.caches.xds.io";
/// Label carrying the node id on both record kinds.
pub const NODE_ID_LABEL: &str = "caches.xds.io/node-id";
/// Label carrying the version on revision records.
pub const VERSION_LABEL: &str = "caches.xds.io/version";
