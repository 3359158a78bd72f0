//! Snapshot equality.
//!
//! Two snapshots are equal when every category holds the same set of names and
//! each named resource encodes to the same bytes. Versions are ignored: a
//! revision that reproduces what is already served must not trigger a push.

use xds_core::BoxResource;

use crate::snapshot::{Snapshot, SnapshotResources};

/// Compare two snapshots by content.
///
/// A resource that fails to encode never compares equal, so a broken entry
/// always results in a push rather than being silently skipped.
///
/// # Example
///
/// ```rust
/// use xds_cache::{snapshots_equal, Snapshot};
///
/// let a = Snapshot::new("v1");
/// let b = Snapshot::new("v2");
/// assert!(snapshots_equal(&a, &b));
/// ```
#[must_use]
pub fn snapshots_equal(a: &Snapshot, b: &Snapshot) -> bool {
    a.categories()
        .zip(b.categories())
        .all(|((_, left), (_, right))| collections_equal(left, right))
}

fn collections_equal(left: &SnapshotResources, right: &SnapshotResources) -> bool {
    if left.len() != right.len() {
        return false;
    }
    left.iter().all(|(name, resource)| match right.get(name) {
        Some(other) => encoded_equal(resource, other),
        None => false,
    })
}

fn encoded_equal(left: &BoxResource, right: &BoxResource) -> bool {
    match (left.encode(), right.encode()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
