//! Snapshot: the assembled resource set for one node at one version.
//!
//! A snapshot always carries exactly six collections, one per
//! [`ResourceCategory`], indexed by the category rather than looked up by type
//! URL. Once handed to the cache a snapshot is shared behind an `Arc` and never
//! mutated again.

use std::collections::HashMap;
use std::time::Instant;

use xds_core::{BoxResource, ResourceCategory, ResourceVersion};

/// Resources of one category, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct SnapshotResources {
    resources: HashMap<String, BoxResource>,
}

impl SnapshotResources {
    /// Create a new empty resource collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of resources.
    #[inline]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Check if there are no resources.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Get a resource by name.
    #[inline]
    pub fn get(&self, name: &str) -> Option<&BoxResource> {
        self.resources.get(name)
    }

    /// Check whether a resource with this name exists.
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.resources.contains_key(name)
    }

    /// Iterate over all resources.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&String, &BoxResource)> {
        self.resources.iter()
    }

    /// Get all resource names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.resources.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn insert(&mut self, name: String, resource: BoxResource) -> Option<BoxResource> {
        self.resources.insert(name, resource)
    }

    fn remove(&mut self, name: &str) -> Option<BoxResource> {
        self.resources.remove(name)
    }
}

/// A snapshot of proxy resources for a node.
///
/// # Example
///
/// ```rust
/// use xds_cache::Snapshot;
/// use xds_core::ResourceCategory;
///
/// let snapshot = Snapshot::new("v1");
/// assert_eq!(snapshot.version(), "v1");
/// assert!(snapshot.resources(ResourceCategory::Listener).is_empty());
/// assert!(snapshot.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct Snapshot {
    version: ResourceVersion,
    resources: [SnapshotResources; 6],
    created_at: Instant,
}

impl Snapshot {
    /// Create a snapshot with six empty collections tagged with `version`.
    pub fn new(version: impl Into<ResourceVersion>) -> Self {
        Self {
            version: version.into(),
            resources: Default::default(),
            created_at: Instant::now(),
        }
    }

    /// Create a new snapshot builder.
    pub fn builder() -> SnapshotBuilder {
        SnapshotBuilder::new()
    }

    /// Get the version of this snapshot.
    #[inline]
    pub fn version(&self) -> &ResourceVersion {
        &self.version
    }

    /// Get the creation timestamp.
    #[inline]
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Get the collection for a category.
    #[inline]
    pub fn resources(&self, category: ResourceCategory) -> &SnapshotResources {
        &self.resources[category.index()]
    }

    /// Insert a resource under `name` in the collection of its own category.
    ///
    /// Returns the resource previously stored under that name, if any.
    pub fn set_resource(
        &mut self,
        name: impl Into<String>,
        resource: BoxResource,
    ) -> Option<BoxResource> {
        let category = resource.category();
        self.resources[category.index()].insert(name.into(), resource)
    }

    /// Remove a resource by category and name.
    pub fn remove_resource(&mut self, category: ResourceCategory, name: &str) -> Option<BoxResource> {
        self.resources[category.index()].remove(name)
    }

    /// Iterate over the six collections in category order.
    pub fn categories(&self) -> impl Iterator<Item = (ResourceCategory, &SnapshotResources)> {
        ResourceCategory::ALL
            .into_iter()
            .map(move |category| (category, self.resources(category)))
    }

    /// Get the total number of resources across all categories.
    pub fn total_resources(&self) -> usize {
        self.resources.iter().map(SnapshotResources::len).sum()
    }

    /// Check if this snapshot holds no resources at all.
    pub fn is_empty(&self) -> bool {
        self.resources.iter().all(SnapshotResources::is_empty)
    }
}

/// Builder for creating snapshots.
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    version: ResourceVersion,
    resources: Vec<(String, BoxResource)>,
}

impl SnapshotBuilder {
    /// Create a new snapshot builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the version for this snapshot.
    pub fn version(mut self, version: impl Into<ResourceVersion>) -> Self {
        self.version = version.into();
        self
    }

    /// Add a resource keyed by its own name.
    pub fn resource(mut self, resource: BoxResource) -> Self {
        self.resources.push((resource.name().to_string(), resource));
        self
    }

    /// Add a resource under an explicit name.
    pub fn named(mut self, name: impl Into<String>, resource: BoxResource) -> Self {
        self.resources.push((name.into(), resource));
        self
    }

    /// Add several resources keyed by their own names.
    pub fn resources(mut self, resources: impl IntoIterator<Item = BoxResource>) -> Self {
        for resource in resources {
            self = self.resource(resource);
        }
        self
    }

    /// Build the snapshot.
    pub fn build(self) -> Snapshot {
        let mut snapshot = Snapshot::new(self.version);
        for (name, resource) in self.resources {
            snapshot.set_resource(name, resource);
        }
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use xds_types::{Cluster, Listener};

    use super::*;

    fn listener(name: &str) -> BoxResource {
        Arc::new(Listener {
            name: name.to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn new_snapshot_has_six_empty_collections() {
        let snapshot = Snapshot::new("v1");
        assert_eq!(snapshot.version(), "v1");
        assert_eq!(snapshot.categories().count(), 6);
        assert!(snapshot.is_empty());
    }

    #[test]
    fn set_resource_dispatches_on_category() {
        let mut snapshot = Snapshot::new("v1");
        snapshot.set_resource("l1", listener("l1"));
        snapshot.set_resource(
            "c1",
            Arc::new(Cluster {
                name: "c1".to_string(),
                ..Default::default()
            }),
        );

        assert!(snapshot.resources(ResourceCategory::Listener).contains("l1"));
        assert!(snapshot.resources(ResourceCategory::Cluster).contains("c1"));
        assert!(snapshot.resources(ResourceCategory::Route).is_empty());
        assert_eq!(snapshot.total_resources(), 2);
    }

    #[test]
    fn set_resource_replaces_same_name() {
        let mut snapshot = Snapshot::new("v1");
        assert!(snapshot.set_resource("l1", listener("l1")).is_none());
        assert!(snapshot.set_resource("l1", listener("l1")).is_some());
        assert_eq!(snapshot.total_resources(), 1);
    }

    #[test]
    fn builder_keys_by_declared_name() {
        let snapshot = Snapshot::builder()
            .version("v2")
            .named("front", listener("inner-name"))
            .resource(listener("l2"))
            .build();

        assert_eq!(snapshot.version(), "v2");
        assert_eq!(
            snapshot.resources(ResourceCategory::Listener).names(),
            vec!["front", "l2"]
        );
    }

    #[test]
    fn remove_resource() {
        let mut snapshot = Snapshot::builder().resource(listener("l1")).build();
        assert!(snapshot
            .remove_resource(ResourceCategory::Listener, "l1")
            .is_some());
        assert!(snapshot.is_empty());
    }
}
