//! Snapshot integration tests.

use std::sync::Arc;

use integration_tests::{listener_json, route_json};
use xds_controlplane::prelude::*;
use xds_core::BoxResource;
use xds_revision::loader::decode_resources;
use xds_types::{Cluster, Listener};

fn listener(name: &str, port: u32) -> BoxResource {
    let listener: Listener = serde_json::from_str(&listener_json(name, port)).unwrap();
    Arc::new(listener)
}

#[test]
fn snapshot_builder_basic() {
    let snapshot = Snapshot::builder().version("v1").build();

    assert_eq!(snapshot.version(), "v1");
    assert!(snapshot.is_empty());
    assert_eq!(snapshot.total_resources(), 0);
}

#[test]
fn snapshot_resources_land_in_their_category() {
    let cluster: Cluster = serde_json::from_str(r#"{"name":"backend","type":"STATIC"}"#).unwrap();
    let snapshot = Snapshot::builder()
        .version("v2")
        .resource(listener("http", 80))
        .resource(Arc::new(cluster))
        .build();

    assert_eq!(snapshot.total_resources(), 2);
    assert!(snapshot.resources(ResourceCategory::Listener).contains("http"));
    assert!(snapshot.resources(ResourceCategory::Cluster).contains("backend"));
    assert!(snapshot.resources(ResourceCategory::Route).is_empty());
}

#[test]
fn snapshot_categories_are_fixed() {
    let snapshot = Snapshot::builder().version("v1").build();
    let categories: Vec<_> = snapshot.categories().map(|(c, _)| c).collect();
    assert_eq!(categories, ResourceCategory::ALL.to_vec());
}

#[test]
fn snapshot_clone_shares_resources() {
    let snapshot = Snapshot::builder()
        .version("v1")
        .resource(listener("http", 80))
        .build();
    let created = snapshot.created_at();

    let cloned = snapshot.clone();
    assert_eq!(cloned.version(), snapshot.version());
    assert_eq!(cloned.created_at(), created);
    assert!(xds_cache::snapshots_equal(&cloned, &snapshot));
}

#[test]
fn equality_is_sensitive_to_single_changes() {
    let base = Snapshot::builder()
        .version("v1")
        .resource(listener("a", 80))
        .resource(listener("b", 81))
        .build();
    let same = Snapshot::builder()
        .version("other")
        .resource(listener("b", 81))
        .resource(listener("a", 80))
        .build();
    let changed = Snapshot::builder()
        .version("v1")
        .resource(listener("a", 80))
        .resource(listener("b", 82))
        .build();
    let mut smaller = base.clone();
    smaller.remove_resource(ResourceCategory::Listener, "b");

    assert!(xds_cache::snapshots_equal(&base, &same));
    assert!(xds_cache::snapshots_equal(&same, &base));
    assert!(!xds_cache::snapshots_equal(&base, &changed));
    assert!(!xds_cache::snapshots_equal(&base, &smaller));
    assert!(!xds_cache::snapshots_equal(&smaller, &base));
}

#[test]
fn decoded_snapshot_is_keyed_by_declared_names() {
    let resources = EnvoyResources {
        listeners: vec![EnvoyResource::new("public", listener_json("http", 80))],
        routes: vec![EnvoyResource::new("local", route_json("local", "backend"))],
        ..Default::default()
    };
    let snapshot = decode_resources(&"v1".into(), Serialization::Json, &resources).unwrap();

    assert!(snapshot.resources(ResourceCategory::Listener).contains("public"));
    assert!(!snapshot.resources(ResourceCategory::Listener).contains("http"));
    assert!(snapshot.resources(ResourceCategory::Route).contains("local"));
}

#[test]
fn node_id_hash_is_deterministic() {
    let a = NodeId::new("edge-1").unwrap();
    let b = NodeId::new("edge-1").unwrap();
    assert_eq!(a, b);
    assert_eq!(a.as_u64(), b.as_u64());
    assert_ne!(a.as_u64(), NodeId::new("edge-2").unwrap().as_u64());
}

#[test]
fn resource_version_from_content() {
    let a = ResourceVersion::from_content(b"listeners");
    let b = ResourceVersion::from_content(b"listeners");
    assert_eq!(a, b);
    assert_ne!(a, ResourceVersion::from_content(b"clusters"));
    assert_eq!(a.as_str().len(), 32);
}
