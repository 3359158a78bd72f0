//! Cache integration tests.

use std::sync::Arc;

use integration_tests::listener_json;
use xds_controlplane::prelude::*;
use xds_revision::{CachePublisher, ControllerMetrics, PublishOutcome};
use xds_types::Listener;

fn node(id: &str) -> NodeId {
    NodeId::new(id).unwrap()
}

fn listener_snapshot(version: &str, port: u32) -> Snapshot {
    let listener: Listener = serde_json::from_str(&listener_json("http", port)).unwrap();
    Snapshot::builder()
        .version(version)
        .resource(Arc::new(listener))
        .build()
}

#[test]
fn cache_basic_operations() {
    let cache = ShardedCache::new();
    let node = node("test-node");

    cache.set_snapshot(&node, listener_snapshot("v1", 80));

    let retrieved = cache.get_snapshot(&node).expect("snapshot should exist");
    assert_eq!(retrieved.version(), "v1");
    assert!(retrieved.resources(ResourceCategory::Listener).contains("http"));
}

#[test]
fn cache_multiple_nodes() {
    let cache = ShardedCache::new();

    let nodes = ["node-1", "node-2", "node-3"];
    for (i, id) in nodes.iter().enumerate() {
        cache.set_snapshot(&node(id), Snapshot::builder().version(format!("v{}", i + 1)).build());
    }

    assert_eq!(cache.snapshot_count(), 3);
    for (i, id) in nodes.iter().enumerate() {
        let snapshot = cache.get_snapshot(&node(id)).unwrap();
        assert_eq!(snapshot.version().as_str(), format!("v{}", i + 1));
    }
}

#[test]
fn cache_clear_snapshot() {
    let cache = ShardedCache::new();
    let node = node("test-node");

    cache.set_snapshot(&node, Snapshot::builder().version("v1").build());
    assert!(cache.has_snapshot(&node));

    cache.clear_snapshot(&node);
    assert!(!cache.has_snapshot(&node));
    assert_eq!(cache.stats().snapshots_cleared(), 1);
}

#[test]
fn cache_stats_tracking() {
    let cache = ShardedCache::new();
    let node = node("test-node");

    cache.get_snapshot(&node);
    assert_eq!(cache.stats().snapshot_misses(), 1);

    cache.set_snapshot(&node, Snapshot::builder().version("v1").build());
    cache.set_snapshot(&node, Snapshot::builder().version("v2").build());
    cache.get_snapshot(&node);

    assert_eq!(cache.stats().snapshots_set(), 2);
    assert_eq!(cache.stats().snapshots_replaced(), 1);
    assert_eq!(cache.stats().snapshot_hits(), 1);
    assert!((cache.stats().hit_rate() - 0.5).abs() < 0.01);
}

#[test]
fn publisher_skips_equal_content_across_versions() {
    let cache = Arc::new(ShardedCache::new());
    let publisher = CachePublisher::new(cache.clone(), ControllerMetrics::new());
    let node = node("edge");

    assert_eq!(
        publisher.publish_if_changed(&node, listener_snapshot("v1", 80)),
        PublishOutcome::Published
    );
    assert_eq!(
        publisher.publish_if_changed(&node, listener_snapshot("v2", 80)),
        PublishOutcome::Unchanged
    );
    assert_eq!(
        publisher.publish_if_changed(&node, listener_snapshot("v3", 8080)),
        PublishOutcome::Published
    );

    assert_eq!(cache.get_snapshot(&node).unwrap().version(), "v3");
    assert_eq!(cache.stats().snapshots_set(), 2);
}

#[test]
fn cache_concurrent_access() {
    use std::thread;

    let cache = Arc::new(ShardedCache::new());
    let mut handles = vec![];

    for i in 0..10 {
        let cache = Arc::clone(&cache);
        handles.push(thread::spawn(move || {
            let node = node(&format!("node-{i}"));
            for j in 0..100 {
                cache.set_snapshot(&node, Snapshot::builder().version(format!("v{j}")).build());
                cache.get_snapshot(&node);
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(cache.snapshot_count(), 10);
    assert_eq!(cache.get_snapshot(&node("node-3")).unwrap().version(), "v99");
}
