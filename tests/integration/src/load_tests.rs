//! Load tests for the cache and the controllers.
//!
//! - 1000+ nodes in the cache
//! - Concurrent readers and writers
//! - Hundreds of desired-state records converging through the runtime
//!
//! Run with: `cargo test --package integration-tests --test load_tests -- --nocapture`

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use integration_tests::{single_listener, NAMESPACE};
use tokio::sync::Barrier;
use xds_cache::{Cache, ShardedCache, Snapshot};
use xds_core::NodeId;
use xds_revision::api::{CacheState, NodeConfigCache};
use xds_revision::store::LabelSelector;
use xds_revision::{
    CachePublisher, ControlPlane, ControllerConfig, ControllerMetrics, MemoryStore, ObjectStore,
};
use xds_types::Listener;

fn nodes(count: usize) -> Vec<NodeId> {
    (0..count)
        .map(|i| NodeId::new(format!("envoy-sidecar-{i}")).unwrap())
        .collect()
}

fn listener_snapshot(version: &str, port: u32) -> Snapshot {
    let listener: Listener =
        serde_json::from_str(&integration_tests::listener_json("http", port)).unwrap();
    Snapshot::builder()
        .version(version)
        .resource(Arc::new(listener))
        .build()
}

#[tokio::test]
async fn test_1000_nodes() {
    let cache = ShardedCache::new();
    let nodes = nodes(1000);

    let start = Instant::now();
    for (i, node) in nodes.iter().enumerate() {
        cache.set_snapshot(node, Snapshot::builder().version(format!("v{i}")).build());
    }
    let set_duration = start.elapsed();
    println!(
        "Set {} snapshots in {:?} ({:.2} µs/op)",
        nodes.len(),
        set_duration,
        set_duration.as_micros() as f64 / nodes.len() as f64
    );

    for node in &nodes {
        assert!(cache.get_snapshot(node).is_some());
    }
    assert_eq!(cache.snapshot_count(), 1000);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_readers_writers() {
    let cache = Arc::new(ShardedCache::new());
    let nodes = Arc::new(nodes(100));
    let num_readers = 8;
    let num_writers = 4;
    let ops_per_task = 1000;

    let barrier = Arc::new(Barrier::new(num_readers + num_writers));
    let read_count = Arc::new(AtomicU64::new(0));
    let write_count = Arc::new(AtomicU64::new(0));
    let start = Instant::now();
    let mut handles = Vec::new();

    for _ in 0..num_readers {
        let cache = Arc::clone(&cache);
        let nodes = Arc::clone(&nodes);
        let barrier = Arc::clone(&barrier);
        let read_count = Arc::clone(&read_count);

        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            for i in 0..ops_per_task {
                let _ = cache.get_snapshot(&nodes[i % nodes.len()]);
                read_count.fetch_add(1, Ordering::Relaxed);
            }
        }));
    }

    for writer_id in 0..num_writers {
        let cache = Arc::clone(&cache);
        let nodes = Arc::clone(&nodes);
        let barrier = Arc::clone(&barrier);
        let write_count = Arc::clone(&write_count);

        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            for i in 0..ops_per_task {
                cache.set_snapshot(
                    &nodes[i % nodes.len()],
                    Snapshot::builder().version(format!("v{writer_id}-{i}")).build(),
                );
                write_count.fetch_add(1, Ordering::Relaxed);
            }
        }));
    }

    for handle in handles {
        handle.await.expect("Task panicked");
    }

    let total_ops = read_count.load(Ordering::Relaxed) + write_count.load(Ordering::Relaxed);
    println!(
        "{} ops in {:?} ({:.0} ops/sec)",
        total_ops,
        start.elapsed(),
        total_ops as f64 / start.elapsed().as_secs_f64()
    );
    assert_eq!(total_ops, ((num_readers + num_writers) * ops_per_task) as u64);
    assert_eq!(cache.snapshot_count(), 100);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_publishers_single_node() {
    let cache = Arc::new(ShardedCache::new());
    let metrics = ControllerMetrics::new();
    let publisher = CachePublisher::new(cache.clone(), metrics.clone());
    let node = NodeId::new("edge").unwrap();
    let mut handles = Vec::new();

    for task in 0..8u32 {
        let publisher = publisher.clone();
        let node = node.clone();
        handles.push(tokio::spawn(async move {
            for round in 0..100u32 {
                // Only two distinct contents are ever written.
                publisher.publish_if_changed(
                    &node,
                    listener_snapshot(&format!("t{task}-r{round}"), 80 + round % 2),
                );
            }
        }));
    }
    for handle in handles {
        handle.await.expect("Task panicked");
    }

    assert_eq!(
        metrics.snapshots_published() + metrics.snapshots_unchanged(),
        800
    );
    assert!(cache.get_snapshot(&node).is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_control_plane_200_nodes() {
    let store = Arc::new(MemoryStore::new());
    let plane = ControlPlane::new(Arc::clone(&store), ControllerConfig::default());
    let running = plane.start();
    let count = 200;

    let start = Instant::now();
    for i in 0..count {
        let name = format!("envoy-sidecar-{i}");
        store
            .create(NodeConfigCache::new(
                NAMESPACE,
                name.clone(),
                name,
                single_listener("http", 8000 + i),
            ))
            .await
            .unwrap();
    }
    running.wait_settled(Duration::from_millis(250)).await;
    println!("{count} nodes converged in {:?}", start.elapsed());

    let caches: Vec<NodeConfigCache> = store
        .list(Some(NAMESPACE), &LabelSelector::everything())
        .await
        .unwrap();
    assert_eq!(caches.len(), count as usize);
    for ncc in &caches {
        assert_eq!(
            ncc.status.cache_state,
            Some(CacheState::InSync),
            "{} not in sync",
            ncc.metadata.name
        );
        let node = NodeId::new(&ncc.spec.node_id).unwrap();
        let snapshot = plane.cache().get_snapshot(&node).unwrap();
        assert_eq!(snapshot.version(), &ncc.status.published_version);
    }
    assert_eq!(plane.cache().snapshot_count(), count as usize);
    assert_eq!(plane.metrics().snapshots_published(), count as u64);

    assert!(running.shutdown(Duration::from_secs(5)).await);
}
