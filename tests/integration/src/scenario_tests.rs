//! End-to-end reconcile scenarios.
//!
//! Each test drives both controllers against one in-memory store and checks
//! the records and the published cache after every step.

use std::time::Duration;

use integration_tests::{listener_json, route_json, single_listener, Harness, NAMESPACE};
use xds_cache::Cache;
use xds_core::{NodeId, ResourceCategory};
use xds_revision::api::{
    CacheState, Condition, EnvoyResource, EnvoySecretResource, Object, ObjectKey, ObjectMeta,
    Secret, CACHE_OUT_OF_SYNC, REVISION_TAINTED,
};
use xds_revision::revision::{compute_desired_version, select_publishable};
use xds_revision::{Action, ControlPlane, ControllerConfig, MemoryStore, ObjectStore};

#[tokio::test]
async fn scenario_a_single_listener_is_published_in_sync() {
    let h = Harness::new(ControllerConfig::default());
    let resources = single_listener("L1", 8080);
    let v1 = compute_desired_version(Default::default(), &resources);
    h.create("edge", "edge", resources).await;

    let results = h.step("edge", "edge").await;
    assert!(results.iter().all(|r| matches!(r, Ok(Action::Done))));

    let revision = h.revision("edge", v1.as_str()).await;
    assert!(revision.is_selected());
    assert!(revision.status.published);

    let snapshot = h.snapshot("edge").unwrap();
    assert_eq!(snapshot.version(), &v1);
    assert_eq!(snapshot.total_resources(), 1);
    assert_eq!(snapshot.resources(ResourceCategory::Listener).names(), vec!["L1"]);

    let ncc = h.get("edge").await;
    assert_eq!(ncc.status.desired_version, v1);
    assert_eq!(ncc.status.published_version, v1);
    assert_eq!(ncc.status.cache_state, Some(CacheState::InSync));
}

#[tokio::test]
async fn scenario_b_new_spec_is_published_and_old_revision_collected() {
    let h = Harness::new(ControllerConfig::default().with_revision_retention(1));
    h.create("edge", "edge", single_listener("L1", 8080)).await;
    h.step("edge", "edge").await;
    let v1 = h.get("edge").await.status.published_version;

    h.edit("edge", |ncc| {
        ncc.spec
            .resources
            .routes
            .push(EnvoyResource::new("local", route_json("local", "backend")));
    })
    .await;
    h.step("edge", "edge").await;

    let ncc = h.get("edge").await;
    let v2 = ncc.status.desired_version.clone();
    assert_ne!(v1, v2);
    assert_eq!(ncc.status.published_version, v2);
    assert_eq!(ncc.status.cache_state, Some(CacheState::InSync));
    let history: Vec<_> = ncc.status.config_revisions.iter().map(|r| r.version.clone()).collect();
    assert_eq!(history, vec![v1.clone(), v2.clone()]);

    let snapshot = h.snapshot("edge").unwrap();
    assert_eq!(snapshot.version(), &v2);
    assert!(snapshot.resources(ResourceCategory::Route).contains("local"));

    // V1 leaves the history once it is no longer the published version.
    h.reconcile_cache("edge").await.unwrap();
    let ncc = h.get("edge").await;
    assert_eq!(ncc.status.config_revisions.len(), 1);
    let remaining: Vec<_> = h.revisions("edge").await.into_iter().map(|r| r.spec.version).collect();
    assert_eq!(remaining, vec![v2]);
}

#[tokio::test]
async fn scenario_c_tainted_revision_rolls_back() {
    let h = Harness::new(ControllerConfig::default());
    h.create("edge", "edge", single_listener("L1", 8080)).await;
    h.step("edge", "edge").await;
    let v1 = h.get("edge").await.status.published_version;

    h.edit("edge", |ncc| ncc.spec.resources = single_listener("L1", 9090)).await;
    h.step("edge", "edge").await;
    let v2 = h.get("edge").await.status.published_version;
    assert_ne!(v1, v2);

    // An operator flags V2.
    let mut flagged = h.revision("edge", v2.as_str()).await;
    flagged.status.conditions.set(Condition::truthy(
        REVISION_TAINTED,
        "ManualTaint",
        "error rate above threshold",
    ));
    h.store.update_status(flagged).await.unwrap();

    assert_eq!(
        select_publishable(&h.get("edge").await.status.config_revisions, &h.revisions("edge").await),
        Some(v1.clone())
    );

    h.step("edge", "edge").await;

    let ncc = h.get("edge").await;
    assert_eq!(ncc.status.desired_version, v2);
    assert_eq!(ncc.status.published_version, v1);
    assert_eq!(ncc.status.cache_state, Some(CacheState::Rollback));
    assert!(h.revision("edge", v1.as_str()).await.is_selected());
    assert!(!h.revision("edge", v2.as_str()).await.is_selected());
    assert_eq!(h.snapshot("edge").unwrap().version(), &v1);
}

#[tokio::test]
async fn scenario_d_decode_failure_taints_and_retries_later() {
    let h = Harness::new(ControllerConfig::default());
    let mut resources = single_listener("L1", 8080);
    resources
        .clusters
        .push(EnvoyResource::new("backend", "{\"name\": \"backend\", "));
    h.create("edge", "edge", resources).await;

    let results = h.step("edge", "edge").await;
    assert_eq!(results.len(), 1);
    assert_eq!(
        results[0].as_ref().unwrap(),
        &Action::RequeueAfter(Duration::from_secs(30))
    );

    let ncc = h.get("edge").await;
    let revision = h.revision("edge", ncc.status.desired_version.as_str()).await;
    assert!(revision.status.tainted);
    assert!(!revision.status.published);
    let condition = revision.status.conditions.get(REVISION_TAINTED).unwrap();
    assert_eq!(condition.reason, "ResourceDecodeError");
    assert!(condition.message.contains("Clusters"));
    assert!(h.snapshot("edge").is_none());

    // The desired-state loop now has nothing publishable.
    h.reconcile_cache("edge").await.unwrap();
    let ncc = h.get("edge").await;
    assert_eq!(
        ncc.status.conditions.get(CACHE_OUT_OF_SYNC).unwrap().reason,
        "DesiredRevisionTainted"
    );

    // Fixing the spec mints a new revision that publishes cleanly.
    h.edit("edge", |ncc| ncc.spec.resources = single_listener("L1", 8080)).await;
    h.step("edge", "edge").await;
    let ncc = h.get("edge").await;
    assert!(ncc.status.conditions.get(CACHE_OUT_OF_SYNC).is_none());
    assert_eq!(ncc.status.cache_state, Some(CacheState::InSync));
    assert!(h.snapshot("edge").is_some());
}

#[tokio::test]
async fn reordering_resources_keeps_the_revision() {
    let h = Harness::new(ControllerConfig::default());
    let mut resources = single_listener("a", 80);
    resources
        .listeners
        .push(EnvoyResource::new("b", listener_json("b", 81)));
    h.create("edge", "edge", resources).await;
    h.step("edge", "edge").await;
    let before = h.get("edge").await.status;

    h.edit("edge", |ncc| ncc.spec.resources.listeners.reverse()).await;
    h.step("edge", "edge").await;

    let after = h.get("edge").await.status;
    assert_eq!(before.desired_version, after.desired_version);
    assert_eq!(before.config_revisions, after.config_revisions);
    assert_eq!(h.revisions("edge").await.len(), 1);
    assert_eq!(h.plane.metrics().snapshots_published(), 1);
}

#[tokio::test]
async fn tls_secret_is_published_from_credential_object() {
    let h = Harness::new(ControllerConfig::default());
    h.store
        .create(Secret::tls(NAMESPACE, "edge-tls", "KEY", "CERT"))
        .await
        .unwrap();
    let mut resources = single_listener("L1", 443);
    resources
        .secrets
        .push(EnvoySecretResource::new("edge-cert", "", "edge-tls"));
    h.create("edge", "edge", resources).await;

    h.step("edge", "edge").await;

    let snapshot = h.snapshot("edge").unwrap();
    let secret = snapshot
        .resources(ResourceCategory::Secret)
        .get("edge-cert")
        .unwrap();
    let secret = xds_core::downcast::<xds_types::Secret>(secret).unwrap();
    assert_eq!(secret, &xds_types::Secret::tls("edge-cert", "KEY", "CERT"));
}

#[tokio::test]
async fn fixing_the_credential_recovers_in_sync() {
    let h = Harness::new(ControllerConfig::default());
    h.store
        .create(Secret {
            metadata: ObjectMeta::new(NAMESPACE, "edge-tls"),
            secret_type: "Opaque".to_string(),
            data: Default::default(),
        })
        .await
        .unwrap();
    let mut resources = single_listener("L1", 443);
    resources
        .secrets
        .push(EnvoySecretResource::new("edge-cert", "", "edge-tls"));
    h.create("edge", "edge", resources).await;

    let results = h.step("edge", "edge").await;
    assert_eq!(
        results[0].as_ref().unwrap(),
        &Action::RequeueAfter(Duration::from_secs(30))
    );
    h.reconcile_cache("edge").await.unwrap();
    assert!(h.snapshot("edge").is_none());
    assert!(h.get("edge").await.status.conditions.get(CACHE_OUT_OF_SYNC).is_some());

    let stored: Secret = h.store.get(&ObjectKey::new(NAMESPACE, "edge-tls")).await.unwrap();
    let mut fixed = Secret::tls(NAMESPACE, "edge-tls", "KEY", "CERT");
    fixed.metadata = stored.metadata;
    h.store.update(fixed).await.unwrap();

    let results = h.step("edge", "edge").await;
    assert!(results.iter().all(|r| matches!(r, Ok(Action::Done))));
    h.reconcile_cache("edge").await.unwrap();

    let ncc = h.get("edge").await;
    let revision = h.revision("edge", ncc.status.desired_version.as_str()).await;
    assert!(!revision.is_tainted());
    assert!(revision.status.published);
    assert_eq!(ncc.status.published_version, ncc.status.desired_version);
    assert_eq!(ncc.status.cache_state, Some(CacheState::InSync));
    assert!(ncc.status.conditions.get(CACHE_OUT_OF_SYNC).is_none());
    assert_eq!(
        h.snapshot("edge").unwrap().version(),
        &ncc.status.desired_version
    );
}

#[tokio::test]
async fn runtime_converges_and_cleans_up_on_delete() {
    let store = std::sync::Arc::new(MemoryStore::new());
    let plane = ControlPlane::new(store.clone(), ControllerConfig::default());
    let running = plane.start();
    let quiet = Duration::from_millis(100);
    let node = NodeId::new("edge").unwrap();

    store
        .create(xds_revision::api::NodeConfigCache::new(
            NAMESPACE,
            "edge",
            "edge",
            single_listener("L1", 8080),
        ))
        .await
        .unwrap();
    running.wait_settled(quiet).await;

    let ncc: xds_revision::api::NodeConfigCache =
        store.get(&xds_revision::api::ObjectKey::new(NAMESPACE, "edge")).await.unwrap();
    assert_eq!(ncc.status.cache_state, Some(CacheState::InSync));
    let snapshot = plane.cache().get_snapshot(&node).unwrap();
    assert_eq!(snapshot.version(), &ncc.status.published_version);

    store
        .delete::<xds_revision::api::NodeConfigCache>(&ncc.key())
        .await
        .unwrap();
    running.wait_settled(quiet).await;

    assert!(plane.cache().get_snapshot(&node).is_none());
    assert!(store.is_empty());
    assert!(running.shutdown(Duration::from_secs(1)).await);
}
