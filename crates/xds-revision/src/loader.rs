//! Snapshot assembly.
//!
//! Every declared resource is decoded with the specification's serialization
//! into its category's typed object. The first failure aborts the whole load:
//! a snapshot is either complete or not produced at all.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::debug;
use xds_cache::Snapshot;
use xds_core::{BoxResource, Resource, ResourceCategory, ResourceVersion, XdsError, XdsResult};
use xds_types::{Cluster, ClusterLoadAssignment, Listener, Runtime, RouteConfiguration};

use crate::api::{
    EnvoyResource, EnvoyResources, EnvoySecretResource, ObjectKey, Secret, Serialization,
    TLS_CERTIFICATE, TLS_PRIVATE_KEY, TLS_SECRET_TYPE,
};
use crate::decoder::{decode_as, ResourceDecoder};
use crate::store::ObjectStore;

/// Builds snapshots from stored specifications.
#[derive(Debug)]
pub struct SnapshotLoader<S> {
    store: Arc<S>,
}

impl<S> Clone for SnapshotLoader<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: ObjectStore> SnapshotLoader<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Build the snapshot for one specification.
    ///
    /// `namespace` is used for secret references that do not name one.
    pub async fn load_resources(
        &self,
        namespace: &str,
        version: &ResourceVersion,
        serialization: Serialization,
        resources: &EnvoyResources,
    ) -> XdsResult<Snapshot> {
        let mut snapshot = decode_resources(version, serialization, resources)?;

        for (index, entry) in resources.secrets.iter().enumerate() {
            let secret = self.tls_secret(namespace, index, entry).await?;
            snapshot.set_resource(entry.name.clone(), Arc::new(secret));
        }

        debug!(
            version = %version,
            resources = snapshot.total_resources(),
            "loaded snapshot"
        );
        Ok(snapshot)
    }

    async fn tls_secret(
        &self,
        namespace: &str,
        index: usize,
        entry: &EnvoySecretResource,
    ) -> XdsResult<xds_types::Secret> {
        let reference = &entry.reference;
        let key = ObjectKey::new(
            if reference.namespace.is_empty() {
                namespace
            } else {
                reference.namespace.as_str()
            },
            reference.name.clone(),
        );
        let secret: Secret = self.store.get(&key).await?;

        if secret.secret_type != TLS_SECRET_TYPE {
            return Err(secret_error(
                index,
                format!(
                    "only '{TLS_SECRET_TYPE}' type secrets allowed, {key} has type '{}'",
                    secret.secret_type
                ),
            ));
        }

        let private_key = secret_field(&secret, index, TLS_PRIVATE_KEY)?;
        let certificate = secret_field(&secret, index, TLS_CERTIFICATE)?;
        Ok(xds_types::Secret::tls(
            entry.name.clone(),
            private_key,
            certificate,
        ))
    }
}

/// Decode every non-secret resource into a fresh snapshot.
///
/// Categories are processed endpoints, clusters, routes, listeners, runtimes.
pub fn decode_resources(
    version: &ResourceVersion,
    serialization: Serialization,
    resources: &EnvoyResources,
) -> XdsResult<Snapshot> {
    let decoder = serialization.decoder();
    let mut snapshot = Snapshot::new(version.clone());

    decode_category::<ClusterLoadAssignment>(
        &mut snapshot,
        decoder,
        ResourceCategory::Endpoint,
        &resources.endpoints,
    )?;
    decode_category::<Cluster>(
        &mut snapshot,
        decoder,
        ResourceCategory::Cluster,
        &resources.clusters,
    )?;
    decode_category::<RouteConfiguration>(
        &mut snapshot,
        decoder,
        ResourceCategory::Route,
        &resources.routes,
    )?;
    decode_category::<Listener>(
        &mut snapshot,
        decoder,
        ResourceCategory::Listener,
        &resources.listeners,
    )?;
    decode_category::<Runtime>(
        &mut snapshot,
        decoder,
        ResourceCategory::Runtime,
        &resources.runtimes,
    )?;

    Ok(snapshot)
}

fn decode_category<T>(
    snapshot: &mut Snapshot,
    decoder: &dyn ResourceDecoder,
    category: ResourceCategory,
    entries: &[EnvoyResource],
) -> XdsResult<()>
where
    T: Resource + DeserializeOwned + 'static,
{
    for (index, entry) in entries.iter().enumerate() {
        let typed: T = decode_as(decoder, &entry.value).map_err(|e| XdsError::Decode {
            category,
            index,
            field_path: format!("spec.resources.{}[{index}].value", category.field_name()),
            value: entry.value.clone(),
            reason: e.to_string(),
        })?;
        let resource: BoxResource = Arc::new(typed);
        snapshot.set_resource(entry.name.clone(), resource);
    }
    Ok(())
}

fn secret_error(index: usize, reason: String) -> XdsError {
    XdsError::Validation {
        category: ResourceCategory::Secret,
        index,
        field_path: format!("spec.resources.secrets[{index}].ref"),
        reason,
    }
}

fn secret_field(secret: &Secret, index: usize, key: &str) -> XdsResult<String> {
    let bytes = secret
        .value(key)
        .ok_or_else(|| secret_error(index, format!("secret is missing key '{key}'")))?;
    String::from_utf8(bytes.to_vec())
        .map_err(|_| secret_error(index, format!("secret key '{key}' is not valid utf-8")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use xds_core::downcast;

    fn listeners(values: &[(&str, &str)]) -> EnvoyResources {
        EnvoyResources {
            listeners: values
                .iter()
                .map(|(name, value)| EnvoyResource::new(*name, *value))
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn decodes_into_category_collections() {
        let resources = EnvoyResources {
            clusters: vec![EnvoyResource::new("c1", r#"{"name":"c1","type":"STATIC"}"#)],
            endpoints: vec![EnvoyResource::new("c1", r#"{"cluster_name":"c1"}"#)],
            listeners: vec![EnvoyResource::new("l1", r#"{"name":"l1"}"#)],
            ..Default::default()
        };
        let snapshot = decode_resources(&"v1".into(), Serialization::Json, &resources).unwrap();

        assert_eq!(snapshot.version(), "v1");
        assert_eq!(snapshot.total_resources(), 3);
        let endpoint = snapshot.resources(ResourceCategory::Endpoint).get("c1").unwrap();
        assert_eq!(
            downcast::<ClusterLoadAssignment>(endpoint).unwrap().cluster_name,
            "c1"
        );
    }

    #[test]
    fn first_failure_names_category_index_and_path() {
        let resources = listeners(&[("ok", r#"{"name":"ok"}"#), ("bad", "{not json")]);
        let err = decode_resources(&"v1".into(), Serialization::Json, &resources).unwrap_err();

        match err {
            XdsError::Decode {
                category,
                index,
                field_path,
                value,
                ..
            } => {
                assert_eq!(category, ResourceCategory::Listener);
                assert_eq!(index, 1);
                assert_eq!(field_path, "spec.resources.listeners[1].value");
                assert_eq!(value, "{not json");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn serialization_applies_to_every_resource() {
        let resources = listeners(&[("l1", "name: l1")]);
        assert!(decode_resources(&"v1".into(), Serialization::Yaml, &resources).is_ok());
        assert!(decode_resources(&"v1".into(), Serialization::Json, &resources).is_err());
    }

    #[tokio::test]
    async fn tls_secret_is_lifted_from_credential_object() {
        let store = Arc::new(MemoryStore::new());
        store
            .create(Secret::tls("default", "gw-tls", "KEY", "CERT"))
            .await
            .unwrap();
        let loader = SnapshotLoader::new(Arc::clone(&store));

        let resources = EnvoyResources {
            secrets: vec![EnvoySecretResource::new("gateway-cert", "", "gw-tls")],
            ..Default::default()
        };
        let snapshot = loader
            .load_resources("default", &"v1".into(), Serialization::Json, &resources)
            .await
            .unwrap();

        let secret = snapshot
            .resources(ResourceCategory::Secret)
            .get("gateway-cert")
            .unwrap();
        let secret = downcast::<xds_types::Secret>(secret).unwrap();
        assert_eq!(secret, &xds_types::Secret::tls("gateway-cert", "KEY", "CERT"));
    }

    #[tokio::test]
    async fn non_tls_secret_is_a_validation_error() {
        let store = Arc::new(MemoryStore::new());
        let mut opaque = Secret::tls("default", "opaque", "k", "c");
        opaque.secret_type = "Opaque".to_string();
        store.create(opaque).await.unwrap();
        let loader = SnapshotLoader::new(Arc::clone(&store));

        let resources = EnvoyResources {
            secrets: vec![
                EnvoySecretResource::new("first", "", "opaque"),
                EnvoySecretResource::new("second", "", "opaque"),
            ],
            ..Default::default()
        };
        let err = loader
            .load_resources("default", &"v1".into(), Serialization::Json, &resources)
            .await
            .unwrap_err();

        assert!(err.is_specification());
        let message = err.to_string();
        assert!(message.contains("Secrets"), "{message}");
        assert!(message.contains("index 0"), "{message}");
        assert!(message.contains("secrets[0].ref"), "{message}");
    }

    #[tokio::test]
    async fn missing_secret_is_transient() {
        let loader = SnapshotLoader::new(Arc::new(MemoryStore::new()));
        let resources = EnvoyResources {
            secrets: vec![EnvoySecretResource::new("cert", "certs", "absent")],
            ..Default::default()
        };
        let err = loader
            .load_resources("default", &"v1".into(), Serialization::Json, &resources)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.class(), xds_core::ErrorClass::Transient);
    }
}
