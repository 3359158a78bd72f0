//! Object store contract and the in-memory implementation.
//!
//! The controllers only need a small slice of a declarative store: typed
//! get/list/create/update, a separate status write, deletion that honours
//! finalizers and owner references, and a stream of change events.
//!
//! [`MemoryStore`] keeps objects as JSON values in a `DashMap` keyed by
//! `(kind, namespace/name)`. No map guard is held across an `.await`; every
//! method body is synchronous.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, trace};
use xds_core::{XdsError, XdsResult};

use crate::api::{Object, ObjectKey, ObjectMeta, OwnerReference};

const DEFAULT_EVENT_BUFFER: usize = 1024;

/// What happened to an object.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

/// Change notification emitted by the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreEvent {
    /// Kind of the changed object.
    pub kind: &'static str,
    pub key: ObjectKey,
    pub change: ChangeKind,
    /// Owner references of the object at the time of the change.
    pub owners: Vec<OwnerReference>,
}

/// Equality-based label selector.
///
/// # Example
///
/// ```rust
/// use std::collections::BTreeMap;
/// use xds_revision::store::LabelSelector;
///
/// let selector = LabelSelector::everything().with("app", "gateway");
/// let mut labels = BTreeMap::new();
/// labels.insert("app".to_string(), "gateway".to_string());
/// assert!(selector.matches(&labels));
/// assert!(!selector.matches(&BTreeMap::new()));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LabelSelector {
    match_labels: BTreeMap<String, String>,
}

impl LabelSelector {
    /// Selector matching every object.
    pub fn everything() -> Self {
        Self::default()
    }

    /// Require a label value.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.match_labels.insert(key.into(), value.into());
        self
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.match_labels
            .iter()
            .all(|(k, v)| labels.get(k).is_some_and(|actual| actual == v))
    }
}

/// Minimal declarative object store.
///
/// `update` writes metadata and spec and keeps the stored status;
/// `update_status` writes only the status. Both fail with
/// [`XdsError::Conflict`] when the object carries a non-zero resource version
/// that differs from the stored one.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Fetch an object. Missing objects yield [`XdsError::NotFound`].
    async fn get<T: Object>(&self, key: &ObjectKey) -> XdsResult<T>;

    /// List objects of a kind, optionally restricted to a namespace.
    async fn list<T: Object>(
        &self,
        namespace: Option<&str>,
        selector: &LabelSelector,
    ) -> XdsResult<Vec<T>>;

    async fn create<T: Object>(&self, object: T) -> XdsResult<T>;

    async fn update<T: Object>(&self, object: T) -> XdsResult<T>;

    async fn update_status<T: Object>(&self, object: T) -> XdsResult<T>;

    /// Request deletion. With finalizers present only the deletion timestamp
    /// is set; the object disappears once the last finalizer is removed.
    async fn delete<T: Object>(&self, key: &ObjectKey) -> XdsResult<()>;

    /// Subscribe to change events.
    fn subscribe(&self) -> broadcast::Receiver<StoreEvent>;
}

type StoreKey = (&'static str, ObjectKey);

/// In-process [`ObjectStore`].
#[derive(Debug)]
pub struct MemoryStore {
    objects: DashMap<StoreKey, Value>,
    next_uid: AtomicU64,
    events: broadcast::Sender<StoreEvent>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_event_buffer(DEFAULT_EVENT_BUFFER)
    }

    /// Create a store whose event channel holds `capacity` undelivered events
    /// per subscriber before it lags.
    pub fn with_event_buffer(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            objects: DashMap::new(),
            next_uid: AtomicU64::new(0),
            events,
        }
    }

    /// Number of stored objects across all kinds.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    fn emit(&self, kind: &'static str, key: ObjectKey, change: ChangeKind, owners: Vec<OwnerReference>) {
        trace!(kind, key = %key, ?change, "store event");
        // No subscriber is not an error.
        let _ = self.events.send(StoreEvent {
            kind,
            key,
            change,
            owners,
        });
    }

    fn delete_entry(&self, kind: &'static str, key: &ObjectKey) -> XdsResult<()> {
        let store_key = (kind, key.clone());
        let deferred = {
            let Some(mut entry) = self.objects.get_mut(&store_key) else {
                return Err(XdsError::not_found(kind, key.to_string()));
            };
            let mut meta = meta_of(entry.value())?;
            if meta.finalizers.is_empty() {
                None
            } else if meta.deletion_timestamp.is_none() {
                meta.deletion_timestamp = Some(Utc::now());
                meta.resource_version += 1;
                set_field(entry.value_mut(), "metadata", encode(&meta)?);
                Some(Some(meta.owner_references))
            } else {
                Some(None)
            }
        };

        match deferred {
            None => self.purge(kind, key),
            Some(Some(owners)) => {
                debug!(kind, key = %key, "deletion deferred by finalizers");
                self.emit(kind, key.clone(), ChangeKind::Updated, owners);
            }
            Some(None) => {}
        }
        Ok(())
    }

    /// Physically remove an object and cascade to its dependents.
    fn purge(&self, kind: &'static str, key: &ObjectKey) {
        let Some((_, value)) = self.objects.remove(&(kind, key.clone())) else {
            return;
        };
        let meta = meta_of(&value).unwrap_or_default();
        debug!(kind, key = %key, "deleted");
        self.emit(kind, key.clone(), ChangeKind::Deleted, meta.owner_references);

        if meta.uid.is_empty() {
            return;
        }
        let dependents: Vec<StoreKey> = self
            .objects
            .iter()
            .filter_map(|entry| {
                let dependent = meta_of(entry.value()).ok()?;
                dependent
                    .owner_references
                    .iter()
                    .any(|owner| owner.uid == meta.uid)
                    .then(|| entry.key().clone())
            })
            .collect();
        for (dependent_kind, dependent_key) in dependents {
            // Already gone is fine: another cascade got there first.
            let _ = self.delete_entry(dependent_kind, &dependent_key);
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get<T: Object>(&self, key: &ObjectKey) -> XdsResult<T> {
        let value = self
            .objects
            .get(&(T::KIND, key.clone()))
            .map(|entry| entry.value().clone())
            .ok_or_else(|| XdsError::not_found(T::KIND, key.to_string()))?;
        decode(value)
    }

    async fn list<T: Object>(
        &self,
        namespace: Option<&str>,
        selector: &LabelSelector,
    ) -> XdsResult<Vec<T>> {
        let mut matched: Vec<(ObjectKey, Value)> = self
            .objects
            .iter()
            .filter(|entry| {
                let (kind, key) = entry.key();
                *kind == T::KIND && namespace.map_or(true, |ns| key.namespace == ns)
            })
            .map(|entry| (entry.key().1.clone(), entry.value().clone()))
            .collect();
        matched.sort_by(|a, b| a.0.cmp(&b.0));

        let mut objects = Vec::with_capacity(matched.len());
        for (_, value) in matched {
            let object: T = decode(value)?;
            if selector.matches(&object.metadata().labels) {
                objects.push(object);
            }
        }
        Ok(objects)
    }

    async fn create<T: Object>(&self, mut object: T) -> XdsResult<T> {
        let key = object.key();
        if key.name.is_empty() {
            return Err(XdsError::InvalidObject {
                kind: T::KIND.to_string(),
                name: key.to_string(),
                reason: "metadata.name is required".to_string(),
            });
        }

        let uid = self.next_uid.fetch_add(1, Ordering::Relaxed) + 1;
        let meta = object.metadata_mut();
        meta.uid = format!("uid-{uid:08}");
        meta.resource_version = 1;
        meta.generation = 1;
        meta.creation_timestamp = Some(Utc::now());
        meta.deletion_timestamp = None;
        let owners = meta.owner_references.clone();
        let value = encode(&object)?;

        match self.objects.entry((T::KIND, key.clone())) {
            Entry::Occupied(_) => {
                return Err(XdsError::AlreadyExists {
                    kind: T::KIND.to_string(),
                    name: key.to_string(),
                })
            }
            Entry::Vacant(slot) => {
                slot.insert(value);
            }
        }

        debug!(kind = T::KIND, key = %key, "created");
        self.emit(T::KIND, key, ChangeKind::Created, owners);
        Ok(object)
    }

    async fn update<T: Object>(&self, object: T) -> XdsResult<T> {
        let key = object.key();
        let (stored, owners, purge) = {
            let Some(mut entry) = self.objects.get_mut(&(T::KIND, key.clone())) else {
                return Err(XdsError::not_found(T::KIND, key.to_string()));
            };
            let current = meta_of(entry.value())?;
            check_version(T::KIND, &key, &current, object.metadata())?;

            let mut next = encode(&object)?;
            if let Some(status) = entry.value().get("status") {
                set_field(&mut next, "status", status.clone());
            }

            let mut meta = object.metadata().clone();
            meta.uid = current.uid.clone();
            meta.creation_timestamp = current.creation_timestamp;
            meta.deletion_timestamp = current.deletion_timestamp;
            meta.resource_version = current.resource_version;
            meta.generation = current.generation;
            set_field(&mut next, "metadata", encode(&meta)?);
            if next == *entry.value() {
                return decode(next);
            }

            if body(&next) != body(entry.value()) {
                meta.generation += 1;
            }
            meta.resource_version += 1;
            set_field(&mut next, "metadata", encode(&meta)?);
            *entry.value_mut() = next.clone();

            let purge = meta.is_deleting() && meta.finalizers.is_empty();
            (next, meta.owner_references, purge)
        };

        debug!(kind = T::KIND, key = %key, "updated");
        self.emit(T::KIND, key.clone(), ChangeKind::Updated, owners);
        if purge {
            self.purge(T::KIND, &key);
        }
        decode(stored)
    }

    async fn update_status<T: Object>(&self, object: T) -> XdsResult<T> {
        let key = object.key();
        let (stored, owners) = {
            let Some(mut entry) = self.objects.get_mut(&(T::KIND, key.clone())) else {
                return Err(XdsError::not_found(T::KIND, key.to_string()));
            };
            let mut meta = meta_of(entry.value())?;
            check_version(T::KIND, &key, &meta, object.metadata())?;

            let status = encode(&object)?.get("status").cloned().unwrap_or(Value::Null);
            if entry.value().get("status").unwrap_or(&Value::Null) == &status {
                return decode(entry.value().clone());
            }

            let mut next = entry.value().clone();
            set_field(&mut next, "status", status);
            meta.resource_version += 1;
            set_field(&mut next, "metadata", encode(&meta)?);
            *entry.value_mut() = next.clone();
            (next, meta.owner_references)
        };

        trace!(kind = T::KIND, key = %key, "status updated");
        self.emit(T::KIND, key, ChangeKind::Updated, owners);
        decode(stored)
    }

    async fn delete<T: Object>(&self, key: &ObjectKey) -> XdsResult<()> {
        self.delete_entry(T::KIND, key)
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}

fn check_version(
    kind: &'static str,
    key: &ObjectKey,
    stored: &ObjectMeta,
    incoming: &ObjectMeta,
) -> XdsResult<()> {
    if incoming.resource_version != 0 && incoming.resource_version != stored.resource_version {
        return Err(XdsError::Conflict {
            kind: kind.to_string(),
            name: key.to_string(),
            current: stored.resource_version,
            attempted: incoming.resource_version,
        });
    }
    Ok(())
}

fn encode<T: serde::Serialize>(value: &T) -> XdsResult<Value> {
    serde_json::to_value(value).map_err(|e| XdsError::store("encode", e))
}

fn decode<T: Object>(value: Value) -> XdsResult<T> {
    serde_json::from_value(value).map_err(|e| XdsError::store("decode", e))
}

fn meta_of(value: &Value) -> XdsResult<ObjectMeta> {
    let meta = value.get("metadata").cloned().unwrap_or(Value::Null);
    serde_json::from_value(meta).map_err(|e| XdsError::store("decode", e))
}

fn set_field(target: &mut Value, field: &str, value: Value) {
    if let Some(object) = target.as_object_mut() {
        object.insert(field.to_string(), value);
    }
}

/// Everything except metadata and status.
fn body(value: &Value) -> Value {
    let mut body = value.clone();
    if let Some(object) = body.as_object_mut() {
        object.remove("metadata");
        object.remove("status");
    }
    body
}
