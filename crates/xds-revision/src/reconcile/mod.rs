//! Reconcilers.
//!
//! A reconciler drives one kind of record towards its desired state. It is
//! level-triggered: given only a key it re-reads everything it needs, so
//! running it twice in a row is harmless and missed events are recovered by
//! the next run.

mod cache;
mod revision;

use std::time::Duration;

use async_trait::async_trait;
use xds_core::XdsResult;

use crate::api::ObjectKey;
use crate::store::StoreEvent;

pub use cache::CacheReconciler;
pub use revision::RevisionReconciler;

/// What the runtime should do after a successful reconcile.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    /// Nothing to do until the next change event.
    Done,
    /// Run again after the delay even without events.
    RequeueAfter(Duration),
}

/// A controller's reconcile logic.
#[async_trait]
pub trait Reconciler: Send + Sync + 'static {
    /// Name used in logs and metric labels.
    const NAME: &'static str;

    async fn reconcile(&self, key: &ObjectKey) -> XdsResult<Action>;

    /// Keys to enqueue for a store event; empty if the event is irrelevant.
    async fn map_event(&self, event: &StoreEvent) -> Vec<ObjectKey>;

    /// Every key this reconciler owns, used on start and after missed events.
    async fn list_keys(&self) -> XdsResult<Vec<ObjectKey>>;
}
