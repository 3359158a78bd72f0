//! Controller metrics.
//!
//! Everything is recorded through the `metrics` facade; install any recorder
//! (for example a Prometheus exporter) to collect it. A few counters are also
//! kept locally so callers and tests can read them without a recorder.
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `xds_reconcile_total` | Counter | `controller`, `outcome` |
//! | `xds_reconcile_duration_seconds` | Histogram | `controller` |
//! | `xds_work_queue_in_flight` | Gauge | `controller` |
//! | `xds_snapshot_publications_total` | Counter | - |
//! | `xds_snapshot_unchanged_total` | Counter | - |
//! | `xds_revisions_created_total` | Counter | - |
//! | `xds_revisions_tainted_total` | Counter | `reason` |
//! | `xds_revisions_collected_total` | Counter | - |
//! | `xds_cache_out_of_sync_total` | Counter | - |

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge, histogram};

/// Metrics handle shared by the reconcilers and the runtime.
#[derive(Debug, Clone, Default)]
pub struct ControllerMetrics {
    inner: Arc<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    published: AtomicU64,
    unchanged: AtomicU64,
    created: AtomicU64,
    tainted: AtomicU64,
    collected: AtomicU64,
}

impl ControllerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finished reconcile.
    pub fn reconcile_finished(&self, controller: &'static str, outcome: &'static str, elapsed: Duration) {
        counter!("xds_reconcile_total", "controller" => controller, "outcome" => outcome)
            .increment(1);
        histogram!("xds_reconcile_duration_seconds", "controller" => controller)
            .record(elapsed.as_secs_f64());
    }

    pub fn set_in_flight(&self, controller: &'static str, count: usize) {
        gauge!("xds_work_queue_in_flight", "controller" => controller).set(count as f64);
    }

    pub fn snapshot_published(&self) {
        self.inner.published.fetch_add(1, Ordering::Relaxed);
        counter!("xds_snapshot_publications_total").increment(1);
    }

    pub fn snapshot_unchanged(&self) {
        self.inner.unchanged.fetch_add(1, Ordering::Relaxed);
        counter!("xds_snapshot_unchanged_total").increment(1);
    }

    pub fn revision_created(&self) {
        self.inner.created.fetch_add(1, Ordering::Relaxed);
        counter!("xds_revisions_created_total").increment(1);
    }

    pub fn revision_tainted(&self, reason: &'static str) {
        self.inner.tainted.fetch_add(1, Ordering::Relaxed);
        counter!("xds_revisions_tainted_total", "reason" => reason).increment(1);
    }

    pub fn revisions_collected(&self, count: usize) {
        if count == 0 {
            return;
        }
        self.inner
            .collected
            .fetch_add(count as u64, Ordering::Relaxed);
        counter!("xds_revisions_collected_total").increment(count as u64);
    }

    pub fn cache_out_of_sync(&self) {
        counter!("xds_cache_out_of_sync_total").increment(1);
    }

    pub fn snapshots_published(&self) -> u64 {
        self.inner.published.load(Ordering::Relaxed)
    }

    pub fn snapshots_unchanged(&self) -> u64 {
        self.inner.unchanged.load(Ordering::Relaxed)
    }

    pub fn revisions_created(&self) -> u64 {
        self.inner.created.load(Ordering::Relaxed)
    }

    pub fn revisions_tainted(&self) -> u64 {
        self.inner.tainted.load(Ordering::Relaxed)
    }

    pub fn revisions_collected_total(&self) -> u64 {
        self.inner.collected.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_counters() {
        let metrics = ControllerMetrics::new();
        let clone = metrics.clone();

        clone.snapshot_published();
        clone.snapshot_unchanged();
        clone.revision_tainted("ResourceDecodeError");
        clone.revisions_collected(0);
        clone.revisions_collected(2);

        assert_eq!(metrics.snapshots_published(), 1);
        assert_eq!(metrics.snapshots_unchanged(), 1);
        assert_eq!(metrics.revisions_tainted(), 1);
        assert_eq!(metrics.revisions_collected_total(), 2);
    }
}
