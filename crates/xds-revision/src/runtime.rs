//! Controller runtime.
//!
//! Feeds store events through a reconciler's event mapping into a keyed work
//! queue. A key is never reconciled twice at the same time: a key that changes
//! while its reconcile runs is marked dirty and runs once more afterwards, so
//! bursts of events for one key coalesce into at most one extra run.
//!
//! Failed reconciles are retried according to their [`ErrorClass`]:
//!
//! | Outcome | Retry |
//! |---------|-------|
//! | `Ok(Done)` | on the next event |
//! | `Ok(RequeueAfter(d))` | after `d` |
//! | transient or internal error | exponential backoff |
//! | specification error | after the tainted retry delay |
//! | terminal error | on the next event |

use std::collections::{HashMap, HashSet, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tokio::task::{AbortHandle, JoinHandle, JoinSet};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use xds_core::{ErrorClass, XdsResult};

use crate::api::ObjectKey;
use crate::config::ControllerConfig;
use crate::metrics::ControllerMetrics;
use crate::reconcile::{Action, Reconciler};
use crate::shutdown::ShutdownController;
use crate::store::StoreEvent;

/// Counts outstanding work across controllers.
///
/// Queued, running and dirty keys are outstanding; scheduled retries are not.
#[derive(Debug, Clone, Default)]
pub struct WorkTracker {
    inner: Arc<TrackerInner>,
}

#[derive(Debug, Default)]
struct TrackerInner {
    outstanding: AtomicUsize,
    completed: AtomicU64,
}

impl WorkTracker {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn outstanding(&self) -> usize {
        self.inner.outstanding.load(Ordering::SeqCst)
    }

    #[inline]
    pub fn completed(&self) -> u64 {
        self.inner.completed.load(Ordering::SeqCst)
    }

    fn enqueued(&self) {
        self.inner.outstanding.fetch_add(1, Ordering::SeqCst);
    }

    fn finished(&self) {
        self.inner.completed.fetch_add(1, Ordering::SeqCst);
        self.inner.outstanding.fetch_sub(1, Ordering::SeqCst);
    }

    /// Wait until nothing is outstanding and nothing completed for `quiet`.
    pub async fn wait_settled(&self, quiet: Duration) {
        loop {
            let seen = self.completed();
            tokio::time::sleep(quiet).await;
            if self.outstanding() == 0 && self.completed() == seen {
                return;
            }
        }
    }
}

/// Keyed queue with in-flight coalescing.
///
/// At most one timed retry is pending per key, the earliest one asked for.
#[derive(Debug, Default)]
struct WorkQueue {
    pending: VecDeque<ObjectKey>,
    queued: HashSet<ObjectKey>,
    in_flight: HashSet<ObjectKey>,
    dirty: HashSet<ObjectKey>,
    failures: HashMap<ObjectKey, u32>,
    scheduled: HashMap<ObjectKey, (Instant, AbortHandle)>,
}

impl WorkQueue {
    /// Returns whether the key became outstanding.
    fn add(&mut self, key: ObjectKey) -> bool {
        if self.in_flight.contains(&key) {
            return self.dirty.insert(key);
        }
        if self.queued.insert(key.clone()) {
            self.pending.push_back(key);
            return true;
        }
        false
    }

    fn next(&mut self) -> Option<ObjectKey> {
        let key = self.pending.pop_front()?;
        self.queued.remove(&key);
        if let Some((_, timer)) = self.scheduled.remove(&key) {
            timer.abort();
        }
        self.in_flight.insert(key.clone());
        Some(key)
    }

    /// Whether a retry at `deadline` comes before the one already pending.
    fn retry_sooner(&self, key: &ObjectKey, deadline: Instant) -> bool {
        self.scheduled
            .get(key)
            .map_or(true, |(pending, _)| deadline < *pending)
    }

    fn schedule(&mut self, key: ObjectKey, deadline: Instant, timer: AbortHandle) {
        if let Some((_, previous)) = self.scheduled.insert(key, (deadline, timer)) {
            previous.abort();
        }
    }

    /// Claim a fired timer. Stale timers for a superseded deadline yield false.
    fn fire(&mut self, key: &ObjectKey, deadline: Instant) -> bool {
        match self.scheduled.get(key) {
            Some((pending, _)) if *pending == deadline => {
                self.scheduled.remove(key);
                true
            }
            _ => false,
        }
    }

    fn done(&mut self, key: &ObjectKey) {
        self.in_flight.remove(key);
        if self.dirty.remove(key) && self.queued.insert(key.clone()) {
            self.pending.push_back(key.clone());
        }
    }
}

type TaskOutput = (ObjectKey, Duration, Result<XdsResult<Action>, String>);

/// Runs one [`Reconciler`] against a stream of store events.
#[derive(Debug)]
pub struct Controller<R> {
    reconciler: Arc<R>,
    config: ControllerConfig,
    metrics: ControllerMetrics,
    tracker: WorkTracker,
    shutdown: ShutdownController,
}

impl<R: Reconciler> Controller<R> {
    pub fn new(
        reconciler: R,
        config: ControllerConfig,
        metrics: ControllerMetrics,
        shutdown: ShutdownController,
    ) -> Self {
        Self {
            reconciler: Arc::new(reconciler),
            config,
            metrics,
            tracker: WorkTracker::new(),
            shutdown,
        }
    }

    /// Share a tracker with other controllers.
    pub fn with_tracker(mut self, tracker: WorkTracker) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn tracker(&self) -> WorkTracker {
        self.tracker.clone()
    }

    /// Spawn the controller loop onto the current runtime.
    pub fn spawn(self, events: broadcast::Receiver<StoreEvent>) -> JoinHandle<()> {
        // Startup counts as outstanding until the initial listing is queued.
        self.tracker.enqueued();
        tokio::spawn(self.run_loop(events))
    }

    /// Run until shutdown is signalled or the event stream closes.
    pub async fn run(self, events: broadcast::Receiver<StoreEvent>) {
        self.tracker.enqueued();
        self.run_loop(events).await;
    }

    async fn run_loop(self, mut events: broadcast::Receiver<StoreEvent>) {
        let (requeue_tx, mut requeue_rx) = mpsc::unbounded_channel::<(ObjectKey, Instant)>();
        let mut queue = WorkQueue::default();
        let mut tasks: JoinSet<TaskOutput> = JoinSet::new();
        let mut timers: JoinSet<()> = JoinSet::new();
        let shutdown = self.shutdown.shutdown_signal().wait();
        tokio::pin!(shutdown);

        info!(controller = R::NAME, "controller started");
        self.resync(&mut queue).await;
        self.tracker.finished();

        loop {
            while let Some(key) = queue.next() {
                self.dispatch(key, &mut tasks);
            }
            self.metrics.set_in_flight(R::NAME, queue.in_flight.len());

            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!(controller = R::NAME, "shutdown signalled");
                    break;
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    match joined {
                        Ok(output) => self.complete(output, &mut queue, &mut timers, &requeue_tx),
                        Err(e) => error!(controller = R::NAME, error = %e, "reconcile task aborted"),
                    }
                }
                event = events.recv() => match event {
                    Ok(event) => {
                        for key in self.reconciler.map_event(&event).await {
                            self.enqueue(&mut queue, key);
                        }
                    }
                    Err(RecvError::Lagged(missed)) => {
                        warn!(controller = R::NAME, missed, "event stream lagged, resyncing");
                        self.resync(&mut queue).await;
                    }
                    Err(RecvError::Closed) => {
                        info!(controller = R::NAME, "event stream closed");
                        break;
                    }
                },
                Some((key, deadline)) = requeue_rx.recv() => {
                    if queue.fire(&key, deadline) {
                        self.enqueue(&mut queue, key);
                    }
                }
                Some(_) = timers.join_next(), if !timers.is_empty() => {}
            }
        }

        timers.abort_all();
        while let Some(joined) = tasks.join_next().await {
            if let Ok((key, elapsed, result)) = joined {
                self.metrics
                    .reconcile_finished(R::NAME, outcome_label(&result), elapsed);
                debug!(controller = R::NAME, key = %key, "drained reconcile");
            }
        }
        self.metrics.set_in_flight(R::NAME, 0);
        info!(controller = R::NAME, "controller stopped");
    }

    fn enqueue(&self, queue: &mut WorkQueue, key: ObjectKey) {
        if queue.add(key) {
            self.tracker.enqueued();
        }
    }

    async fn resync(&self, queue: &mut WorkQueue) {
        match self.reconciler.list_keys().await {
            Ok(keys) => {
                debug!(controller = R::NAME, count = keys.len(), "resync");
                for key in keys {
                    self.enqueue(queue, key);
                }
            }
            Err(e) => error!(controller = R::NAME, error = %e, "resync failed"),
        }
    }

    fn dispatch(&self, key: ObjectKey, tasks: &mut JoinSet<TaskOutput>) {
        let reconciler = Arc::clone(&self.reconciler);
        let guard = self.shutdown.register_operation();
        tasks.spawn(async move {
            let _guard = guard;
            let started = Instant::now();
            let result = AssertUnwindSafe(reconciler.reconcile(&key))
                .catch_unwind()
                .await
                .map_err(|panic| panic_message(panic.as_ref()));
            (key, started.elapsed(), result)
        });
    }

    fn complete(
        &self,
        (key, elapsed, result): TaskOutput,
        queue: &mut WorkQueue,
        timers: &mut JoinSet<()>,
        requeue: &mpsc::UnboundedSender<(ObjectKey, Instant)>,
    ) {
        self.metrics
            .reconcile_finished(R::NAME, outcome_label(&result), elapsed);

        let retry = match &result {
            Ok(Ok(Action::Done)) => {
                queue.failures.remove(&key);
                None
            }
            Ok(Ok(Action::RequeueAfter(delay))) => {
                queue.failures.remove(&key);
                Some(*delay)
            }
            Ok(Err(e)) => match e.class() {
                ErrorClass::Transient | ErrorClass::Internal => {
                    let delay = self.config.backoff(record_failure(queue, &key));
                    warn!(controller = R::NAME, key = %key, error = %e, retry_in = ?delay, "reconcile failed");
                    Some(delay)
                }
                ErrorClass::Specification => {
                    warn!(controller = R::NAME, key = %key, error = %e, "invalid specification");
                    Some(self.config.tainted_retry_delay)
                }
                ErrorClass::Terminal => {
                    info!(controller = R::NAME, key = %key, error = %e, "waiting for an external change");
                    None
                }
            },
            Err(message) => {
                let delay = self.config.backoff(record_failure(queue, &key));
                error!(controller = R::NAME, key = %key, panic = %message, "reconcile panicked");
                Some(delay)
            }
        };

        if let Some(delay) = retry {
            let deadline = Instant::now() + delay;
            if queue.retry_sooner(&key, deadline) {
                let requeue = requeue.clone();
                let fired = key.clone();
                let timer = timers.spawn(async move {
                    tokio::time::sleep_until(deadline).await;
                    let _ = requeue.send((fired, deadline));
                });
                queue.schedule(key.clone(), deadline, timer);
            }
        }

        queue.done(&key);
        self.tracker.finished();
    }
}

fn record_failure(queue: &mut WorkQueue, key: &ObjectKey) -> u32 {
    let failures = queue.failures.entry(key.clone()).or_insert(0);
    *failures = failures.saturating_add(1);
    *failures
}

fn outcome_label(result: &Result<XdsResult<Action>, String>) -> &'static str {
    match result {
        Ok(Ok(Action::Done)) => "success",
        Ok(Ok(Action::RequeueAfter(_))) => "requeue",
        Ok(Err(_)) => "error",
        Err(_) => "panic",
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
