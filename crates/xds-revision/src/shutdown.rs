//! Graceful shutdown coordination.
//!
//! Controllers stop taking new work once shutdown is signalled; reconciles
//! already running hold an [`OperationGuard`] and are given a grace period to
//! finish.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use xds_revision::shutdown::ShutdownController;
//!
//! # tokio_test_block_on(async {
//! let controller = ShutdownController::new();
//! let signal = controller.shutdown_signal();
//!
//! assert!(controller.shutdown(Duration::from_millis(10)).await);
//! signal.wait().await;
//! assert!(controller.is_shutdown());
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Runtime::new().unwrap().block_on(f)
//! # }
//! ```

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{info, warn};

/// Shared shutdown flag plus a count of running operations.
#[derive(Debug, Clone)]
pub struct ShutdownController {
    inner: Arc<ShutdownInner>,
}

#[derive(Debug)]
struct ShutdownInner {
    initiated: AtomicBool,
    tx: watch::Sender<bool>,
    rx: watch::Receiver<bool>,
    active_ops: AtomicUsize,
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownController {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            inner: Arc::new(ShutdownInner {
                initiated: AtomicBool::new(false),
                tx,
                rx,
                active_ops: AtomicUsize::new(0),
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.inner.rx.clone()
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner.initiated.load(Ordering::SeqCst)
    }

    /// Future that resolves once shutdown is initiated.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.inner.rx.clone(),
        }
    }

    /// Notify subscribers without waiting. Returns false if already initiated.
    pub fn trigger(&self) -> bool {
        if self
            .inner
            .initiated
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }
        let _ = self.inner.tx.send(true);
        true
    }

    /// Notify subscribers and wait for running operations.
    ///
    /// Returns `false` if operations were still running when the grace period
    /// ran out.
    pub async fn shutdown(&self, grace_period: Duration) -> bool {
        if self.trigger() {
            info!(grace_period = ?grace_period, "initiating graceful shutdown");
        }

        match timeout(grace_period, self.wait_for_completion()).await {
            Ok(()) => {
                info!("graceful shutdown completed");
                true
            }
            Err(_) => {
                warn!(
                    remaining_ops = self.active_operations(),
                    "graceful shutdown timed out"
                );
                false
            }
        }
    }

    async fn wait_for_completion(&self) {
        while self.active_operations() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Register a running operation until the guard is dropped.
    pub fn register_operation(&self) -> OperationGuard {
        self.inner.active_ops.fetch_add(1, Ordering::SeqCst);
        OperationGuard {
            controller: self.clone(),
        }
    }

    pub fn active_operations(&self) -> usize {
        self.inner.active_ops.load(Ordering::SeqCst)
    }
}

/// Decrements the running operation count when dropped.
#[derive(Debug)]
pub struct OperationGuard {
    controller: ShutdownController,
}

impl Drop for OperationGuard {
    fn drop(&mut self) {
        self.controller.inner.active_ops.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Resolves when shutdown is initiated.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    pub async fn wait(mut self) {
        // A closed channel counts as shutdown.
        let _ = self.rx.wait_for(|initiated| *initiated).await;
    }
}

/// Wait for SIGTERM or SIGINT (Ctrl+C elsewhere).
pub async fn wait_for_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => info!("received SIGTERM"),
            _ = sigint.recv() => info!("received SIGINT"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("received Ctrl+C");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_tracking() {
        let controller = ShutdownController::new();
        {
            let _a = controller.register_operation();
            let _b = controller.register_operation();
            assert_eq!(controller.active_operations(), 2);
        }
        assert_eq!(controller.active_operations(), 0);
    }

    #[test]
    fn trigger_is_idempotent() {
        let controller = ShutdownController::new();
        assert!(controller.trigger());
        assert!(!controller.trigger());
        assert!(*controller.subscribe().borrow());
    }

    #[tokio::test]
    async fn shutdown_waits_for_operations() {
        let controller = ShutdownController::new();
        let guard = controller.register_operation();

        let waiting = controller.clone();
        let handle = tokio::spawn(async move { waiting.shutdown(Duration::from_secs(5)).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(guard);

        assert!(handle.await.unwrap());
    }

    #[tokio::test]
    async fn shutdown_times_out() {
        let controller = ShutdownController::new();
        let _guard = controller.register_operation();
        assert!(!controller.shutdown(Duration::from_millis(20)).await);
    }

    #[tokio::test]
    async fn signal_resolves_after_trigger() {
        let controller = ShutdownController::new();
        let signal = controller.shutdown_signal();
        let trigger = controller.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.trigger();
        });
        signal.wait().await;
        assert!(controller.is_shutdown());
    }
}
