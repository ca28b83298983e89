//! Background Reconcile Processor
//!
//! Runs [`IndexSynchronizer::reconcile`] in a background task:
//! - on a fixed interval (`reconcile_interval_secs`)
//! - whenever woken through a [`ReconcileWaker`], e.g. after a batch write
//!   that suppressed the reactive hook
//!
//! A woken run keeps reconciling while full batches come back, so a large
//! backlog drains without waiting for the next tick. Only one task ever calls
//! `reconcile`, which keeps the checkpoint single-writer within the process.

use crate::services::index_sync::IndexSynchronizer;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Handle to wake the reconcile processor
///
/// Cloneable; multiple wakes are coalesced into a single run.
#[derive(Clone)]
pub struct ReconcileWaker {
    trigger_tx: mpsc::Sender<()>,
}

impl ReconcileWaker {
    /// Wake the processor (non-blocking)
    pub fn wake(&self) {
        match self.trigger_tx.try_send(()) {
            Ok(_) => {
                tracing::debug!("ReconcileProcessor wake signal sent");
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                // Channel full means processor will wake up anyway
                tracing::debug!("ReconcileProcessor already has pending wake");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!("ReconcileProcessor has shut down, wake ignored");
            }
        }
    }
}

/// Periodic and on-demand index reconciliation
pub struct ReconcileProcessor {
    waker: ReconcileWaker,
    shutdown_tx: mpsc::Sender<()>,
    handle: tokio::task::JoinHandle<()>,
}

impl ReconcileProcessor {
    /// Spawn the background task
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(sync: Arc<IndexSynchronizer>, interval: Duration, batch_size: usize) -> Self {
        tracing::info!(
            "ReconcileProcessor starting (interval {}s)",
            interval.as_secs()
        );

        let (trigger_tx, mut trigger_rx) = mpsc::channel::<()>(10);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately; skip it so startup stays quiet
            ticker.tick().await;

            loop {
                tokio::select! {
                    biased;

                    _ = shutdown_rx.recv() => {
                        tracing::info!("ReconcileProcessor shutting down");
                        break;
                    }

                    Some(_) = trigger_rx.recv() => {
                        tracing::debug!("ReconcileProcessor woken up by trigger");
                        while trigger_rx.try_recv().is_ok() {}
                        Self::process_until_caught_up(&sync, batch_size).await;
                    }

                    _ = ticker.tick() => {
                        Self::process_until_caught_up(&sync, batch_size).await;
                    }
                }
            }
        });

        Self {
            waker: ReconcileWaker { trigger_tx },
            shutdown_tx,
            handle,
        }
    }

    /// Get a cloneable waker handle
    pub fn waker(&self) -> ReconcileWaker {
        self.waker.clone()
    }

    /// Wake the processor to reconcile now
    pub fn wake(&self) {
        self.waker.wake();
    }

    /// Run reconcile until a run processes fewer than `batch_size` nodes in total
    ///
    /// The count is summed over all indexed kinds. A kind with a backlog fills
    /// its batch, so stopping means every kind caught up; a sum reaching
    /// `batch_size` with no full kind costs one extra, empty run.
    ///
    /// Returns the number of nodes processed.
    async fn process_until_caught_up(sync: &IndexSynchronizer, batch_size: usize) -> usize {
        let mut total = 0;

        loop {
            match sync.reconcile().await {
                Ok(report) => {
                    total += report.processed();
                    if report.processed() < batch_size {
                        if total > 0 {
                            tracing::info!("ReconcileProcessor caught up after {} nodes", total);
                        }
                        return total;
                    }
                    tokio::task::yield_now().await;
                }
                Err(e) => {
                    // Checkpoint did not move; the next wake or tick retries
                    tracing::error!("Reconcile failed after {} nodes: {}", total, e);
                    return total;
                }
            }
        }
    }

    /// Shutdown processor gracefully
    ///
    /// Waits for an in-progress reconcile to finish before returning.
    pub async fn shutdown(self) {
        tracing::info!("Shutting down ReconcileProcessor");
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.handle.await {
            tracing::warn!("ReconcileProcessor task ended abnormally: {}", e);
        }
    }
}
