//! The metrics reconciliation queue.
//!
//! An explicit two-state machine (Idle / Draining) driven by message
//! passing. Enqueues are cheap unbounded channel sends; the worker
//! collapses everything buffered into a deduplicating batch, processes
//! each petition serially, and re-enters Draining immediately if new
//! ids arrived mid-batch. At most one reconciliation pass is in flight
//! per petition per drain.
//!
//! Failures reconciling one petition are logged and skipped; the next
//! organic enqueue for that petition reconciles it again. The snapshot
//! is a best-effort read model, never the source of truth.

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use groundswell_common::Config;
use groundswell_store::EngagementStore;

use crate::recompute::reconcile_petition;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueueState {
    Idle,
    Draining,
}

/// Cheap, cloneable enqueue side of the queue.
#[derive(Clone)]
pub struct ReconcileHandle {
    tx: mpsc::UnboundedSender<Uuid>,
}

impl ReconcileHandle {
    /// Mark a petition as needing reconciliation. Multiple enqueues
    /// before the next drain collapse into one pass.
    pub fn enqueue(&self, petition_id: Uuid) {
        if self.tx.send(petition_id).is_err() {
            warn!(%petition_id, "Reconciler is stopped; enqueue dropped");
        }
    }
}

/// Counters for one reconciler lifetime.
#[derive(Debug, Default, Clone)]
pub struct ReconcilerStats {
    pub passes: u64,
    pub failures: u64,
    pub timeouts: u64,
    pub batches: u64,
}

impl fmt::Display for ReconcilerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "passes={} failures={} timeouts={} batches={}",
            self.passes, self.failures, self.timeouts, self.batches,
        )
    }
}

/// The reconciliation worker. Explicitly constructed, never a global;
/// independent instances can run against independent stores in tests.
pub struct MetricsReconciler {
    store: EngagementStore,
    rx: mpsc::UnboundedReceiver<Uuid>,
    per_petition_timeout: Duration,
    stats: ReconcilerStats,
}

impl MetricsReconciler {
    pub fn new(store: EngagementStore, config: &Config) -> (ReconcileHandle, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            ReconcileHandle { tx },
            Self {
                store,
                rx,
                per_petition_timeout: config.reconcile_timeout,
                stats: ReconcilerStats::default(),
            },
        )
    }

    pub fn stats(&self) -> &ReconcilerStats {
        &self.stats
    }

    /// Run until every handle is dropped. Returns final stats.
    pub async fn run(mut self) -> ReconcilerStats {
        while self.drain_once().await {}
        info!("Reconciler stopped. {}", self.stats);
        self.stats
    }

    /// One full Idle → Draining → Idle cycle. Blocks in Idle until an
    /// id arrives; returns false once the channel is closed and empty.
    pub async fn drain_once(&mut self) -> bool {
        // Idle: wait for the enqueue that triggers the transition.
        let Some(first) = self.rx.recv().await else {
            return false;
        };

        let mut state = QueueState::Draining;
        let mut batch = HashSet::from([first]);
        debug!("Reconcile queue: Idle -> Draining");

        while state == QueueState::Draining {
            // Take everything buffered so far; dedup by petition id.
            while let Ok(id) = self.rx.try_recv() {
                batch.insert(id);
            }
            debug!(pending = batch.len(), "Draining batch");

            for petition_id in batch.drain() {
                self.reconcile_one(petition_id).await;
            }
            self.stats.batches += 1;

            // Ids that arrived mid-batch re-enter Draining immediately
            // rather than waiting for the next enqueue.
            match self.rx.try_recv() {
                Ok(id) => {
                    batch.insert(id);
                }
                Err(_) => {
                    state = QueueState::Idle;
                }
            }
        }
        debug!("Reconcile queue: Draining -> Idle");

        true
    }

    async fn reconcile_one(&mut self, petition_id: Uuid) {
        let store = self.store.clone();
        let work = tokio::task::spawn_blocking(move || reconcile_petition(&store, petition_id));

        match timeout(self.per_petition_timeout, work).await {
            // A timed-out pass is abandoned, not cancelled: it keeps
            // running on the blocking pool and may still write its
            // snapshot after a newer pass has written a fresher one.
            // The snapshot is a read model recomputed on every
            // enqueue, so the next organic enqueue corrects it.
            Err(_) => {
                self.stats.timeouts += 1;
                self.stats.failures += 1;
                warn!(%petition_id, "Reconciliation timed out; skipping");
            }
            Ok(Err(join_err)) => {
                self.stats.failures += 1;
                warn!(%petition_id, error = %join_err, "Reconciliation task failed; skipping");
            }
            Ok(Ok(Err(e))) => {
                self.stats.failures += 1;
                warn!(%petition_id, error = %e, "Reconciliation failed; skipping");
            }
            Ok(Ok(Ok(snapshot))) => {
                self.stats.passes += 1;
                debug!(
                    %petition_id,
                    vote_count = snapshot.vote_count,
                    total_vigor = snapshot.total_vigor,
                    trending = snapshot.trending_score,
                    "Snapshot reconciled"
                );
            }
        }
    }
}
