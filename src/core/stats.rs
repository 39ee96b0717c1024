//! Reconciliation counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Point-in-time view of reconciler activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcilerStats {
    /// Number of worker threads.
    pub worker_count: usize,
    /// Keys handed to `reconcile`.
    pub reconciled: u64,
    /// Phase writes that succeeded.
    pub status_writes: u64,
    /// Passes where the computed phase matched the stored phase.
    pub unchanged: u64,
    /// Passes skipped because the group was stale.
    pub stale_skips: u64,
    /// Keys dropped because the group no longer exists.
    pub not_found: u64,
    /// Version conflicts seen by the status writer.
    pub conflicts: u64,
    /// Keys re-queued with backoff.
    pub requeued: u64,
    /// Keys abandoned after exhausting retries or on a permanent error.
    pub dropped: u64,
    /// Keys ready in the work queue at snapshot time.
    pub queue_depth: usize,
}

/// Lock-free counters behind [`ReconcilerStats`].
#[derive(Debug, Default)]
pub(crate) struct ReconcilerCounters {
    pub reconciled: AtomicU64,
    pub status_writes: AtomicU64,
    pub unchanged: AtomicU64,
    pub stale_skips: AtomicU64,
    pub not_found: AtomicU64,
    pub conflicts: AtomicU64,
    pub requeued: AtomicU64,
    pub dropped: AtomicU64,
}

impl ReconcilerCounters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, worker_count: usize, queue_depth: usize) -> ReconcilerStats {
        ReconcilerStats {
            worker_count,
            reconciled: self.reconciled.load(Ordering::Relaxed),
            status_writes: self.status_writes.load(Ordering::Relaxed),
            unchanged: self.unchanged.load(Ordering::Relaxed),
            stale_skips: self.stale_skips.load(Ordering::Relaxed),
            not_found: self.not_found.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
            requeued: self.requeued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            queue_depth,
        }
    }
}
