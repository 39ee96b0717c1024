//! Group-status reconciliation.
//!
//! Change notifications are translated to group keys and pushed onto a shared
//! [`WorkQueue`]. Each worker pops a key, checks staleness, computes the next
//! phase from the member index and persists it through the [`StatusWriter`].
//! A failure only affects its own key: retryable errors are re-queued with
//! backoff, everything else is logged and dropped.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info, trace, warn};

use crate::config::ControllerConfig;
use crate::core::events::{TransitionEvent, TransitionSink};
use crate::core::member_index::MemberIndex;
use crate::core::model::{Group, GroupKey, Member, WatchEvent};
use crate::core::phase::{evaluate_phase, Phase, PhaseDecision, PhaseInput};
use crate::core::staleness::StalenessFilter;
use crate::core::stats::{ReconcilerCounters, ReconcilerStats};
use crate::core::status_writer::{StatusWriter, WriteOutcome};
use crate::core::store::ObjectStore;
use crate::core::work_queue::WorkQueue;
use crate::core::ControllerError;

/// Shared handle to a transition sink.
pub type SharedTransitionSink = Arc<Mutex<dyn TransitionSink>>;

/// What a single reconciliation pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Phase persisted.
    Updated {
        /// Phase before.
        from: Phase,
        /// Phase after.
        to: Phase,
    },
    /// Computed phase equalled the stored phase.
    Unchanged(Phase),
    /// Group is older than the staleness threshold; left as is.
    Stale,
    /// Group no longer exists.
    NotFound,
}

/// Reconciles group phases from member state.
pub struct Reconciler<S> {
    index: Arc<MemberIndex>,
    staleness: StalenessFilter,
    writer: StatusWriter<S>,
    queue: Arc<WorkQueue<GroupKey>>,
    counters: ReconcilerCounters,
    max_retries: u32,
    worker_count: AtomicUsize,
    transitions: Option<SharedTransitionSink>,
}

impl<S: ObjectStore> Reconciler<S> {
    /// Wire a reconciler from its collaborators.
    pub fn new(
        store: Arc<S>,
        index: Arc<MemberIndex>,
        staleness: StalenessFilter,
        config: &ControllerConfig,
    ) -> Self {
        Self {
            index,
            staleness,
            writer: StatusWriter::new(store, config.conflict_retries),
            queue: Arc::new(WorkQueue::new(config.backoff())),
            counters: ReconcilerCounters::default(),
            max_retries: config.max_retries,
            worker_count: AtomicUsize::new(config.worker_count),
            transitions: None,
        }
    }

    /// Attach a sink receiving every persisted transition.
    #[must_use]
    pub fn with_transition_sink(mut self, sink: SharedTransitionSink) -> Self {
        self.transitions = Some(sink);
        self
    }

    /// The work queue feeding the workers.
    #[must_use]
    pub const fn queue(&self) -> &Arc<WorkQueue<GroupKey>> {
        &self.queue
    }

    /// The member index read by the phase calculator.
    #[must_use]
    pub const fn index(&self) -> &Arc<MemberIndex> {
        &self.index
    }

    /// Request a reconciliation of `key`.
    pub fn enqueue(&self, key: GroupKey) {
        trace!(group = %key, "enqueue");
        self.queue.add(key);
    }

    /// Translate a group change into an enqueue.
    ///
    /// Terminal groups are not enqueued on add/update; they are never
    /// mutated again.
    pub fn handle_group_event(&self, event: &WatchEvent<Group>) {
        let group = event.object();
        if !matches!(event, WatchEvent::Deleted(_)) && group.status.phase.is_terminal() {
            trace!(
                group = %group.key(),
                phase = %group.status.phase,
                "terminal group, not enqueued"
            );
            return;
        }
        self.enqueue(group.key());
    }

    /// Apply a member change to the index and enqueue every touched group.
    pub fn handle_member_event(&self, event: &WatchEvent<Member>) {
        for key in self.index.apply(event) {
            self.enqueue(key);
        }
    }

    fn decide(&self, key: &GroupKey, group: &Group) -> PhaseDecision {
        evaluate_phase(&PhaseInput {
            current: group.status.phase,
            min_member: group.spec.min_member,
            scheduled_count: group.status.scheduled_count,
            histogram: self.index.histogram(key),
        })
    }

    /// Run one reconciliation pass for `key`.
    ///
    /// # Errors
    ///
    /// Store errors other than `NotFound`, and `Conflict` once the writer's
    /// retries are exhausted.
    pub async fn reconcile(&self, key: &GroupKey) -> Result<ReconcileOutcome, ControllerError> {
        let mut decision = None;
        let result = self
            .writer
            .write(key, |group| {
                if self.staleness.is_stale(group) {
                    decision = None;
                    return None;
                }
                let d = self.decide(key, group);
                decision = Some(d);
                Some(d.phase)
            })
            .await;

        let (outcome, conflicts) = match result {
            Ok(ok) => ok,
            Err(ControllerError::NotFound(_)) => {
                ReconcilerCounters::bump(&self.counters.not_found);
                debug!(group = %key, "group not found, dropping");
                return Ok(ReconcileOutcome::NotFound);
            }
            Err(err) => {
                if matches!(err, ControllerError::Conflict { .. }) {
                    let seen = u64::from(self.writer.max_conflict_retries()) + 1;
                    self.counters.conflicts.fetch_add(seen, Ordering::Relaxed);
                }
                return Err(err);
            }
        };
        self.counters
            .conflicts
            .fetch_add(u64::from(conflicts), Ordering::Relaxed);

        match outcome {
            WriteOutcome::Skipped { group } => {
                ReconcilerCounters::bump(&self.counters.stale_skips);
                debug!(
                    group = %key,
                    phase = %group.status.phase,
                    age_ms = u64::try_from(self.staleness.age_ms(&group)).unwrap_or(u64::MAX),
                    "group is stale, skipping"
                );
                Ok(ReconcileOutcome::Stale)
            }
            WriteOutcome::Unchanged { group } => {
                ReconcilerCounters::bump(&self.counters.unchanged);
                debug!(group = %key, phase = %group.status.phase, "phase unchanged");
                Ok(ReconcileOutcome::Unchanged(group.status.phase))
            }
            WriteOutcome::Written { previous, group } => {
                ReconcilerCounters::bump(&self.counters.status_writes);
                let to = group.status.phase;
                let rule = decision.map(|d| d.rule);
                info!(
                    group = %key,
                    from = %previous,
                    to = %to,
                    rule = ?rule,
                    "group phase updated"
                );
                if let (Some(sink), Some(rule)) = (&self.transitions, rule) {
                    sink.lock().record(TransitionEvent::new(
                        key.clone(),
                        previous,
                        to,
                        rule,
                        group.meta.resource_version,
                    ));
                }
                Ok(ReconcileOutcome::Updated { from: previous, to })
            }
        }
    }

    /// Settle a finished pass: forget on success, back off or drop on error.
    pub fn handle_result(&self, key: &GroupKey, result: Result<ReconcileOutcome, ControllerError>) {
        ReconcilerCounters::bump(&self.counters.reconciled);
        match result {
            Ok(outcome) => {
                trace!(group = %key, ?outcome, "reconciled");
                self.queue.forget(key);
            }
            Err(err) if err.is_retryable() && self.queue.num_requeues(key) < self.max_retries => {
                ReconcilerCounters::bump(&self.counters.requeued);
                let delay = self.queue.add_rate_limited(key.clone());
                warn!(
                    group = %key,
                    error = %err,
                    attempt = self.queue.num_requeues(key),
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "reconcile failed, requeued"
                );
            }
            Err(err) => {
                ReconcilerCounters::bump(&self.counters.dropped);
                self.queue.forget(key);
                error!(group = %key, error = %err, "dropping group out of the queue");
            }
        }
    }

    /// Pop one key, reconcile it on `rt` and settle the result.
    ///
    /// Returns `false` once the queue has shut down.
    pub fn process_next(&self, rt: &tokio::runtime::Runtime) -> bool {
        let Some(key) = self.queue.get() else {
            return false;
        };
        let result = rt.block_on(self.reconcile(&key));
        self.handle_result(&key, result);
        self.queue.done(&key);
        true
    }

    /// Record the number of workers draining the queue.
    pub(crate) fn set_worker_count(&self, worker_count: usize) {
        self.worker_count.store(worker_count, Ordering::Relaxed);
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> ReconcilerStats {
        self.counters
            .snapshot(self.worker_count.load(Ordering::Relaxed), self.queue.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::events::InMemoryTransitionSink;
    use crate::core::model::{ObjectMeta, DEFAULT_GROUP_LABEL};
    use crate::core::phase::{MemberPhase, PhaseRule};
    use crate::infra::store::InMemoryStore;
    use crate::util::clock::ManualClock;
    use std::time::Duration;

    const NOW_MS: u128 = 1_000 * 3_600_000;

    struct Fixture {
        store: Arc<InMemoryStore>,
        reconciler: Reconciler<InMemoryStore>,
    }

    fn fixture(config: &ControllerConfig) -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let index = Arc::new(MemberIndex::new(DEFAULT_GROUP_LABEL));
        let staleness = StalenessFilter::with_clock(
            config.stale_threshold(),
            Arc::new(ManualClock::new(NOW_MS)),
        );
        let reconciler = Reconciler::new(Arc::clone(&store), index, staleness, config);
        Fixture { store, reconciler }
    }

    fn config() -> ControllerConfig {
        ControllerConfig::new()
            .with_worker_count(1)
            .with_backoff(Duration::from_millis(1), Duration::from_millis(4))
    }

    impl Fixture {
        fn group(
            &self,
            name: &str,
            min: u32,
            phase: Phase,
            scheduled: u32,
            created_ms: u128,
        ) -> GroupKey {
            self.store
                .create_group(
                    Group::new(ObjectMeta::new("default", name, created_ms), min)
                        .with_phase(phase)
                        .with_scheduled_count(scheduled),
                )
                .unwrap()
                .key()
        }

        fn members(&self, group: &str, phases: &[MemberPhase]) {
            for (i, phase) in phases.iter().enumerate() {
                let m = self.store.put_member(Member::new(
                    ObjectMeta::new("default", format!("{group}-pod{i}"), NOW_MS),
                    DEFAULT_GROUP_LABEL,
                    group,
                    *phase,
                ));
                self.reconciler.handle_member_event(&WatchEvent::Added(m));
            }
        }

        fn phase(&self, key: &GroupKey) -> Phase {
            self.store.group(key).unwrap().status.phase
        }
    }

    #[tokio::test]
    async fn test_running_members_update_phase() {
        let f = fixture(&config());
        let key = f.group("pg1", 2, Phase::Scheduled, 2, NOW_MS);
        f.members("pg1", &[MemberPhase::Running, MemberPhase::Running]);

        let outcome = f.reconciler.reconcile(&key).await.unwrap();
        assert_eq!(
            outcome,
            ReconcileOutcome::Updated {
                from: Phase::Scheduled,
                to: Phase::Running
            }
        );
        assert_eq!(f.phase(&key), Phase::Running);
    }

    #[tokio::test]
    async fn test_second_pass_is_noop() {
        let f = fixture(&config());
        let key = f.group("pg1", 2, Phase::Scheduled, 2, NOW_MS);
        f.members("pg1", &[MemberPhase::Running, MemberPhase::Running]);

        f.reconciler.reconcile(&key).await.unwrap();
        let writes = f.store.update_calls();
        let outcome = f.reconciler.reconcile(&key).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Unchanged(Phase::Running));
        assert_eq!(f.store.update_calls(), writes);
    }

    #[tokio::test]
    async fn test_stale_group_is_not_written() {
        let f = fixture(&config());
        let key = f.group("pg8", 2, Phase::Pending, 2, NOW_MS - 72 * 3_600_000);
        f.members("pg8", &[MemberPhase::Running, MemberPhase::Running]);

        let outcome = f.reconciler.reconcile(&key).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Stale);
        assert_eq!(f.phase(&key), Phase::Pending);
        assert_eq!(f.store.update_calls(), 0);
        assert_eq!(f.reconciler.stats().stale_skips, 1);
    }

    #[tokio::test]
    async fn test_missing_group_is_dropped() {
        let f = fixture(&config());
        let key = GroupKey::new("default", "ghost");
        assert_eq!(f.reconciler.reconcile(&key).await.unwrap(), ReconcileOutcome::NotFound);

        f.reconciler.handle_result(&key, Ok(ReconcileOutcome::NotFound));
        assert_eq!(f.reconciler.queue().num_requeues(&key), 0);
        assert_eq!(f.reconciler.stats().not_found, 1);
    }

    #[tokio::test]
    async fn test_transition_is_recorded() {
        let sink = Arc::new(Mutex::new(InMemoryTransitionSink::new(16)));
        let cfg = config();
        let mut f = fixture(&cfg);
        f.reconciler = f.reconciler.with_transition_sink(sink.clone());
        let key = f.group("pg9", 3, Phase::Pending, 0, NOW_MS);
        f.members("pg9", &[MemberPhase::Pending, MemberPhase::Pending]);

        f.reconciler.reconcile(&key).await.unwrap();
        let events = sink.lock().events_for(&key);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].from, Phase::Pending);
        assert_eq!(events[0].to, Phase::PreScheduling);
        assert_eq!(events[0].rule, PhaseRule::InsufficientMembers);
    }

    #[tokio::test]
    async fn test_conflicts_are_counted() {
        let f = fixture(&config());
        let key = f.group("pg1", 2, Phase::Scheduled, 2, NOW_MS);
        f.members("pg1", &[MemberPhase::Running, MemberPhase::Running]);
        f.store.inject_conflicts(2);

        f.reconciler.reconcile(&key).await.unwrap();
        assert_eq!(f.reconciler.stats().conflicts, 2);
        assert_eq!(f.phase(&key), Phase::Running);
    }

    #[test]
    fn test_retryable_error_requeues_until_limit() {
        let f = fixture(&config().with_max_retries(2));
        let key = GroupKey::new("default", "pg1");
        let err = || Err(ControllerError::StoreUnavailable("down".into()));

        f.reconciler.handle_result(&key, err());
        f.reconciler.handle_result(&key, err());
        assert_eq!(f.reconciler.queue().num_requeues(&key), 2);

        f.reconciler.handle_result(&key, err());
        let stats = f.reconciler.stats();
        assert_eq!(stats.requeued, 2);
        assert_eq!(stats.dropped, 1);
        assert_eq!(f.reconciler.queue().num_requeues(&key), 0);
    }

    #[test]
    fn test_permanent_error_is_dropped() {
        let f = fixture(&config());
        let key = GroupKey::new("default", "pg1");
        f.reconciler
            .handle_result(&key, Err(ControllerError::Internal("boom".into())));
        assert_eq!(f.reconciler.stats().dropped, 1);
        assert_eq!(f.reconciler.queue().delayed_len(), 0);
    }

    #[test]
    fn test_terminal_group_event_not_enqueued() {
        let f = fixture(&config());
        let done =
            Group::new(ObjectMeta::new("default", "pg1", NOW_MS), 2).with_phase(Phase::Finished);
        f.reconciler.handle_group_event(&WatchEvent::Modified(done.clone()));
        assert!(f.reconciler.queue().is_empty());

        f.reconciler.handle_group_event(&WatchEvent::Deleted(done));
        assert_eq!(f.reconciler.queue().len(), 1);
    }

    #[test]
    fn test_member_events_collapse_per_group() {
        let f = fixture(&config());
        f.members("pg1", &[MemberPhase::Pending, MemberPhase::Pending, MemberPhase::Running]);
        assert_eq!(f.reconciler.queue().len(), 1);
    }

    #[test]
    fn test_process_next_drains_queue() {
        let f = fixture(&config());
        let key = f.group("pg3", 2, Phase::Scheduled, 2, NOW_MS);
        f.members("pg3", &[MemberPhase::Succeeded, MemberPhase::Succeeded]);

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        assert!(f.reconciler.process_next(&rt));
        assert_eq!(f.phase(&key), Phase::Finished);

        f.reconciler.queue().shutdown();
        assert!(!f.reconciler.process_next(&rt));
    }
}
