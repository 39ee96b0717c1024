//! Deduplicating work queue with per-key backoff.
//!
//! Semantics:
//!
//! - a key added any number of times before it is handed out is processed once
//! - a key is never handed to two workers at once; adding a key that is being
//!   processed marks it dirty and it is re-queued when the worker calls `done`
//! - failed keys are re-added after an exponential delay
//! - after `shutdown`, `get` returns `None` and new adds are ignored
//!
//! Workers block in [`WorkQueue::get`] on a `parking_lot::Condvar`; delayed
//! keys are promoted by whichever waiter wakes first.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};
use std::hash::Hash;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Exponential backoff: `base * 2^(failures - 1)`, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExponentialBackoff {
    /// Delay after the first failure.
    pub base: Duration,
    /// Upper bound on any delay.
    pub max: Duration,
}

impl ExponentialBackoff {
    /// Create a backoff policy.
    #[must_use]
    pub const fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// Delay before retry number `failures` (1-based).
    #[must_use]
    pub fn delay(&self, failures: u32) -> Duration {
        let exp = failures.saturating_sub(1).min(31);
        self.base
            .checked_mul(1u32 << exp)
            .map_or(self.max, |d| d.min(self.max))
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(5), Duration::from_secs(60))
    }
}

/// Key waiting for its retry delay to elapse.
struct Delayed<K> {
    ready_at: Instant,
    seq: u64,
    key: K,
}

impl<K> PartialEq for Delayed<K> {
    fn eq(&self, other: &Self) -> bool {
        self.ready_at == other.ready_at && self.seq == other.seq
    }
}

impl<K> Eq for Delayed<K> {}

impl<K> PartialOrd for Delayed<K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K> Ord for Delayed<K> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the max-heap pops the earliest deadline.
        other
            .ready_at
            .cmp(&self.ready_at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct QueueState<K> {
    queue: VecDeque<K>,
    dirty: HashSet<K>,
    processing: HashSet<K>,
    delayed: BinaryHeap<Delayed<K>>,
    failures: HashMap<K, u32>,
    next_seq: u64,
    shutting_down: bool,
}

impl<K: Clone + Eq + Hash> QueueState<K> {
    /// Returns true if the key became available for `get`.
    fn insert(&mut self, key: K) -> bool {
        if self.shutting_down || self.dirty.contains(&key) {
            return false;
        }
        self.dirty.insert(key.clone());
        if self.processing.contains(&key) {
            return false;
        }
        self.queue.push_back(key);
        true
    }

    fn promote_due(&mut self, now: Instant) {
        while self.delayed.peek().is_some_and(|d| d.ready_at <= now) {
            if let Some(item) = self.delayed.pop() {
                self.insert(item.key);
            }
        }
    }
}

/// Deduplicating, rate-limited work queue shared by reconcile workers.
pub struct WorkQueue<K> {
    state: Mutex<QueueState<K>>,
    ready: Condvar,
    backoff: ExponentialBackoff,
}

impl<K: Clone + Eq + Hash> WorkQueue<K> {
    /// Create an empty queue.
    #[must_use]
    pub fn new(backoff: ExponentialBackoff) -> Self {
        Self {
            state: Mutex::new(QueueState {
                queue: VecDeque::new(),
                dirty: HashSet::new(),
                processing: HashSet::new(),
                delayed: BinaryHeap::new(),
                failures: HashMap::new(),
                next_seq: 0,
                shutting_down: false,
            }),
            ready: Condvar::new(),
            backoff,
        }
    }

    /// Mark a key as needing processing.
    pub fn add(&self, key: K) {
        let queued = self.state.lock().insert(key);
        if queued {
            self.ready.notify_one();
        }
    }

    /// Add a key once `delay` has elapsed.
    pub fn add_after(&self, key: K, delay: Duration) {
        if delay.is_zero() {
            self.add(key);
            return;
        }
        {
            let mut state = self.state.lock();
            if state.shutting_down {
                return;
            }
            let seq = state.next_seq;
            state.next_seq += 1;
            state.delayed.push(Delayed {
                ready_at: Instant::now() + delay,
                seq,
                key,
            });
        }
        // Wake a waiter so it re-arms its timeout against the new deadline.
        self.ready.notify_one();
    }

    /// Record a failure for `key` and re-add it after the backoff delay.
    ///
    /// Returns the delay applied.
    pub fn add_rate_limited(&self, key: K) -> Duration {
        let failures = {
            let mut state = self.state.lock();
            let count = state.failures.entry(key.clone()).or_insert(0);
            *count += 1;
            *count
        };
        let delay = self.backoff.delay(failures);
        self.add_after(key, delay);
        delay
    }

    /// Clear the failure history of `key`.
    pub fn forget(&self, key: &K) {
        self.state.lock().failures.remove(key);
    }

    /// Failures recorded for `key` since the last `forget`.
    #[must_use]
    pub fn num_requeues(&self, key: &K) -> u32 {
        self.state.lock().failures.get(key).copied().unwrap_or(0)
    }

    /// Block until a key is available or the queue shuts down.
    ///
    /// The returned key is marked as processing until [`WorkQueue::done`].
    pub fn get(&self) -> Option<K> {
        let mut state = self.state.lock();
        loop {
            if state.shutting_down {
                return None;
            }
            state.promote_due(Instant::now());
            if let Some(key) = state.queue.pop_front() {
                state.dirty.remove(&key);
                state.processing.insert(key.clone());
                return Some(key);
            }
            match state.delayed.peek().map(|d| d.ready_at) {
                Some(deadline) => {
                    self.ready.wait_until(&mut state, deadline);
                }
                None => self.ready.wait(&mut state),
            }
        }
    }

    /// Finish processing `key`; re-queues it if it was added meanwhile.
    pub fn done(&self, key: &K) {
        let mut state = self.state.lock();
        state.processing.remove(key);
        if state.dirty.contains(key) && !state.shutting_down {
            state.queue.push_back(key.clone());
            drop(state);
            self.ready.notify_one();
        }
    }

    /// Stop handing out keys and wake every waiter.
    pub fn shutdown(&self) {
        self.state.lock().shutting_down = true;
        self.ready.notify_all();
    }

    /// Whether `shutdown` has been called.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.state.lock().shutting_down
    }

    /// Keys ready to be handed out.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// True when no key is ready.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys waiting on a retry delay.
    #[must_use]
    pub fn delayed_len(&self) -> usize {
        self.state.lock().delayed.len()
    }
}

impl<K: Clone + Eq + Hash> Default for WorkQueue<K> {
    fn default() -> Self {
        Self::new(ExponentialBackoff::default())
    }
}
