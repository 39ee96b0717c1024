//! Phase transition records.
//!
//! Every persisted phase change is handed to an optional sink. The in-memory
//! sink keeps a bounded ring for tests and debugging endpoints.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::core::model::GroupKey;
use crate::core::phase::{Phase, PhaseRule};
use crate::util::clock::now_ms;

/// A persisted phase change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionEvent {
    /// Group that changed.
    pub group: GroupKey,
    /// Phase before the write.
    pub from: Phase,
    /// Phase written.
    pub to: Phase,
    /// Calculator rule that produced `to`.
    pub rule: PhaseRule,
    /// Resource version after the write.
    pub resource_version: u64,
    /// Timestamp milliseconds.
    pub recorded_at_ms: u128,
}

impl TransitionEvent {
    /// Build an event stamped with the current time.
    #[must_use]
    pub fn new(
        group: GroupKey,
        from: Phase,
        to: Phase,
        rule: PhaseRule,
        resource_version: u64,
    ) -> Self {
        Self {
            group,
            from,
            to,
            rule,
            resource_version,
            recorded_at_ms: now_ms(),
        }
    }
}

/// Destination for transition records.
pub trait TransitionSink: Send {
    /// Record a transition.
    fn record(&mut self, event: TransitionEvent);
}

/// Bounded in-memory sink; the oldest record is evicted first.
#[derive(Debug)]
pub struct InMemoryTransitionSink {
    events: VecDeque<TransitionEvent>,
    max_events: usize,
}

impl InMemoryTransitionSink {
    /// Create a sink holding at most `max_events` records.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_events.min(1024)),
            max_events,
        }
    }

    /// Snapshot of stored records, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<TransitionEvent> {
        self.events.iter().cloned().collect()
    }

    /// Records for one group, oldest first.
    #[must_use]
    pub fn events_for(&self, group: &GroupKey) -> Vec<TransitionEvent> {
        self.events.iter().filter(|e| &e.group == group).cloned().collect()
    }
}

impl TransitionSink for InMemoryTransitionSink {
    fn record(&mut self, event: TransitionEvent) {
        if self.max_events == 0 {
            return;
        }
        if self.events.len() >= self.max_events {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }
}
