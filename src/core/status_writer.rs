//! Optimistic-concurrency writer for group phases.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::core::model::{Group, GroupKey};
use crate::core::phase::Phase;
use crate::core::store::ObjectStore;
use crate::core::ControllerError;

/// Result of a write attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Stored phase already matched; nothing written.
    Unchanged {
        /// Group as read.
        group: Group,
    },
    /// Phase written.
    Written {
        /// Phase before the write.
        previous: Phase,
        /// Group as stored after the write.
        group: Group,
    },
    /// Planner declined to compute a phase for this read.
    Skipped {
        /// Group as read.
        group: Group,
    },
}

/// Applies computed phases with version-checked updates.
///
/// On a version conflict the group is re-read and the phase recomputed from
/// the fresh copy; a blind overwrite never happens.
pub struct StatusWriter<S> {
    store: Arc<S>,
    max_conflict_retries: u32,
}

impl<S: ObjectStore> StatusWriter<S> {
    /// Create a writer retrying up to `max_conflict_retries` times on conflict.
    pub const fn new(store: Arc<S>, max_conflict_retries: u32) -> Self {
        Self {
            store,
            max_conflict_retries,
        }
    }

    /// Conflicts tolerated before giving up.
    pub const fn max_conflict_retries(&self) -> u32 {
        self.max_conflict_retries
    }

    /// Read `key`, compute its phase with `plan`, and persist it if it changed.
    ///
    /// `plan` returns `None` to leave the group untouched for this read. It
    /// may be invoked several times, once per conflict retry. Returns the
    /// number of conflicts seen alongside the outcome.
    ///
    /// # Errors
    ///
    /// `NotFound` if the group is gone, `Conflict` once retries are exhausted,
    /// and any store error otherwise.
    pub async fn write<F>(
        &self,
        key: &GroupKey,
        mut plan: F,
    ) -> Result<(WriteOutcome, u32), ControllerError>
    where
        F: FnMut(&Group) -> Option<Phase> + Send,
    {
        let mut conflicts = 0;
        loop {
            let group = self.store.get_group(key).await?;
            let Some(next) = plan(&group) else {
                return Ok((WriteOutcome::Skipped { group }, conflicts));
            };
            if next == group.status.phase {
                return Ok((WriteOutcome::Unchanged { group }, conflicts));
            }

            let previous = group.status.phase;
            let expected = group.meta.resource_version;
            let mut updated = group;
            updated.status.phase = next;

            match self.store.update_group(updated, expected).await {
                Ok(stored) => {
                    debug!(group = %key, from = %previous, to = %next, "group phase written");
                    return Ok((WriteOutcome::Written { previous, group: stored }, conflicts));
                }
                Err(err @ ControllerError::Conflict { .. }) => {
                    conflicts += 1;
                    if conflicts > self.max_conflict_retries {
                        warn!(group = %key, conflicts, "conflict retries exhausted");
                        return Err(err);
                    }
                    debug!(group = %key, conflicts, "status update conflicted, re-reading");
                }
                Err(err) => return Err(err),
            }
        }
    }
}
