//! Abandoned-group guard.

use std::sync::Arc;
use std::time::Duration;

use crate::core::model::Group;
use crate::util::clock::{Clock, SystemClock};

/// Decides whether a group is too old to keep reconciling.
///
/// A stale group is left exactly as observed: no recompute, no write, no
/// timer-driven retry.
#[derive(Clone)]
pub struct StalenessFilter {
    threshold: Duration,
    clock: Arc<dyn Clock>,
}

impl StalenessFilter {
    /// Filter using the system clock.
    #[must_use]
    pub fn new(threshold: Duration) -> Self {
        Self::with_clock(threshold, Arc::new(SystemClock))
    }

    /// Filter using a caller-supplied clock.
    #[must_use]
    pub fn with_clock(threshold: Duration, clock: Arc<dyn Clock>) -> Self {
        Self { threshold, clock }
    }

    /// Configured maximum age.
    #[must_use]
    pub const fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Age of the group in milliseconds; zero for future timestamps.
    #[must_use]
    pub fn age_ms(&self, group: &Group) -> u128 {
        self.clock.now_ms().saturating_sub(group.meta.creation_time_ms)
    }

    /// True when the group is non-terminal and older than the threshold.
    #[must_use]
    pub fn is_stale(&self, group: &Group) -> bool {
        !group.status.phase.is_terminal() && self.age_ms(group) > self.threshold.as_millis()
    }
}

impl std::fmt::Debug for StalenessFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StalenessFilter")
            .field("threshold", &self.threshold)
            .finish_non_exhaustive()
    }
}
