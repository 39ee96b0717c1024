//! Group lifecycle phases and the phase calculator.
//!
//! The calculator is a pure function of the group's declared minimum, its
//! bound-member count, its recorded phase and a histogram of member phases.
//! It never advances a group into `Scheduling`; that transition belongs to the
//! placement subsystem and arrives here as the recorded phase.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle phase of a group.
///
/// `Pending -> PreScheduling -> Scheduling -> Scheduled -> Running -> {Finished | Failed}`,
/// with `Unknown` as a non-advancing fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Phase {
    /// Created, nothing observed yet.
    #[default]
    Pending,
    /// Not enough members exist to attempt scheduling.
    PreScheduling,
    /// Placement attempt underway (set externally).
    Scheduling,
    /// At least `min_member` members confirmed bound.
    Scheduled,
    /// At least `min_member` members running.
    Running,
    /// Every member completed and none failed.
    Finished,
    /// Every member completed and at least one failed.
    Failed,
    /// Status could not be determined.
    Unknown,
}

impl Phase {
    /// Finished and Failed are absorbing.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Failed)
    }

    /// Name as persisted.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::PreScheduling => "PreScheduling",
            Self::Scheduling => "Scheduling",
            Self::Scheduled => "Scheduled",
            Self::Running => "Running",
            Self::Finished => "Finished",
            Self::Failed => "Failed",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Phase of an individual member, owned by the execution subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MemberPhase {
    /// Accepted but not started.
    #[default]
    Pending,
    /// Running.
    Running,
    /// Exited successfully.
    Succeeded,
    /// Exited with failure.
    Failed,
    /// State unobservable.
    Unknown,
}

impl fmt::Display for MemberPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// Member counts by phase. Counts always sum to [`PhaseHistogram::total`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PhaseHistogram {
    /// Members pending.
    pub pending: u32,
    /// Members running.
    pub running: u32,
    /// Members succeeded.
    pub succeeded: u32,
    /// Members failed.
    pub failed: u32,
    /// Members in unknown state.
    pub unknown: u32,
}

impl PhaseHistogram {
    /// Count one member.
    pub fn record(&mut self, phase: MemberPhase) {
        match phase {
            MemberPhase::Pending => self.pending += 1,
            MemberPhase::Running => self.running += 1,
            MemberPhase::Succeeded => self.succeeded += 1,
            MemberPhase::Failed => self.failed += 1,
            MemberPhase::Unknown => self.unknown += 1,
        }
    }

    /// Total observed members.
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.pending + self.running + self.succeeded + self.failed + self.unknown
    }

    /// Members that reached an exit state.
    #[must_use]
    pub const fn completed(&self) -> u32 {
        self.succeeded + self.failed
    }
}

impl FromIterator<MemberPhase> for PhaseHistogram {
    fn from_iter<I: IntoIterator<Item = MemberPhase>>(iter: I) -> Self {
        let mut histogram = Self::default();
        for phase in iter {
            histogram.record(phase);
        }
        histogram
    }
}

/// Consistent snapshot fed to the calculator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseInput {
    /// Phase currently recorded on the group.
    pub current: Phase,
    /// Declared minimum member count.
    pub min_member: u32,
    /// Members confirmed bound by placement.
    pub scheduled_count: u32,
    /// Member phases observed for the group.
    pub histogram: PhaseHistogram,
}

/// Which rule produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhaseRule {
    /// Recorded phase is terminal.
    Terminal,
    /// Fewer members exist than required.
    InsufficientMembers,
    /// All members exited.
    MembersCompleted,
    /// Enough members are running.
    MembersRunning,
    /// Placement confirmed enough bindings.
    BindingConfirmed,
    /// Nothing applied; recorded phase kept.
    Unchanged,
}

impl fmt::Display for PhaseRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Terminal => "terminal",
            Self::InsufficientMembers => "insufficient_members",
            Self::MembersCompleted => "members_completed",
            Self::MembersRunning => "members_running",
            Self::BindingConfirmed => "binding_confirmed",
            Self::Unchanged => "unchanged",
        };
        f.write_str(s)
    }
}

/// Calculator output with the rule that fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseDecision {
    /// Next phase.
    pub phase: Phase,
    /// Rule responsible.
    pub rule: PhaseRule,
}

impl PhaseDecision {
    const fn new(phase: Phase, rule: PhaseRule) -> Self {
        Self { phase, rule }
    }
}

/// Compute the next phase and the rule responsible.
///
/// Rules are checked in order; the first match wins:
///
/// 1. terminal recorded phase is returned unchanged
/// 2. fewer than `min_member` members observed yields `PreScheduling`
/// 3. every member exited yields `Failed` if any failed, else `Finished`
/// 4. at least `min_member` running yields `Running`
/// 5. `Scheduling` with `scheduled_count >= min_member` yields `Scheduled`
/// 6. otherwise the recorded phase is kept
///
/// `Unknown` members count toward membership but block rule 3.
#[must_use]
pub const fn evaluate_phase(input: &PhaseInput) -> PhaseDecision {
    if input.current.is_terminal() {
        return PhaseDecision::new(input.current, PhaseRule::Terminal);
    }

    let h = &input.histogram;
    let observed = h.total();
    if observed < input.min_member {
        return PhaseDecision::new(Phase::PreScheduling, PhaseRule::InsufficientMembers);
    }

    if observed > 0 && h.completed() == observed {
        let phase = if h.failed > 0 { Phase::Failed } else { Phase::Finished };
        return PhaseDecision::new(phase, PhaseRule::MembersCompleted);
    }

    if h.running >= input.min_member {
        return PhaseDecision::new(Phase::Running, PhaseRule::MembersRunning);
    }

    if matches!(input.current, Phase::Scheduling) && input.scheduled_count >= input.min_member {
        return PhaseDecision::new(Phase::Scheduled, PhaseRule::BindingConfirmed);
    }

    PhaseDecision::new(input.current, PhaseRule::Unchanged)
}

/// Compute the next phase.
#[must_use]
pub const fn calculate_phase(input: &PhaseInput) -> Phase {
    evaluate_phase(input).phase
}
