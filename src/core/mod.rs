//! Core reconciliation abstractions: object model, phase rules, member
//! index, staleness, work queue and the reconciler itself.

pub mod error;
pub mod events;
pub mod member_index;
pub mod model;
pub mod phase;
pub mod reconciler;
pub mod staleness;
pub mod stats;
pub mod status_writer;
pub mod store;
pub mod work_queue;

pub use error::{AppResult, ControllerError};
pub use events::{InMemoryTransitionSink, TransitionEvent, TransitionSink};
pub use member_index::MemberIndex;
pub use model::{
    Group, GroupKey, GroupSpec, GroupStatus, LabelSelector, Member, MemberKey, ObjectMeta,
    ResourceVersion, WatchEvent, DEFAULT_GROUP_LABEL,
};
pub use phase::{
    calculate_phase, evaluate_phase, MemberPhase, Phase, PhaseDecision, PhaseHistogram, PhaseInput,
    PhaseRule,
};
pub use reconciler::{ReconcileOutcome, Reconciler, SharedTransitionSink};
pub use staleness::StalenessFilter;
pub use stats::ReconcilerStats;
pub use status_writer::{StatusWriter, WriteOutcome};
pub use store::ObjectStore;
pub use work_queue::{ExponentialBackoff, WorkQueue};
