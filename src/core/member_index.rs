//! Per-group index of member phases, maintained from the member change feed.
//!
//! Members reference their group by label value, so the index never assumes
//! the group exists. Updates are last-write-wins by resource version: an event
//! older than what the index already holds for that member is dropped.

use std::collections::{BTreeMap, HashMap};

use parking_lot::RwLock;
use tracing::trace;

use crate::core::model::{GroupKey, Member, MemberKey, ResourceVersion, WatchEvent};
use crate::core::phase::{MemberPhase, PhaseHistogram};

#[derive(Debug, Clone)]
struct MemberEntry {
    group: GroupKey,
    phase: MemberPhase,
    resource_version: ResourceVersion,
}

#[derive(Debug, Default)]
struct IndexState {
    members: HashMap<MemberKey, MemberEntry>,
    groups: HashMap<GroupKey, BTreeMap<String, MemberPhase>>,
}

impl IndexState {
    fn detach(&mut self, group: &GroupKey, member: &str) {
        if let Some(members) = self.groups.get_mut(group) {
            members.remove(member);
            if members.is_empty() {
                self.groups.remove(group);
            }
        }
    }
}

/// Thread-safe many-to-one index from group key to member phases.
///
/// Readers (reconcile workers) and the feed writer share one `RwLock`; every
/// method holds it only for the duration of the call.
#[derive(Debug)]
pub struct MemberIndex {
    label_key: String,
    state: RwLock<IndexState>,
}

impl MemberIndex {
    /// Create an empty index keyed by `label_key`.
    pub fn new(label_key: impl Into<String>) -> Self {
        Self {
            label_key: label_key.into(),
            state: RwLock::new(IndexState::default()),
        }
    }

    /// Label naming a member's group.
    #[must_use]
    pub fn label_key(&self) -> &str {
        &self.label_key
    }

    /// Apply a watch event and return the groups it touched.
    pub fn apply(&self, event: &WatchEvent<Member>) -> Vec<GroupKey> {
        match event {
            WatchEvent::Added(member) | WatchEvent::Modified(member) => self.upsert(member),
            WatchEvent::Deleted(member) => self.remove(member),
        }
    }

    /// Record the latest state of a member.
    ///
    /// Returns the groups whose membership or member phases changed. A member
    /// whose label moved touches both its old and its new group. Only
    /// labelled members are held: an unlabelled member is ignored, and a
    /// member that loses its label is dropped from the index.
    pub fn upsert(&self, member: &Member) -> Vec<GroupKey> {
        let key = member.key();
        let group = member.group_key(&self.label_key);
        let mut state = self.state.write();

        let previous = state.members.get(&key).cloned();
        if let Some(prev) = &previous {
            if prev.resource_version >= member.meta.resource_version {
                trace!(
                    member = %key,
                    held = prev.resource_version,
                    incoming = member.meta.resource_version,
                    "ignoring stale member update"
                );
                return Vec::new();
            }
        }

        let mut touched = Vec::with_capacity(2);
        if let Some(prev) = previous {
            if group.as_ref() != Some(&prev.group) {
                state.detach(&prev.group, &key.name);
                touched.push(prev.group);
            }
        }

        let Some(group) = group else {
            if state.members.remove(&key).is_some() {
                trace!(member = %key, "member lost its group label");
            }
            return touched;
        };

        state
            .groups
            .entry(group.clone())
            .or_default()
            .insert(key.name.clone(), member.phase);
        touched.push(group.clone());

        state.members.insert(
            key,
            MemberEntry {
                group,
                phase: member.phase,
                resource_version: member.meta.resource_version,
            },
        );
        touched
    }

    /// Forget a member. Returns its group if it was indexed.
    pub fn remove(&self, member: &Member) -> Vec<GroupKey> {
        let key = member.key();
        let mut state = self.state.write();

        let Some(prev) = state.members.get(&key) else {
            return Vec::new();
        };
        if prev.resource_version > member.meta.resource_version {
            return Vec::new();
        }

        let Some(prev) = state.members.remove(&key) else {
            return Vec::new();
        };
        state.detach(&prev.group, &key.name);
        vec![prev.group]
    }

    /// Members of a group and their phases, ordered by name.
    #[must_use]
    pub fn members_of(&self, group: &GroupKey) -> Vec<(String, MemberPhase)> {
        self.state
            .read()
            .groups
            .get(group)
            .map(|members| members.iter().map(|(n, p)| (n.clone(), *p)).collect())
            .unwrap_or_default()
    }

    /// Phase histogram for a group; empty if no members are known.
    #[must_use]
    pub fn histogram(&self, group: &GroupKey) -> PhaseHistogram {
        self.state
            .read()
            .groups
            .get(group)
            .map(|members| members.values().copied().collect())
            .unwrap_or_default()
    }

    /// Number of indexed members; every one carries a group label.
    #[must_use]
    pub fn member_count(&self) -> usize {
        self.state.read().members.len()
    }

    /// Number of groups with at least one member.
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.state.read().groups.len()
    }

    /// Current phase of a member, if indexed.
    #[must_use]
    pub fn phase_of(&self, member: &MemberKey) -> Option<MemberPhase> {
        self.state.read().members.get(member).map(|e| e.phase)
    }
}
