//! Group and member resources as observed from the object store.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::phase::{MemberPhase, Phase};
use crate::core::ControllerError;

/// Label carrying the owning group's name on every member.
pub const DEFAULT_GROUP_LABEL: &str = "pod-group.scheduling.sigs.k8s.io";

/// Store-assigned version token used for conditional writes.
pub type ResourceVersion = u64;

/// Identity and bookkeeping shared by every stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    /// Namespace the object lives in.
    pub namespace: String,
    /// Name, unique within the namespace.
    pub name: String,
    /// Unique id assigned at creation.
    pub uid: Uuid,
    /// Version token; bumped by the store on every write.
    pub resource_version: ResourceVersion,
    /// Creation timestamp (ms since epoch).
    pub creation_time_ms: u128,
    /// Free-form labels.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl ObjectMeta {
    /// Fresh metadata; the store fills in the version on create.
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        creation_time_ms: u128,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            uid: Uuid::new_v4(),
            resource_version: 0,
            creation_time_ms,
            labels: BTreeMap::new(),
        }
    }

    /// Add a label.
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

/// `namespace/name` key identifying a group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupKey {
    /// Namespace.
    pub namespace: String,
    /// Group name.
    pub name: String,
}

impl GroupKey {
    /// Build a key.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Parse a `namespace/name` string.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` when either segment is missing or empty.
    pub fn parse(raw: &str) -> Result<Self, ControllerError> {
        match raw.split_once('/') {
            Some((ns, name)) if !ns.is_empty() && !name.is_empty() && !name.contains('/') => {
                Ok(Self::new(ns, name))
            }
            _ => Err(ControllerError::InvalidConfig(format!(
                "unexpected group key format: {raw:?}"
            ))),
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// `namespace/name` key identifying a member.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MemberKey {
    /// Namespace.
    pub namespace: String,
    /// Member name.
    pub name: String,
}

impl fmt::Display for MemberKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Desired shape of a group. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSpec {
    /// Members required for the group to be viable (>= 1).
    pub min_member: u32,
}

/// Observed state of a group.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GroupStatus {
    /// Lifecycle phase, written only by this controller.
    pub phase: Phase,
    /// Members confirmed bound by the placement subsystem.
    pub scheduled_count: u32,
}

/// Gang-scheduling coordination resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Object metadata.
    pub meta: ObjectMeta,
    /// Desired state.
    pub spec: GroupSpec,
    /// Status.
    #[serde(default)]
    pub status: GroupStatus,
}

impl Group {
    /// New group in `Pending` with nothing bound yet.
    pub fn new(meta: ObjectMeta, min_member: u32) -> Self {
        Self {
            meta,
            spec: GroupSpec { min_member },
            status: GroupStatus::default(),
        }
    }

    /// Set the recorded phase.
    #[must_use]
    pub const fn with_phase(mut self, phase: Phase) -> Self {
        self.status.phase = phase;
        self
    }

    /// Set the bound-member count.
    #[must_use]
    pub const fn with_scheduled_count(mut self, scheduled: u32) -> Self {
        self.status.scheduled_count = scheduled;
        self
    }

    /// Key of this group.
    #[must_use]
    pub fn key(&self) -> GroupKey {
        GroupKey::new(self.meta.namespace.clone(), self.meta.name.clone())
    }
}

/// A work unit referencing its group by label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Object metadata; the group label lives in `meta.labels`.
    pub meta: ObjectMeta,
    /// Phase reported by the execution subsystem.
    pub phase: MemberPhase,
}

impl Member {
    /// New member of `group` under the given label key.
    pub fn new(meta: ObjectMeta, label_key: &str, group: &str, phase: MemberPhase) -> Self {
        Self {
            meta: meta.with_label(label_key, group),
            phase,
        }
    }

    /// Key of this member.
    #[must_use]
    pub fn key(&self) -> MemberKey {
        MemberKey {
            namespace: self.meta.namespace.clone(),
            name: self.meta.name.clone(),
        }
    }

    /// Owning group as named by `label_key`, if labelled.
    #[must_use]
    pub fn group_key(&self, label_key: &str) -> Option<GroupKey> {
        self.meta
            .labels
            .get(label_key)
            .filter(|v| !v.is_empty())
            .map(|group| GroupKey::new(self.meta.namespace.clone(), group.clone()))
    }
}

/// Label query used for `list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LabelSelector {
    /// Everything.
    All,
    /// Objects carrying the label, any value.
    Exists(String),
    /// Objects carrying the label with exactly this value.
    Equals(String, String),
}

impl LabelSelector {
    /// Whether `labels` satisfy the selector.
    #[must_use]
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        match self {
            Self::All => true,
            Self::Exists(key) => labels.contains_key(key),
            Self::Equals(key, value) => labels.get(key) == Some(value),
        }
    }
}

/// Change notification delivered by a watch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent<T> {
    /// Object created.
    Added(T),
    /// Object updated.
    Modified(T),
    /// Object removed; carries the last known state.
    Deleted(T),
}

impl<T> WatchEvent<T> {
    /// The object carried by the event.
    pub const fn object(&self) -> &T {
        match self {
            Self::Added(obj) | Self::Modified(obj) | Self::Deleted(obj) => obj,
        }
    }

    /// Short event kind for logs.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Added(_) => "added",
            Self::Modified(_) => "modified",
            Self::Deleted(_) => "deleted",
        }
    }
}
