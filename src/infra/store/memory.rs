//! In-process object store with watch fan-out and fault injection.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use async_trait::async_trait;
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::core::model::{
    Group, GroupKey, LabelSelector, Member, MemberKey, ResourceVersion, WatchEvent,
};
use crate::core::phase::MemberPhase;
use crate::core::store::ObjectStore;
use crate::core::ControllerError;

struct Watcher<T> {
    namespace: Option<String>,
    tx: Sender<WatchEvent<T>>,
}

struct Watchers<T> {
    subscribers: Mutex<Vec<Watcher<T>>>,
}

impl<T: Clone> Watchers<T> {
    fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    fn subscribe(&self, namespace: Option<&str>) -> Receiver<WatchEvent<T>> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().push(Watcher {
            namespace: namespace.map(str::to_owned),
            tx,
        });
        rx
    }

    /// Deliver to matching subscribers, dropping those that hung up.
    fn publish(&self, namespace: &str, event: &WatchEvent<T>) {
        self.subscribers.lock().retain(|w| {
            if w.namespace.as_deref().is_some_and(|ns| ns != namespace) {
                return true;
            }
            w.tx.send(event.clone()).is_ok()
        });
    }
}

/// Thread-safe in-memory store.
///
/// Every write takes the next value of a store-wide version counter, so
/// resource versions are unique and increase across all objects. Watch
/// events are published while the object map lock is held, giving each
/// subscriber the same order as the writes.
pub struct InMemoryStore {
    groups: RwLock<BTreeMap<GroupKey, Group>>,
    members: RwLock<BTreeMap<MemberKey, Member>>,
    version: AtomicU64,
    group_watchers: Watchers<Group>,
    member_watchers: Watchers<Member>,
    pending_conflicts: AtomicU32,
    pending_unavailable: AtomicU32,
    update_calls: AtomicU64,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            groups: RwLock::new(BTreeMap::new()),
            members: RwLock::new(BTreeMap::new()),
            version: AtomicU64::new(0),
            group_watchers: Watchers::new(),
            member_watchers: Watchers::new(),
            pending_conflicts: AtomicU32::new(0),
            pending_unavailable: AtomicU32::new(0),
            update_calls: AtomicU64::new(0),
        }
    }

    fn next_version(&self) -> ResourceVersion {
        self.version.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Take one unit from a fault counter if any remain.
    fn take_fault(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Make the next `n` calls to `update_group` fail with a conflict.
    pub fn inject_conflicts(&self, n: u32) {
        self.pending_conflicts.store(n, Ordering::Release);
    }

    /// Make the next `n` store calls used by reconciliation fail as unavailable.
    pub fn inject_unavailable(&self, n: u32) {
        self.pending_unavailable.store(n, Ordering::Release);
    }

    /// Number of `update_group` calls received, successful or not.
    #[must_use]
    pub fn update_calls(&self) -> u64 {
        self.update_calls.load(Ordering::Acquire)
    }

    fn check_available(&self) -> Result<(), ControllerError> {
        if Self::take_fault(&self.pending_unavailable) {
            return Err(ControllerError::StoreUnavailable("injected fault".into()));
        }
        Ok(())
    }

    /// Create a group; fails if it already exists.
    ///
    /// # Errors
    ///
    /// `Internal` when the key is taken.
    pub fn create_group(&self, mut group: Group) -> Result<Group, ControllerError> {
        let key = group.key();
        let mut groups = self.groups.write();
        if groups.contains_key(&key) {
            return Err(ControllerError::Internal(format!("group {key} already exists")));
        }
        group.meta.resource_version = self.next_version();
        groups.insert(key.clone(), group.clone());
        self.group_watchers
            .publish(&key.namespace, &WatchEvent::Added(group.clone()));
        debug!(group = %key, "group created");
        Ok(group)
    }

    /// Replace a group unconditionally (acts as an external writer such as
    /// the placement subsystem).
    ///
    /// # Errors
    ///
    /// `NotFound` if the group does not exist.
    pub fn put_group(&self, mut group: Group) -> Result<Group, ControllerError> {
        let key = group.key();
        let mut groups = self.groups.write();
        if !groups.contains_key(&key) {
            return Err(ControllerError::NotFound(key.to_string()));
        }
        group.meta.resource_version = self.next_version();
        groups.insert(key.clone(), group.clone());
        self.group_watchers
            .publish(&key.namespace, &WatchEvent::Modified(group.clone()));
        Ok(group)
    }

    /// Delete a group.
    ///
    /// # Errors
    ///
    /// `NotFound` if the group does not exist.
    pub fn delete_group(&self, key: &GroupKey) -> Result<(), ControllerError> {
        let mut groups = self.groups.write();
        let mut group = groups
            .remove(key)
            .ok_or_else(|| ControllerError::NotFound(key.to_string()))?;
        group.meta.resource_version = self.next_version();
        self.group_watchers
            .publish(&key.namespace, &WatchEvent::Deleted(group));
        Ok(())
    }

    /// Read a group without fault injection.
    #[must_use]
    pub fn group(&self, key: &GroupKey) -> Option<Group> {
        self.groups.read().get(key).cloned()
    }

    /// Create or replace a member.
    pub fn put_member(&self, mut member: Member) -> Member {
        let key = member.key();
        let mut members = self.members.write();
        member.meta.resource_version = self.next_version();
        let event = if members.contains_key(&key) {
            WatchEvent::Modified(member.clone())
        } else {
            WatchEvent::Added(member.clone())
        };
        members.insert(key.clone(), member.clone());
        self.member_watchers.publish(&key.namespace, &event);
        member
    }

    /// Change a member's phase.
    ///
    /// # Errors
    ///
    /// `NotFound` if the member does not exist.
    pub fn set_member_phase(
        &self,
        key: &MemberKey,
        phase: MemberPhase,
    ) -> Result<Member, ControllerError> {
        let mut members = self.members.write();
        let member = members
            .get_mut(key)
            .ok_or_else(|| ControllerError::NotFound(key.to_string()))?;
        member.phase = phase;
        member.meta.resource_version = self.next_version();
        let updated = member.clone();
        self.member_watchers
            .publish(&key.namespace, &WatchEvent::Modified(updated.clone()));
        Ok(updated)
    }

    /// Delete a member.
    ///
    /// # Errors
    ///
    /// `NotFound` if the member does not exist.
    pub fn delete_member(&self, key: &MemberKey) -> Result<(), ControllerError> {
        let mut members = self.members.write();
        let mut member = members
            .remove(key)
            .ok_or_else(|| ControllerError::NotFound(key.to_string()))?;
        member.meta.resource_version = self.next_version();
        self.member_watchers
            .publish(&key.namespace, &WatchEvent::Deleted(member));
        Ok(())
    }
}

fn in_namespace(filter: Option<&str>, namespace: &str) -> bool {
    filter.is_none_or(|ns| ns == namespace)
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn get_group(&self, key: &GroupKey) -> Result<Group, ControllerError> {
        self.check_available()?;
        self.group(key)
            .ok_or_else(|| ControllerError::NotFound(key.to_string()))
    }

    async fn list_groups(&self, namespace: Option<&str>) -> Result<Vec<Group>, ControllerError> {
        Ok(self
            .groups
            .read()
            .values()
            .filter(|g| in_namespace(namespace, &g.meta.namespace))
            .cloned()
            .collect())
    }

    async fn list_members(
        &self,
        namespace: Option<&str>,
        selector: &LabelSelector,
    ) -> Result<Vec<Member>, ControllerError> {
        Ok(self
            .members
            .read()
            .values()
            .filter(|m| {
                in_namespace(namespace, &m.meta.namespace) && selector.matches(&m.meta.labels)
            })
            .cloned()
            .collect())
    }

    async fn update_group(
        &self,
        mut group: Group,
        expected_version: ResourceVersion,
    ) -> Result<Group, ControllerError> {
        self.update_calls.fetch_add(1, Ordering::AcqRel);
        self.check_available()?;

        let key = group.key();
        let mut groups = self.groups.write();
        let current = groups
            .get(&key)
            .ok_or_else(|| ControllerError::NotFound(key.to_string()))?;
        let actual = current.meta.resource_version;

        if Self::take_fault(&self.pending_conflicts) || actual != expected_version {
            return Err(ControllerError::Conflict {
                key: key.to_string(),
                expected: expected_version,
                actual,
            });
        }

        group.meta.resource_version = self.next_version();
        groups.insert(key.clone(), group.clone());
        self.group_watchers
            .publish(&key.namespace, &WatchEvent::Modified(group.clone()));
        Ok(group)
    }

    fn watch_groups(
        &self,
        namespace: Option<&str>,
    ) -> Result<Receiver<WatchEvent<Group>>, ControllerError> {
        Ok(self.group_watchers.subscribe(namespace))
    }

    fn watch_members(
        &self,
        namespace: Option<&str>,
    ) -> Result<Receiver<WatchEvent<Member>>, ControllerError> {
        Ok(self.member_watchers.subscribe(namespace))
    }
}
