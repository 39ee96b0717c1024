//! Object store boundary consumed by the controller.

use async_trait::async_trait;
use crossbeam_channel::Receiver;

use crate::core::model::{Group, GroupKey, LabelSelector, Member, ResourceVersion, WatchEvent};
use crate::core::ControllerError;

/// Get/list/update/watch access to groups and members.
///
/// `namespace = None` means every namespace. Implementations bump a group's
/// resource version on every successful update and reject an update whose
/// expected version is stale with [`ControllerError::Conflict`].
///
/// # Example
///
/// ```rust,ignore
/// use gang_controller::core::ObjectStore;
/// use gang_controller::infra::InMemoryStore;
///
/// let store = InMemoryStore::new();
/// let groups = store.list_groups(Some("default")).await?;
/// ```
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Fetch a group.
    async fn get_group(&self, key: &GroupKey) -> Result<Group, ControllerError>;

    /// List groups.
    async fn list_groups(&self, namespace: Option<&str>) -> Result<Vec<Group>, ControllerError>;

    /// List members matching `selector`.
    async fn list_members(
        &self,
        namespace: Option<&str>,
        selector: &LabelSelector,
    ) -> Result<Vec<Member>, ControllerError>;

    /// Conditionally replace a group; returns the stored copy with its new version.
    async fn update_group(
        &self,
        group: Group,
        expected_version: ResourceVersion,
    ) -> Result<Group, ControllerError>;

    /// Subscribe to group changes made after this call.
    fn watch_groups(
        &self,
        namespace: Option<&str>,
    ) -> Result<Receiver<WatchEvent<Group>>, ControllerError>;

    /// Subscribe to member changes made after this call.
    fn watch_members(
        &self,
        namespace: Option<&str>,
    ) -> Result<Receiver<WatchEvent<Member>>, ControllerError>;
}
