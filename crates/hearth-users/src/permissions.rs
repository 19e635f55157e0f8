//! Permissions and roles stored on user records.

use std::collections::BTreeSet;
use std::sync::Arc;

use hearth_events::{EventBus, EventMetadata, HostEvent, PermissionType};
use tracing::info;

use crate::error::{UserStoreResult, require};
use crate::record::UserData;
use crate::store::UserDataStore;

const EVENT_SOURCE: &str = "hearth-users";

/// Grants, denies and roles of actors, kept in their user records.
///
/// A permission written with a leading `!` denies; anything else grants.
/// Permission changes are published on the [`EventBus`].
#[derive(Clone)]
pub struct PermissionStore {
    users: Arc<dyn UserDataStore>,
    events: EventBus,
}

impl std::fmt::Debug for PermissionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionStore").finish_non_exhaustive()
    }
}

impl PermissionStore {
    /// Create a permission store over `users`.
    #[must_use]
    pub fn new(users: Arc<dyn UserDataStore>, events: EventBus) -> Self {
        Self { users, events }
    }

    /// Permissions of an actor. Unknown actors have none.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the lookup fails.
    pub async fn get_permissions(&self, actor_id: &str, actor_type: &str) -> UserStoreResult<BTreeSet<String>> {
        Ok(self
            .users
            .get_user_data(actor_id, actor_type)
            .await?
            .map(|u| u.permissions)
            .unwrap_or_default())
    }

    /// Roles of an actor. Unknown actors have none.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the lookup fails.
    pub async fn get_roles(&self, actor_id: &str, actor_type: &str) -> UserStoreResult<BTreeSet<String>> {
        Ok(self
            .users
            .get_user_data(actor_id, actor_type)
            .await?
            .map(|u| u.roles)
            .unwrap_or_default())
    }

    /// Add `permission`. Returns `false` if the actor already had it.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidArgument` for an empty permission and
    /// `UserNotFound` for an unknown actor.
    pub async fn add_permission(&self, actor_id: &str, actor_type: &str, permission: &str) -> UserStoreResult<bool> {
        require("permission", permission)?;
        let owned = permission.to_owned();
        let added = self
            .edit(actor_id, actor_type, move |u| u.permissions.insert(owned))
            .await?;
        if added {
            info!(actor_id, actor_type, permission, "Permission added");
            self.events.publish(HostEvent::PermissionAdded {
                metadata: EventMetadata::new(EVENT_SOURCE),
                actor_id: actor_id.to_owned(),
                actor_type: actor_type.to_owned(),
                permission: permission.to_owned(),
                permission_type: PermissionType::of(permission),
            });
        }
        Ok(added)
    }

    /// Remove `permission`. Returns `false` if the actor did not have it.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidArgument` for an empty permission and
    /// `UserNotFound` for an unknown actor.
    pub async fn remove_permission(&self, actor_id: &str, actor_type: &str, permission: &str) -> UserStoreResult<bool> {
        require("permission", permission)?;
        let owned = permission.to_owned();
        let removed = self
            .edit(actor_id, actor_type, move |u| u.permissions.remove(&owned))
            .await?;
        if removed {
            info!(actor_id, actor_type, permission, "Permission removed");
            self.events.publish(HostEvent::PermissionRemoved {
                metadata: EventMetadata::new(EVENT_SOURCE),
                actor_id: actor_id.to_owned(),
                actor_type: actor_type.to_owned(),
                permission: permission.to_owned(),
                permission_type: PermissionType::of(permission),
            });
        }
        Ok(removed)
    }

    /// Add a role. Returns `false` if the actor already had it.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidArgument` for an empty role and `UserNotFound` for
    /// an unknown actor.
    pub async fn add_role(&self, actor_id: &str, actor_type: &str, role: &str) -> UserStoreResult<bool> {
        require("role", role)?;
        let owned = role.to_owned();
        self.edit(actor_id, actor_type, move |u| u.roles.insert(owned))
            .await
    }

    /// Remove a role. Returns `false` if the actor did not have it.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidArgument` for an empty role and `UserNotFound` for
    /// an unknown actor.
    pub async fn remove_role(&self, actor_id: &str, actor_type: &str, role: &str) -> UserStoreResult<bool> {
        require("role", role)?;
        let owned = role.to_owned();
        self.edit(actor_id, actor_type, move |u| u.roles.remove(&owned))
            .await
    }

    async fn edit<F>(&self, actor_id: &str, actor_type: &str, f: F) -> UserStoreResult<bool>
    where
        F: FnOnce(&mut UserData) -> bool + Send + 'static,
    {
        self.users
            .edit_user_data(actor_id, actor_type, Box::new(f))
            .await
    }
}

#[cfg(test)]
mod tests {
    use hearth_storage::{HostContext, MemoryDataStore};

    use super::*;
    use crate::cached::CachedUserDataStore;
    use crate::error::UserStoreError;

    async fn setup() -> (PermissionStore, EventBus) {
        let engine = Arc::new(MemoryDataStore::new());
        let users = CachedUserDataStore::new(engine, HostContext::new("test"));
        users.initialize().await.unwrap();
        users.set_user_data(UserData::new("alice", "player")).await.unwrap();
        let bus = EventBus::new();
        (PermissionStore::new(Arc::new(users), bus.clone()), bus)
    }

    #[tokio::test]
    async fn test_add_publishes_event() {
        let (store, bus) = setup().await;
        let mut rx = bus.subscribe();

        assert!(store.add_permission("alice", "player", "!kick").await.unwrap());
        let event = rx.recv().await.unwrap();
        match &*event {
            HostEvent::PermissionAdded {
                actor_id,
                permission,
                permission_type,
                ..
            } => {
                assert_eq!(actor_id, "alice");
                assert_eq!(permission, "!kick");
                assert_eq!(*permission_type, PermissionType::Deny);
            },
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(
            store
                .get_permissions("ALICE", "player")
                .await
                .unwrap()
                .contains("!kick")
        );
    }

    #[tokio::test]
    async fn test_duplicate_add_is_silent() {
        let (store, bus) = setup().await;
        assert!(store.add_permission("alice", "player", "chat").await.unwrap());
        let mut rx = bus.subscribe();

        assert!(!store.add_permission("alice", "player", "chat").await.unwrap());
        assert!(rx.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_remove_permission() {
        let (store, bus) = setup().await;
        store.add_permission("alice", "player", "chat").await.unwrap();
        let mut rx = bus.subscribe();

        assert!(store.remove_permission("alice", "player", "chat").await.unwrap());
        let event = rx.recv().await.unwrap();
        assert!(matches!(&*event, HostEvent::PermissionRemoved { .. }));
        assert!(!store.remove_permission("alice", "player", "chat").await.unwrap());
        assert!(rx.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_roles() {
        let (store, _bus) = setup().await;
        assert!(store.add_role("alice", "player", "vip").await.unwrap());
        assert!(!store.add_role("alice", "player", "vip").await.unwrap());
        assert_eq!(
            store.get_roles("alice", "player").await.unwrap().len(),
            1
        );
        assert!(store.remove_role("alice", "player", "vip").await.unwrap());
        assert!(store.get_roles("alice", "player").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_actor() {
        let (store, _bus) = setup().await;
        assert!(store.get_permissions("ghost", "player").await.unwrap().is_empty());
        let err = store
            .add_permission("ghost", "player", "chat")
            .await
            .unwrap_err();
        assert!(matches!(err, UserStoreError::UserNotFound { .. }));
        let err = store.add_role("alice", "player", "").await.unwrap_err();
        assert!(matches!(err, UserStoreError::InvalidArgument { name: "role", .. }));
    }
}
