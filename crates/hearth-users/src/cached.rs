//! [`UserDataStore`] backed by a cached users document.

use std::sync::Arc;

use async_trait::async_trait;
use hearth_ioc::{
    Marker, ServiceImplementation, ServiceLifetime, TypeDefinition, TypeLoadError,
    TypeRegistration, priority,
};
use hearth_storage::{CachedDocument, DataStore, HostContext};
use tracing::debug;

use crate::error::{UserStoreError, UserStoreResult, require};
use crate::record::{USERS_KEY, UserData, UsersData};
use crate::store::{UserDataStore, UserEdit};
use crate::value::DataValue;

/// Module name under which this crate registers its services.
pub const MODULE_NAME: &str = "hearth-users";

/// The default user store: every record lives in one [`UsersData`]
/// document, kept in memory and mirrored to a [`DataStore`].
///
/// Registered as the lowest-priority [`UserDataStore`] so that a module can
/// replace it.
#[derive(Debug, Clone)]
pub struct CachedUserDataStore {
    document: CachedDocument<UsersData>,
}

impl CachedUserDataStore {
    /// Fully-qualified type name used in the service registry.
    pub const TYPE_NAME: &'static str = "hearth.users.CachedUserDataStore";

    /// A store over the [`USERS_KEY`] document of `engine`.
    #[must_use]
    pub fn new(engine: Arc<dyn DataStore>, context: HostContext) -> Self {
        Self::with_key(engine, USERS_KEY, context)
    }

    /// A store over an arbitrary document key.
    #[must_use]
    pub fn with_key(engine: Arc<dyn DataStore>, key: impl Into<String>, context: HostContext) -> Self {
        Self {
            document: CachedDocument::new(engine, key, context),
        }
    }

    /// Seed, load and start watching the document.
    ///
    /// # Errors
    ///
    /// Returns the cache error if the document cannot be seeded, loaded or
    /// watched.
    pub async fn initialize(&self) -> UserStoreResult<()> {
        Ok(self.document.initialize().await?)
    }

    /// Stop watching and flush the document.
    ///
    /// # Errors
    ///
    /// Returns the cache error if the store was never initialized, was
    /// already disposed, or the final save fails.
    pub async fn dispose(&self) -> UserStoreResult<()> {
        Ok(self.document.dispose().await?)
    }

    /// The underlying cached document.
    #[must_use]
    pub fn document(&self) -> &CachedDocument<UsersData> {
        &self.document
    }
}

#[async_trait]
impl UserDataStore for CachedUserDataStore {
    async fn get_user_data(&self, user_id: &str, user_type: &str) -> UserStoreResult<Option<UserData>> {
        require("user_id", user_id)?;
        require("user_type", user_type)?;
        Ok(self
            .document
            .read(|users| users.find(user_id, user_type).cloned())
            .await?)
    }

    async fn get_user_value(
        &self,
        user_id: &str,
        user_type: &str,
        key: &str,
    ) -> UserStoreResult<Option<DataValue>> {
        require("user_id", user_id)?;
        require("user_type", user_type)?;
        require("key", key)?;
        Ok(self
            .document
            .read(|users| {
                users
                    .find(user_id, user_type)
                    .and_then(|u| u.data.get(key).cloned())
            })
            .await?)
    }

    async fn set_user_value(
        &self,
        user_id: &str,
        user_type: &str,
        key: &str,
        value: DataValue,
    ) -> UserStoreResult<()> {
        require("user_id", user_id)?;
        require("user_type", user_type)?;
        require("key", key)?;
        self.document
            .update(|users| {
                let mut record = users
                    .find(user_id, user_type)
                    .cloned()
                    .unwrap_or_else(|| UserData::first_seen_now(user_id, user_type));
                record.data.insert(key.to_owned(), value);
                users.upsert(record);
                Ok::<_, UserStoreError>(())
            })
            .await?;
        debug!(user_id, user_type, key, "User field set");
        Ok(())
    }

    async fn get_users_data(&self, user_type: &str) -> UserStoreResult<Vec<UserData>> {
        require("user_type", user_type)?;
        Ok(self
            .document
            .read(|users| users.of_type(user_type).cloned().collect())
            .await?)
    }

    async fn set_user_data(&self, record: UserData) -> UserStoreResult<()> {
        require("user_id", &record.id)?;
        require("user_type", &record.user_type)?;
        let (id, user_type) = (record.id.clone(), record.user_type.clone());
        let index = self
            .document
            .update(|users| Ok::<_, UserStoreError>(users.upsert(record)))
            .await?;
        debug!(user_id = %id, user_type = %user_type, index, "User record saved");
        Ok(())
    }

    async fn edit_user_data(
        &self,
        user_id: &str,
        user_type: &str,
        edit: UserEdit,
    ) -> UserStoreResult<bool> {
        require("user_id", user_id)?;
        require("user_type", user_type)?;
        let changed = self
            .document
            .update_if_changed(|users| {
                let record =
                    users
                        .find_mut(user_id, user_type)
                        .ok_or_else(|| UserStoreError::UserNotFound {
                            id: user_id.to_owned(),
                            user_type: user_type.to_owned(),
                        })?;
                Ok::<_, UserStoreError>(edit(record).then_some(()))
            })
            .await?;
        Ok(changed.is_some())
    }
}

fn registration() -> Result<TypeDefinition, TypeLoadError> {
    Ok(TypeDefinition::concrete(CachedUserDataStore::TYPE_NAME)
        .with_marker(
            Marker::declared::<ServiceImplementation>()
                .with_priority(priority::LOWEST)
                .with_lifetime(ServiceLifetime::Singleton),
        )
        .implements::<dyn UserDataStore>())
}

hearth_ioc::inventory::submit! {
    TypeRegistration { module: MODULE_NAME, resolve: registration }
}
