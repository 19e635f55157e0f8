//! The user data service contract.

use async_trait::async_trait;
use hearth_ioc::ServiceContract;

use crate::error::UserStoreResult;
use crate::record::UserData;
use crate::value::{DataValue, FromDataValue, IntoDataValue};

/// An in-place edit of one record. Returns whether anything changed.
pub type UserEdit = Box<dyn FnOnce(&mut UserData) -> bool + Send>;

/// Persistent per-actor records.
///
/// Identity is `(id, user_type)`, compared case-insensitively. Every
/// operation validates its string arguments before touching storage.
#[async_trait]
pub trait UserDataStore: Send + Sync {
    /// The record for `(user_id, user_type)`, if any.
    async fn get_user_data(&self, user_id: &str, user_type: &str)
    -> UserStoreResult<Option<UserData>>;

    /// The raw `data` field `key` of a record. `None` if the record or the
    /// field is absent.
    async fn get_user_value(
        &self,
        user_id: &str,
        user_type: &str,
        key: &str,
    ) -> UserStoreResult<Option<DataValue>>;

    /// Set the `data` field `key`, creating the record if needed.
    async fn set_user_value(
        &self,
        user_id: &str,
        user_type: &str,
        key: &str,
        value: DataValue,
    ) -> UserStoreResult<()>;

    /// Every record of `user_type`.
    async fn get_users_data(&self, user_type: &str) -> UserStoreResult<Vec<UserData>>;

    /// Insert or replace a whole record, keeping its position.
    async fn set_user_data(&self, record: UserData) -> UserStoreResult<()>;

    /// Apply `edit` to an existing record atomically. Nothing is written
    /// when the edit reports no change.
    ///
    /// # Errors
    ///
    /// [`UserStoreError::UserNotFound`](crate::UserStoreError::UserNotFound)
    /// if the record does not exist.
    async fn edit_user_data(
        &self,
        user_id: &str,
        user_type: &str,
        edit: UserEdit,
    ) -> UserStoreResult<bool>;
}

impl ServiceContract for dyn UserDataStore {
    const NAME: &'static str = "hearth.users.UserDataStore";
}

/// Typed field access for any [`UserDataStore`].
#[async_trait]
pub trait UserDataStoreExt: UserDataStore {
    /// Read field `key` as a `T`. Absent records, absent fields and
    /// [`DataValue::Null`] all read as `None`.
    ///
    /// # Errors
    ///
    /// Returns a conversion error if the stored value does not fit `T`.
    async fn get_field<T>(&self, user_id: &str, user_type: &str, key: &str) -> UserStoreResult<Option<T>>
    where
        T: FromDataValue + Send,
    {
        match self.get_user_value(user_id, user_type, key).await? {
            None | Some(DataValue::Null) => Ok(None),
            Some(value) => Ok(Some(T::from_data_value(&value)?)),
        }
    }

    /// Write field `key` from a `T`. The value is converted before any
    /// storage access.
    ///
    /// # Errors
    ///
    /// Returns a conversion error if `value` has no data representation, or
    /// the store's error if the write fails.
    async fn set_field<T>(&self, user_id: &str, user_type: &str, key: &str, value: T) -> UserStoreResult<()>
    where
        T: IntoDataValue + Send,
    {
        let value = value.into_data_value()?;
        self.set_user_value(user_id, user_type, key, value).await
    }
}

impl<S: UserDataStore + ?Sized> UserDataStoreExt for S {}
