//! Persistence engine contract.
//!
//! A [`DataStore`] holds structured documents addressed by string keys and
//! publishes a notification whenever a key changes, whether the change came
//! from this process or from outside it. Documents travel as
//! [`serde_json::Value`]; the on-disk format is the engine's business.
//!
//! Typed access goes through [`DataStoreExt::load`] / [`DataStoreExt::save`].

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{StorageError, StorageResult};
use crate::watch::{ChangeCallback, HostContext, WatchSubscription};

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate that a key is safe to use as a document address.
///
/// Keys must be non-empty, must not contain the null byte and must not
/// contain path separators (file engines map keys to file names).
///
/// # Errors
///
/// Returns [`StorageError::InvalidKey`] describing the first violation.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("key must not be empty".into()));
    }
    if key.contains('\0') {
        return Err(StorageError::InvalidKey(
            "key must not contain null bytes".into(),
        ));
    }
    if key.contains(['/', '\\']) {
        return Err(StorageError::InvalidKey(format!(
            "key '{key}' must not contain path separators"
        )));
    }
    if key == "." || key == ".." {
        return Err(StorageError::InvalidKey(format!(
            "key '{key}' is reserved"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// A keyed document store with change notification.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Whether a document is stored under `key`.
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Load the document stored under `key`.
    ///
    /// Returns `None` when the key is absent or holds no document.
    async fn load_document(&self, key: &str) -> StorageResult<Option<Value>>;

    /// Store `document` under `key`, replacing any previous document.
    async fn save_document(&self, key: &str, document: &Value) -> StorageResult<()>;

    /// Register `on_changed` to run every time `key` changes.
    ///
    /// The watch lives until the returned subscription is disposed or
    /// dropped, or until `context` shuts down.
    fn add_change_watcher(
        &self,
        key: &str,
        context: &HostContext,
        on_changed: ChangeCallback,
    ) -> StorageResult<WatchSubscription>;
}

/// Typed helpers over any [`DataStore`].
#[async_trait]
pub trait DataStoreExt: DataStore {
    /// Load and deserialize the document under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Serialization`] if the stored document does not
    /// fit `T`.
    async fn load<T>(&self, key: &str) -> StorageResult<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        let Some(document) = self.load_document(key).await? else {
            return Ok(None);
        };
        serde_json::from_value(document)
            .map(Some)
            .map_err(|e| StorageError::Serialization {
                key: key.to_owned(),
                message: e.to_string(),
            })
    }

    /// Serialize `value` and store it under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Serialization`] if `value` cannot be
    /// represented as a document.
    async fn save<T>(&self, key: &str, value: &T) -> StorageResult<()>
    where
        T: Serialize + Sync,
    {
        let document = serde_json::to_value(value).map_err(|e| StorageError::Serialization {
            key: key.to_owned(),
            message: e.to_string(),
        })?;
        self.save_document(key, &document).await
    }
}

#[async_trait]
impl<S: DataStore + ?Sized> DataStoreExt for S {}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;
    use crate::memory::MemoryDataStore;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Greeting {
        text: String,
        count: u32,
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key("users").is_ok());
        assert!(validate_key("users.backup").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("a\0b").is_err());
        assert!(validate_key("../etc").is_err());
        assert!(validate_key("a\\b").is_err());
        assert!(validate_key("..").is_err());
    }

    #[tokio::test]
    async fn test_typed_round_trip() {
        let store = MemoryDataStore::new();
        let value = Greeting {
            text: "hello".into(),
            count: 3,
        };
        store.save("greeting", &value).await.unwrap();

        let loaded: Option<Greeting> = store.load("greeting").await.unwrap();
        assert_eq!(loaded, Some(value));
    }

    #[tokio::test]
    async fn test_load_missing_is_none() {
        let store = MemoryDataStore::new();
        let loaded: Option<Greeting> = store.load("nothing").await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_load_wrong_shape_is_serialization_error() {
        let store = MemoryDataStore::new();
        store
            .save_document("greeting", &serde_json::json!({"text": 1}))
            .await
            .unwrap();
        let result: StorageResult<Option<Greeting>> = store.load("greeting").await;
        assert!(matches!(result, Err(StorageError::Serialization { .. })));
    }
}
