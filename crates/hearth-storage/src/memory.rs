//! In-memory persistence engine.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tracing::trace;

use crate::engine::{DataStore, validate_key};
use crate::error::{StorageError, StorageResult};
use crate::watch::{ChangeCallback, ChangeNotifier, HostContext, WatchSubscription};

/// Map-backed [`DataStore`] for tests and ephemeral hosts.
///
/// Every save publishes a change for its key, so a writer that also watches
/// the key sees the echo of its own write. Loads and saves are counted.
#[derive(Debug, Default)]
pub struct MemoryDataStore {
    documents: std::sync::RwLock<HashMap<String, Value>>,
    notifier: ChangeNotifier,
    loads: AtomicU64,
    saves: AtomicU64,
}

impl MemoryDataStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `load_document` calls served.
    #[must_use]
    pub fn loads(&self) -> u64 {
        self.loads.load(Ordering::SeqCst)
    }

    /// Number of `save_document` calls served.
    #[must_use]
    pub fn saves(&self) -> u64 {
        self.saves.load(Ordering::SeqCst)
    }

    /// Replace a document as an outside writer would.
    ///
    /// Bypasses the save counter but still notifies watchers.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or the map lock is poisoned.
    pub fn write_external(&self, key: &str, document: Value) -> StorageResult<()> {
        validate_key(key)?;
        self.documents
            .write()
            .map_err(|e| StorageError::Internal(e.to_string()))?
            .insert(key.to_owned(), document);
        self.notifier.notify(key);
        Ok(())
    }

    /// Delete a document as an outside writer would. Returns whether it
    /// existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or the map lock is poisoned.
    pub fn remove_external(&self, key: &str) -> StorageResult<bool> {
        validate_key(key)?;
        let existed = self
            .documents
            .write()
            .map_err(|e| StorageError::Internal(e.to_string()))?
            .remove(key)
            .is_some();
        if existed {
            self.notifier.notify(key);
        }
        Ok(existed)
    }
}

#[async_trait]
impl DataStore for MemoryDataStore {
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        validate_key(key)?;
        let documents = self
            .documents
            .read()
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        Ok(documents.contains_key(key))
    }

    async fn load_document(&self, key: &str) -> StorageResult<Option<Value>> {
        validate_key(key)?;
        self.loads.fetch_add(1, Ordering::SeqCst);
        let documents = self
            .documents
            .read()
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        Ok(documents.get(key).filter(|doc| !doc.is_null()).cloned())
    }

    async fn save_document(&self, key: &str, document: &Value) -> StorageResult<()> {
        validate_key(key)?;
        {
            let mut documents = self
                .documents
                .write()
                .map_err(|e| StorageError::Internal(e.to_string()))?;
            documents.insert(key.to_owned(), document.clone());
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        trace!(key, "Document saved to memory");
        self.notifier.notify(key);
        Ok(())
    }

    fn add_change_watcher(
        &self,
        key: &str,
        context: &HostContext,
        on_changed: ChangeCallback,
    ) -> StorageResult<WatchSubscription> {
        validate_key(key)?;
        self.notifier.subscribe(key, context, on_changed)
    }
}
