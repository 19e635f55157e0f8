//! Mock implementations for testing.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use hearth_storage::{
    ChangeCallback, DataStore, HostContext, MemoryDataStore, StorageError, StorageResult,
    WatchSubscription,
};
use serde_json::Value;

/// A [`MemoryDataStore`] whose loads and saves can be made to fail.
///
/// Failures are switched with [`fail_saves`](Self::fail_saves) and
/// [`fail_loads`](Self::fail_loads) and apply until switched off. Change
/// watching always works.
#[derive(Debug, Default)]
pub struct FailingDataStore {
    inner: MemoryDataStore,
    fail_saves: AtomicBool,
    fail_loads: AtomicBool,
    failures: AtomicU64,
}

impl FailingDataStore {
    /// Create a store that does not fail yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following save fail (or succeed again).
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Make every following load fail (or succeed again).
    pub fn fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    /// Number of injected failures so far.
    #[must_use]
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::SeqCst)
    }

    /// The wrapped store, for inspecting or editing documents directly.
    #[must_use]
    pub fn inner(&self) -> &MemoryDataStore {
        &self.inner
    }

    fn injected(&self, flag: &AtomicBool, operation: &str, key: &str) -> StorageResult<()> {
        if flag.load(Ordering::SeqCst) {
            self.failures.fetch_add(1, Ordering::SeqCst);
            return Err(StorageError::Internal(format!(
                "injected {operation} failure for '{key}'"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl DataStore for FailingDataStore {
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        self.injected(&self.fail_loads, "load", key)?;
        self.inner.exists(key).await
    }

    async fn load_document(&self, key: &str) -> StorageResult<Option<Value>> {
        self.injected(&self.fail_loads, "load", key)?;
        self.inner.load_document(key).await
    }

    async fn save_document(&self, key: &str, document: &Value) -> StorageResult<()> {
        self.injected(&self.fail_saves, "save", key)?;
        self.inner.save_document(key, document).await
    }

    fn add_change_watcher(
        &self,
        key: &str,
        context: &HostContext,
        on_changed: ChangeCallback,
    ) -> StorageResult<WatchSubscription> {
        self.inner.add_change_watcher(key, context, on_changed)
    }
}

/// Poll `check` every 10ms until it returns `true`. Returns `false` if that
/// does not happen within `timeout`.
pub async fn wait_for<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let poll = async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    };
    tokio::time::timeout(timeout, poll).await.is_ok()
}
