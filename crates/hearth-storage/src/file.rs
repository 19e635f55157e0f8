//! File-backed persistence engine with filesystem change detection.
//!
//! Each key maps to `<directory>/<key>.yaml`. When watching is enabled a
//! `notify` watcher feeds a background loop:
//!
//! ```text
//! filesystem events (notify)
//!   → map file name to key (hidden and non-yaml files ignored)
//!   → debounce per key
//!   → blake3 hash of the file content
//!   → compare to the last known hash
//!   → ChangeNotifier::notify(key)
//! ```
//!
//! Saves made through this engine notify immediately and record their hash,
//! so the filesystem event for the same content is not published twice.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::engine::{DataStore, validate_key};
use crate::error::{StorageError, StorageResult};
use crate::watch::{ChangeCallback, ChangeNotifier, HostContext, WatchSubscription};

/// Default debounce interval for file change events.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Extension of document files.
pub const DOCUMENT_EXTENSION: &str = "yaml";

/// Hash recorded for a key whose file does not exist.
const ABSENT_HASH: &str = "";

type HashCache = Arc<Mutex<HashMap<String, String>>>;

/// Configuration for a [`FileDataStore`].
#[derive(Debug, Clone)]
pub struct FileStoreConfig {
    /// Directory holding the document files. Created if missing.
    pub directory: PathBuf,
    /// Watch the directory for changes made by other processes.
    pub watch: bool,
    /// Debounce interval. File events within this window are coalesced.
    pub debounce: Duration,
}

impl FileStoreConfig {
    /// Watching configuration with the default debounce.
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            watch: true,
            debounce: DEFAULT_DEBOUNCE,
        }
    }

    /// Enable or disable filesystem watching.
    #[must_use]
    pub fn with_watch(mut self, watch: bool) -> Self {
        self.watch = watch;
        self
    }

    /// Set the debounce interval.
    #[must_use]
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }
}

/// [`DataStore`] storing one YAML file per key.
pub struct FileDataStore {
    directory: PathBuf,
    notifier: ChangeNotifier,
    hashes: HashCache,
    /// Kept alive for the store's lifetime; dropping it stops monitoring.
    watcher: Mutex<Option<RecommendedWatcher>>,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for FileDataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileDataStore")
            .field("directory", &self.directory)
            .finish_non_exhaustive()
    }
}

impl FileDataStore {
    /// Open a store rooted at `config.directory`.
    ///
    /// Watching requires a Tokio runtime; the watch loop runs until the store
    /// is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the filesystem
    /// watcher cannot be started.
    pub fn open(config: FileStoreConfig) -> StorageResult<Self> {
        std::fs::create_dir_all(&config.directory).map_err(|source| StorageError::Io {
            path: config.directory.display().to_string(),
            source,
        })?;

        let store = Self {
            directory: config.directory.clone(),
            notifier: ChangeNotifier::new(),
            hashes: Arc::new(Mutex::new(HashMap::new())),
            watcher: Mutex::new(None),
            shutdown: CancellationToken::new(),
        };

        if config.watch {
            store.start_watching(config.debounce)?;
        }
        Ok(store)
    }

    /// The directory holding the document files.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Path of the file backing `key`.
    #[must_use]
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.directory.join(format!("{key}.{DOCUMENT_EXTENSION}"))
    }

    /// Whether the filesystem watcher is running.
    #[must_use]
    pub fn is_watching(&self) -> bool {
        self.watcher.lock().is_ok_and(|w| w.is_some()) && !self.shutdown.is_cancelled()
    }

    fn start_watching(&self, debounce: Duration) -> StorageResult<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| StorageError::Watch(format!("no async runtime for file watcher: {e}")))?;

        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = raw_tx.send(res);
            },
            notify::Config::default(),
        )
        .map_err(|e| StorageError::Watch(format!("filesystem watcher: {e}")))?;
        watcher
            .watch(&self.directory, RecursiveMode::NonRecursive)
            .map_err(|e| {
                StorageError::Watch(format!(
                    "failed to watch {}: {e}",
                    self.directory.display()
                ))
            })?;

        let watch_loop = FileWatchLoop {
            directory: self.directory.clone(),
            debounce,
            notifier: self.notifier.clone(),
            hashes: Arc::clone(&self.hashes),
            raw_rx,
            shutdown: self.shutdown.clone(),
        };
        runtime.spawn(watch_loop.run());

        *self
            .watcher
            .lock()
            .map_err(|e| StorageError::Internal(e.to_string()))? = Some(watcher);
        info!(directory = %self.directory.display(), "Watching data directory");
        Ok(())
    }

    fn io_error(path: &Path, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: path.display().to_string(),
            source,
        }
    }

    fn record_hash(&self, key: &str, hash: String) {
        if let Ok(mut hashes) = self.hashes.lock() {
            hashes.insert(key.to_owned(), hash);
        }
    }
}

impl Drop for FileDataStore {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[async_trait]
impl DataStore for FileDataStore {
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        validate_key(key)?;
        let path = self.path_for(key);
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| Self::io_error(&path, e))
    }

    async fn load_document(&self, key: &str) -> StorageResult<Option<Value>> {
        validate_key(key)?;
        let path = self.path_for(key);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Self::io_error(&path, e)),
        };
        if content.trim().is_empty() {
            return Ok(None);
        }

        let document: Value =
            serde_yaml::from_str(&content).map_err(|e| StorageError::Serialization {
                key: key.to_owned(),
                message: e.to_string(),
            })?;
        trace!(key, path = %path.display(), "Document loaded from file");
        Ok(Some(document).filter(|doc| !doc.is_null()))
    }

    async fn save_document(&self, key: &str, document: &Value) -> StorageResult<()> {
        validate_key(key)?;
        let content = serde_yaml::to_string(document).map_err(|e| StorageError::Serialization {
            key: key.to_owned(),
            message: e.to_string(),
        })?;

        let path = self.path_for(key);
        let temp = self
            .directory
            .join(format!(".{key}.{DOCUMENT_EXTENSION}.tmp"));
        tokio::fs::write(&temp, content.as_bytes())
            .await
            .map_err(|e| Self::io_error(&temp, e))?;
        self.record_hash(key, content_hash(content.as_bytes()));
        tokio::fs::rename(&temp, &path)
            .await
            .map_err(|e| Self::io_error(&path, e))?;

        trace!(key, path = %path.display(), "Document saved to file");
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

// ---------------------------------------------------------------------------
// Watch loop
// ---------------------------------------------------------------------------

struct FileWatchLoop {
    directory: PathBuf,
    debounce: Duration,
    notifier: ChangeNotifier,
    hashes: HashCache,
    raw_rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
    shutdown: CancellationToken,
}

impl FileWatchLoop {
    async fn run(mut self) {
        let mut pending: HashMap<String, tokio::time::Instant> = HashMap::new();

        loop {
            let next_deadline = pending.values().copied().min();

            tokio::select! {
                biased;

                () = self.shutdown.cancelled() => break,

                () = async {
                    match next_deadline {
                        Some(deadline) => tokio::time::sleep_until(deadline).await,
                        None => std::future::pending::<()>().await,
                    }
                } => {
                    let now = tokio::time::Instant::now();
                    let ready: Vec<String> = pending
                        .iter()
                        .filter(|(_, deadline)| **deadline <= now)
                        .map(|(key, _)| key.clone())
                        .collect();

                    for key in ready {
                        pending.remove(&key);
                        self.process_key_change(&key).await;
                    }
                }

                event = self.raw_rx.recv() => {
                    match event {
                        Some(Ok(ev)) => self.handle_raw_event(&ev, &mut pending),
                        Some(Err(e)) => warn!(error = %e, "Filesystem watcher error"),
                        None => {
                            debug!("Filesystem watcher channel closed, stopping");
                            break;
                        }
                    }
                }
            }
        }
        debug!(directory = %self.directory.display(), "File watch loop stopped");
    }

    fn handle_raw_event(&self, event: &Event, pending: &mut HashMap<String, tokio::time::Instant>) {
        match event.kind {
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => {},
            _ => return,
        }

        for path in &event.paths {
            if let Some(key) = key_for_path(path) {
                trace!(key = %key, kind = ?event.kind, "File change detected");
                #[allow(clippy::arithmetic_side_effects)]
                // Instant + Duration cannot overflow in practice
                let deadline = tokio::time::Instant::now() + self.debounce;
                pending.insert(key, deadline);
            }
        }
    }

    async fn process_key_change(&self, key: &str) {
        let path = self
            .directory
            .join(format!("{key}.{DOCUMENT_EXTENSION}"));
        let new_hash = match tokio::fs::read(&path).await {
            Ok(content) => content_hash(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => ABSENT_HASH.to_owned(),
            Err(e) => {
                warn!(key, path = %path.display(), error = %e, "Failed to read changed document");
                return;
            },
        };

        {
            let Ok(mut hashes) = self.hashes.lock() else {
                warn!(key, "Hash cache poisoned, dropping change");
                return;
            };
            if hashes.get(key).is_some_and(|h| *h == new_hash) {
                debug!(key, "Document content unchanged, skipping notification");
                return;
            }
            hashes.insert(key.to_owned(), new_hash);
        }

        info!(key, "Document changed on disk");
        self.notifier.notify(key);
    }
}

/// Map a file path to its document key, ignoring hidden and foreign files.
fn key_for_path(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    if name.starts_with('.') {
        return None;
    }
    let key = name.strip_suffix(DOCUMENT_EXTENSION)?.strip_suffix('.')?;
    validate_key(key).ok()?;
    Some(key.to_owned())
}

fn content_hash(content: &[u8]) -> String {
    blake3::hash(content).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;
    use crate::watch::change_callback;

    fn counting_callback(counter: &Arc<AtomicUsize>) -> ChangeCallback {
        let counter = Arc::clone(counter);
        change_callback(move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        })
    }

    async fn wait_until(counter: &AtomicUsize, at_least: usize) -> bool {
        for _ in 0..100 {
            if counter.load(Ordering::SeqCst) >= at_least {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        false
    }

    #[test]
    fn test_key_for_path() {
        assert_eq!(
            key_for_path(Path::new("/data/users.yaml")).as_deref(),
            Some("users")
        );
        assert_eq!(key_for_path(Path::new("/data/.users.yaml.tmp")), None);
        assert_eq!(key_for_path(Path::new("/data/users.json")), None);
        assert_eq!(key_for_path(Path::new("/data/.yaml")), None);
    }

    #[tokio::test]
    async fn test_save_and_load_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDataStore::open(FileStoreConfig::new(dir.path()).with_watch(false)).unwrap();

        assert!(!store.exists("users").await.unwrap());
        let doc = json!({"users": [{"id": "root", "type": "rcon"}]});
        store.save_document("users", &doc).await.unwrap();

        assert!(store.path_for("users").exists());
        assert!(store.exists("users").await.unwrap());
        assert_eq!(store.load_document("users").await.unwrap(), Some(doc));

        let raw = std::fs::read_to_string(store.path_for("users")).unwrap();
        assert!(raw.contains("id: root"));
    }

    #[tokio::test]
    async fn test_missing_and_empty_files_load_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDataStore::open(FileStoreConfig::new(dir.path()).with_watch(false)).unwrap();

        assert!(store.load_document("users").await.unwrap().is_none());
        std::fs::write(store.path_for("users"), "   \n").unwrap();
        assert!(store.exists("users").await.unwrap());
        assert!(store.load_document("users").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDataStore::open(FileStoreConfig::new(dir.path()).with_watch(false)).unwrap();
        std::fs::write(store.path_for("users"), "users: [unclosed").unwrap();

        let result = store.load_document("users").await;
        assert!(matches!(result, Err(StorageError::Serialization { .. })));
    }

    #[tokio::test]
    async fn test_open_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let store = FileDataStore::open(FileStoreConfig::new(&nested).with_watch(false)).unwrap();
        assert!(nested.is_dir());
        assert!(!store.is_watching());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_own_save_notifies_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDataStore::open(
            FileStoreConfig::new(dir.path()).with_debounce(Duration::from_millis(50)),
        )
        .unwrap();
        assert!(store.is_watching());

        let context = HostContext::new("test");
        let fired = Arc::new(AtomicUsize::new(0));
        let _sub = store
            .add_change_watcher("users", &context, counting_callback(&fired))
            .unwrap();

        store.save_document("users", &json!({"n": 1})).await.unwrap();
        assert!(wait_until(&fired, 1).await);

        // The filesystem event for the same content must not publish again.
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_external_edit_detected_and_duplicate_content_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDataStore::open(
            FileStoreConfig::new(dir.path()).with_debounce(Duration::from_millis(50)),
        )
        .unwrap();
        let context = HostContext::new("test");
        let fired = Arc::new(AtomicUsize::new(0));
        let _sub = store
            .add_change_watcher("users", &context, counting_callback(&fired))
            .unwrap();

        std::fs::write(store.path_for("users"), "n: 2\n").unwrap();
        assert!(wait_until(&fired, 1).await, "external edit was not detected");
        let after_edit = fired.load(Ordering::SeqCst);

        std::fs::write(store.path_for("users"), "n: 2\n").unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(fired.load(Ordering::SeqCst), after_edit);

        assert_eq!(
            store.load_document("users").await.unwrap(),
            Some(json!({"n": 2}))
        );
    }
}
