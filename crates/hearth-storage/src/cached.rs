//! Cached, change-watched keyed document.
//!
//! [`CachedDocument`] keeps the authoritative in-memory copy of one document
//! and mirrors it to a [`DataStore`]:
//!
//! - **Initialization** is an explicit awaited phase. It seeds the document
//!   if the key is absent, registers a change watcher, then loads the
//!   existing document.
//! - **Reads** are served from the cache.
//! - **Updates** run on a clone of the cache. The clone is saved, and only a
//!   successful save replaces the cache, so a failed update leaves both the
//!   cache and the engine untouched.
//! - **Change notifications** reload the document, except for the echo of
//!   this store's own writes. Every save that will echo bumps a pending-echo
//!   counter and each echo consumes one, so back-to-back writes are all
//!   suppressed.
//! - **Disposal** releases the watcher and flushes the cache one last time.
//!
//! Every operation goes through one `tokio::sync::Mutex`, which is the
//! serialization point between callers and the change handler.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use crate::engine::{DataStore, DataStoreExt};
use crate::error::StorageError;
use crate::watch::{HostContext, WatchSubscription, change_callback};

/// A document type that can be cached.
pub trait Document: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// The value written the first time the key is found absent.
    fn seed() -> Self;
}

/// Errors from cached document operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The document was used before `initialize` completed.
    #[error("document '{key}' is not initialized")]
    NotInitialized {
        /// The document key.
        key: String,
    },

    /// `initialize` was called on a document that is already live.
    #[error("document '{key}' is already initialized")]
    AlreadyInitialized {
        /// The document key.
        key: String,
    },

    /// The document was used after disposal.
    #[error("document '{key}' has been disposed")]
    Disposed {
        /// The document key.
        key: String,
    },

    /// Internal state broke an invariant.
    #[error("invariant violated for document '{key}': {message}")]
    InvariantViolation {
        /// The document key.
        key: String,
        /// What was violated.
        message: String,
    },

    /// The persistence engine failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Result type for cached document operations.
pub type CacheResult<T> = Result<T, CacheError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Created,
    Ready,
    Disposed,
}

struct CacheState<D> {
    phase: Phase,
    document: Option<D>,
    /// Own saves whose change notification has not arrived yet.
    pending_echoes: u64,
    subscription: Option<WatchSubscription>,
}

impl<D> CacheState<D> {
    fn document(&self, key: &str) -> CacheResult<&D> {
        match self.phase {
            Phase::Created => Err(CacheError::NotInitialized { key: key.to_owned() }),
            Phase::Disposed => Err(CacheError::Disposed { key: key.to_owned() }),
            Phase::Ready => self
                .document
                .as_ref()
                .ok_or_else(|| CacheError::InvariantViolation {
                    key: key.to_owned(),
                    message: "live document has no cached value".into(),
                }),
        }
    }
}

struct Inner<D> {
    key: String,
    engine: Arc<dyn DataStore>,
    context: HostContext,
    state: Mutex<CacheState<D>>,
    reloads: AtomicU64,
    suppressed_echoes: AtomicU64,
    reload_tx: watch::Sender<u64>,
}

/// In-memory authoritative copy of one keyed document.
///
/// Cloning yields another handle to the same cache.
pub struct CachedDocument<D: Document> {
    inner: Arc<Inner<D>>,
}

impl<D: Document> Clone for CachedDocument<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D: Document> std::fmt::Debug for CachedDocument<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedDocument")
            .field("key", &self.inner.key)
            .field("context", &self.inner.context.name())
            .finish_non_exhaustive()
    }
}

impl<D: Document> CachedDocument<D> {
    /// Bind a cache to `key`. No I/O happens until [`initialize`](Self::initialize).
    #[must_use]
    pub fn new(engine: Arc<dyn DataStore>, key: impl Into<String>, context: HostContext) -> Self {
        Self {
            inner: Arc::new(Inner {
                key: key.into(),
                engine,
                context,
                state: Mutex::new(CacheState {
                    phase: Phase::Created,
                    document: None,
                    pending_echoes: 0,
                    subscription: None,
                }),
                reloads: AtomicU64::new(0),
                suppressed_echoes: AtomicU64::new(0),
                reload_tx: watch::Sender::new(0),
            }),
        }
    }

    /// The document key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// Number of reloads triggered by external changes.
    #[must_use]
    pub fn reloads(&self) -> u64 {
        self.inner.reloads.load(Ordering::SeqCst)
    }

    /// Number of change notifications recognized as this store's own echo.
    #[must_use]
    pub fn suppressed_echoes(&self) -> u64 {
        self.inner.suppressed_echoes.load(Ordering::SeqCst)
    }

    /// Watch the reload counter. The receiver sees a new value after every
    /// reload caused by an external change.
    #[must_use]
    pub fn subscribe_reloads(&self) -> watch::Receiver<u64> {
        self.inner.reload_tx.subscribe()
    }

    /// Whether `initialize` completed and `dispose` has not run.
    pub async fn is_ready(&self) -> bool {
        self.inner.state.lock().await.phase == Phase::Ready
    }

    /// Seed if absent, start watching, and load the document.
    ///
    /// # Errors
    ///
    /// Fails if the document is already initialized or disposed, or if the
    /// engine fails.
    pub async fn initialize(&self) -> CacheResult<()> {
        let inner = &self.inner;
        let key = inner.key.as_str();
        let mut state = inner.state.lock().await;
        match state.phase {
            Phase::Created => {},
            Phase::Ready => {
                return Err(CacheError::AlreadyInitialized { key: key.to_owned() });
            },
            Phase::Disposed => return Err(CacheError::Disposed { key: key.to_owned() }),
        }

        let seeded = if inner.engine.exists(key).await? {
            None
        } else {
            let seed = D::seed();
            inner.engine.save(key, &seed).await?;
            info!(key, "Seeded missing document");
            Some(seed)
        };

        let weak: Weak<Inner<D>> = Arc::downgrade(inner);
        let subscription = inner.engine.add_change_watcher(
            key,
            &inner.context,
            change_callback(move || {
                let weak = weak.clone();
                async move {
                    if let Some(inner) = weak.upgrade() {
                        inner.handle_change().await;
                    }
                }
            }),
        )?;

        let document = match seeded {
            Some(seed) => seed,
            None => {
                let (document, reseeded) = inner.load_or_seed().await?;
                if reseeded {
                    state.pending_echoes = state.pending_echoes.saturating_add(1);
                }
                document
            },
        };

        state.document = Some(document);
        state.subscription = Some(subscription);
        state.phase = Phase::Ready;
        info!(key, context = %inner.context.name(), "Document initialized");
        Ok(())
    }

    /// Run `f` against the cached document.
    ///
    /// # Errors
    ///
    /// Fails if the document is not live.
    pub async fn read<R, F>(&self, f: F) -> CacheResult<R>
    where
        F: FnOnce(&D) -> R + Send,
    {
        let state = self.inner.state.lock().await;
        let document = state.document(&self.inner.key)?;
        Ok(f(document))
    }

    /// Clone of the cached document.
    ///
    /// # Errors
    ///
    /// Fails if the document is not live.
    pub async fn snapshot(&self) -> CacheResult<D> {
        self.read(D::clone).await
    }

    /// Read-modify-write the document.
    ///
    /// `f` runs on a clone of the cache. If it succeeds the clone is saved;
    /// only after the save succeeds does it become the cached value. Either
    /// both cache and engine change, or neither does.
    ///
    /// # Errors
    ///
    /// Returns the closure's error, or a [`CacheError`] converted into `E`
    /// when the document is not live or the save fails.
    pub async fn update<R, E, F>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&mut D) -> Result<R, E> + Send,
        R: Send,
        E: From<CacheError> + Send,
    {
        let key = self.inner.key.as_str();
        let mut state = self.inner.state.lock().await;
        let mut working = state.document(key)?.clone();
        let result = f(&mut working)?;

        self.inner
            .engine
            .save(key, &working)
            .await
            .map_err(CacheError::from)?;

        state.document = Some(working);
        state.pending_echoes = state.pending_echoes.saturating_add(1);
        debug!(key, "Document updated");
        Ok(result)
    }

    /// Like [`update`](Self::update), but `f` reports whether it changed
    /// anything. `Ok(None)` discards the clone without saving.
    ///
    /// # Errors
    ///
    /// Same as [`update`](Self::update).
    pub async fn update_if_changed<R, E, F>(&self, f: F) -> Result<Option<R>, E>
    where
        F: FnOnce(&mut D) -> Result<Option<R>, E> + Send,
        R: Send,
        E: From<CacheError> + Send,
    {
        let key = self.inner.key.as_str();
        let mut state = self.inner.state.lock().await;
        let mut working = state.document(key)?.clone();
        let Some(result) = f(&mut working)? else {
            return Ok(None);
        };

        self.inner
            .engine
            .save(key, &working)
            .await
            .map_err(CacheError::from)?;

        state.document = Some(working);
        state.pending_echoes = state.pending_echoes.saturating_add(1);
        debug!(key, "Document updated");
        Ok(Some(result))
    }

    /// Stop watching and flush the cache one final time.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Disposed`] on a second call, and
    /// [`CacheError::InvariantViolation`] if the cache was never populated.
    pub async fn dispose(&self) -> CacheResult<()> {
        let key = self.inner.key.as_str();
        let subscription = {
            let mut state = self.inner.state.lock().await;
            if state.phase == Phase::Disposed {
                return Err(CacheError::Disposed { key: key.to_owned() });
            }
            state.phase = Phase::Disposed;
            state.subscription.take()
        };

        // Joined outside the lock: an in-flight change handler needs it.
        if let Some(subscription) = subscription {
            subscription.dispose().await;
        }

        let state = self.inner.state.lock().await;
        let Some(document) = state.document.as_ref() else {
            return Err(CacheError::InvariantViolation {
                key: key.to_owned(),
                message: "tried to flush a document that was never loaded".into(),
            });
        };
        self.inner.engine.save(key, document).await?;
        info!(key, "Document flushed and disposed");
        Ok(())
    }
}

impl<D: Document> Inner<D> {
    async fn handle_change(&self) {
        let key = self.key.as_str();
        let mut state = self.state.lock().await;
        if state.phase != Phase::Ready {
            return;
        }

        if state.pending_echoes > 0 {
            state.pending_echoes = state.pending_echoes.saturating_sub(1);
            self.suppressed_echoes.fetch_add(1, Ordering::SeqCst);
            debug!(key, "Ignoring change notification from own write");
            return;
        }

        match self.load_or_seed().await {
            Ok((document, reseeded)) => {
                if reseeded {
                    state.pending_echoes = state.pending_echoes.saturating_add(1);
                }
                state.document = Some(document);
                let count = self.reloads.fetch_add(1, Ordering::SeqCst).saturating_add(1);
                drop(state);
                self.reload_tx.send_replace(count);
                info!(key, reloads = count, "Reloaded document after external change");
            },
            Err(e) => {
                warn!(key, error = %e, "Failed to reload changed document, keeping cached copy");
            },
        }
    }

    /// Load the stored document, or seed it if the key is gone. The flag
    /// reports whether a seed was saved, which the watcher will echo.
    async fn load_or_seed(&self) -> CacheResult<(D, bool)> {
        let key = self.key.as_str();
        if !self.engine.exists(key).await? {
            let seed = D::seed();
            self.engine.save(key, &seed).await?;
            info!(key, "Document vanished, re-seeded");
            return Ok((seed, true));
        }

        match self.engine.load::<D>(key).await? {
            Some(document) => Ok((document, false)),
            None => {
                debug!(key, "Stored document is empty, using seed");
                Ok((D::seed(), false))
            },
        }
    }
}
