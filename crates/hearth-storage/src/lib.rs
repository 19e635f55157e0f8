//! Hearth Storage: keyed document persistence for the host runtime.
//!
//! # Engines
//!
//! A [`DataStore`] stores structured documents by key and notifies
//! subscribers when a key changes:
//!
//! - [`MemoryDataStore`]: map-backed, for tests and ephemeral hosts
//! - [`FileDataStore`]: one YAML file per key, with a filesystem watcher
//!   that picks up edits made by other processes
//!
//! # Cached documents
//!
//! [`CachedDocument`] keeps the authoritative in-memory copy of one document,
//! writes through to the engine, and reloads when the document is changed
//! from outside while ignoring the echo of its own writes.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod cached;
pub mod engine;
pub mod error;
pub mod file;
pub mod memory;
pub mod watch;

pub use cached::{CacheError, CacheResult, CachedDocument, Document};
pub use engine::{DataStore, DataStoreExt, validate_key};
pub use error::{StorageError, StorageResult};
pub use file::{DEFAULT_DEBOUNCE, FileDataStore, FileStoreConfig};
pub use memory::MemoryDataStore;
pub use watch::{
    ChangeCallback, ChangeNotifier, HostContext, WatchSubscription, change_callback,
};
