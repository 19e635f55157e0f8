#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
//! Layered host configuration for Hearth.
//!
//! # Usage
//!
//! ```rust,no_run
//! use hearth_config::HostConfig;
//!
//! let resolved = HostConfig::load(Some(std::path::Path::new("hearth.toml"))).unwrap();
//! println!("Data directory: {}", resolved.config.data.directory.display());
//! ```
//!
//! # Precedence
//!
//! From highest to lowest priority:
//!
//! 1. **Config file** (the path given to [`HostConfig::load`])
//! 2. **Environment variables** (`HEARTH_*`), fallback only
//! 3. **Embedded defaults** (`defaults.toml` compiled into the binary)
//!
//! String values may reference environment variables as `${VAR}`.
//!
//! This crate depends on no other Hearth crate. Conversion into storage and
//! logging settings happens in the runtime.

/// Environment variable fallback resolution.
pub mod env;
/// Configuration error types.
pub mod error;
/// Configuration file loading.
pub mod loader;
/// Layered configuration merging with precedence.
pub mod merge;
/// Configuration struct definitions.
pub mod types;
/// Configuration validation rules.
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{MAX_CONFIG_FILE_SIZE, ResolvedConfig};
pub use merge::{ConfigLayer, FieldSources};
pub use types::{DataSection, HostConfig, LoggingSection, WatchSection};
