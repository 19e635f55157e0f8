//! Hearth Runtime: host bootstrap and shutdown.
//!
//! The runtime ties the other crates together:
//!
//! - opens the file engine under the configured data directory
//! - scans modules for service implementations
//! - initializes the user store and the permission store over it
//! - publishes lifecycle events on the event bus
//!
//! Logging is left to the binary embedding the host, which may use
//! [`config_bridge::init_logging`].
//!
//! # Example
//!
//! ```rust,no_run
//! use hearth_config::HostConfig;
//! use hearth_runtime::{Runtime, config_bridge};
//!
//! # async fn example() -> Result<(), hearth_runtime::RuntimeError> {
//! let resolved = HostConfig::load(None)?;
//! config_bridge::init_logging(&resolved.config)?;
//!
//! let runtime = Runtime::start(&resolved.config, &Runtime::builtin_modules()).await?;
//! runtime.permissions().add_permission("alice", "player", "chat.send").await?;
//! runtime.shutdown(None).await?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod config_bridge;

mod error;
mod runtime;

pub use error::{RuntimeError, RuntimeResult};
pub use runtime::Runtime;
