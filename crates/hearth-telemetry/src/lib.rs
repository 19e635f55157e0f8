//! Hearth Telemetry: logging setup for Hearth hosts.
//!
//! Library crates only emit `tracing` events. The binary embedding the host
//! decides where they go by installing a subscriber once at startup:
//!
//! ```rust,no_run
//! use hearth_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), hearth_telemetry::TelemetryError> {
//! let config = LogConfig::new("info")
//!     .with_format(LogFormat::Json)
//!     .with_directive("hearth_storage=debug");
//! setup_logging(&config)?;
//! tracing::info!("host starting");
//! # Ok(())
//! # }
//! ```
//!
//! With the `config` feature, a [`LogConfig`] can be built from the
//! `[logging]` section of the host configuration.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{
    FileLogConfig, FileRotation, LogConfig, LogFormat, LogTarget, setup_default_logging,
    setup_logging,
};
