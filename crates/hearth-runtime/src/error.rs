//! Runtime error types.

use thiserror::Error;

/// Errors that can occur while starting or stopping the host.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Configuration could not be loaded or validated.
    #[error("Configuration error: {0}")]
    ConfigError(#[from] hearth_config::ConfigError),

    /// Logging could not be set up.
    #[error("Telemetry error: {0}")]
    TelemetryError(#[from] hearth_telemetry::TelemetryError),

    /// The persistence engine could not be opened.
    #[error("Storage error: {0}")]
    StorageError(#[from] hearth_storage::StorageError),

    /// The user store failed to initialize or dispose.
    #[error("User store error: {0}")]
    UserStoreError(#[from] hearth_users::UserStoreError),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
