//! Storage error types.

/// Errors from persistence engine operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A storage operation failed.
    #[error("storage error: {0}")]
    Internal(String),

    /// Reading or writing the backing file failed.
    #[error("io error at {path}: {source}")]
    Io {
        /// The file or directory involved.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error for key '{key}': {message}")]
    Serialization {
        /// The document key.
        key: String,
        /// What went wrong.
        message: String,
    },

    /// The key is invalid.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// The change watcher could not be set up.
    #[error("watch error: {0}")]
    Watch(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
