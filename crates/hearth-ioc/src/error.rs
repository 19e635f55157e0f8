//! Error types for service discovery.

/// Errors from discovery and resource extraction.
#[derive(Debug, thiserror::Error)]
pub enum IocError {
    /// A type carries metadata the scanner cannot interpret.
    #[error("invalid metadata on {type_name} while searching for {marker}: {message}")]
    InvalidMetadata {
        /// Fully-qualified type name.
        type_name: String,
        /// Marker kind being searched for.
        marker: &'static str,
        /// What is wrong.
        message: String,
    },

    /// Writing an extracted resource failed.
    #[error("io error at {path}: {source}")]
    Io {
        /// The file or directory involved.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Result type for discovery operations.
pub type IocResult<T> = Result<T, IocError>;

/// A type entry of a module that could not be resolved.
///
/// Typically caused by a missing optional dependency. Never fatal to a scan.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to load type {type_name}: {reason}")]
pub struct TypeLoadError {
    /// Name of the type that failed to load.
    pub type_name: String,
    /// Why it failed.
    pub reason: String,
}

impl TypeLoadError {
    /// Create a load error.
    #[must_use]
    pub fn new(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }
}
