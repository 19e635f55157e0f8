//! Error types for user data operations.

use hearth_storage::CacheError;
use thiserror::Error;

use crate::value::ConversionError;

/// Errors that can occur in user data operations.
#[derive(Debug, Error)]
pub enum UserStoreError {
    /// An argument was empty or malformed. Nothing was read or written.
    #[error("invalid argument '{name}': {message}")]
    InvalidArgument {
        /// The argument name.
        name: &'static str,
        /// What was wrong with it.
        message: String,
    },

    /// The operation needs an existing record.
    #[error("no user '{id}' of type '{user_type}'")]
    UserNotFound {
        /// Actor ID.
        id: String,
        /// Actor type.
        user_type: String,
    },

    /// A field value could not be converted.
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// The backing cached document failed.
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Result type for user data operations.
pub type UserStoreResult<T> = Result<T, UserStoreError>;

/// Reject empty arguments. Whitespace is a valid value.
pub(crate) fn require(name: &'static str, value: &str) -> UserStoreResult<()> {
    if value.is_empty() {
        return Err(UserStoreError::InvalidArgument {
            name,
            message: "must not be empty".to_owned(),
        });
    }
    Ok(())
}
