//! Validation of a deserialized [`HostConfig`].

use crate::error::{ConfigError, ConfigResult};
use crate::types::HostConfig;

/// Accepted `logging.level` values.
pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Accepted `logging.format` values.
pub const LOG_FORMATS: &[&str] = &["pretty", "compact", "json", "full"];

/// Upper bound for `watch.debounce_ms`.
pub const MAX_DEBOUNCE_MS: u64 = 60_000;

/// Validate every section.
///
/// # Errors
///
/// Returns [`ConfigError::ValidationError`] naming the first offending field.
pub fn validate(config: &HostConfig) -> ConfigResult<()> {
    if config.data.directory.as_os_str().is_empty() {
        return Err(invalid("data.directory", "must not be empty"));
    }

    let key = config.data.users_key.as_str();
    if key.trim().is_empty() {
        return Err(invalid("data.users_key", "must not be empty"));
    }
    if key.contains(['/', '\\', '\0']) || key == "." || key == ".." {
        return Err(invalid(
            "data.users_key",
            "must be a plain name without path separators",
        ));
    }

    if config.watch.debounce_ms > MAX_DEBOUNCE_MS {
        return Err(invalid(
            "watch.debounce_ms",
            &format!("must be at most {MAX_DEBOUNCE_MS}"),
        ));
    }

    let level = config.logging.level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        return Err(invalid(
            "logging.level",
            &format!("'{}' is not one of {}", config.logging.level, LOG_LEVELS.join(", ")),
        ));
    }

    let format = config.logging.format.to_ascii_lowercase();
    if !LOG_FORMATS.contains(&format.as_str()) {
        return Err(invalid(
            "logging.format",
            &format!("'{}' is not one of {}", config.logging.format, LOG_FORMATS.join(", ")),
        ));
    }

    if let Some(empty) = config.logging.directives.iter().position(|d| d.trim().is_empty()) {
        return Err(invalid(
            "logging.directives",
            &format!("entry {empty} is empty"),
        ));
    }

    Ok(())
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_owned(),
        message: message.to_owned(),
    }
}
