//! Layered loading.
//!
//! 1. Parse embedded `defaults.toml` → base
//! 2. Merge the host config file, if any
//! 3. Apply `HEARTH_*` env var fallbacks for fields the file did not set
//! 4. Resolve `${VAR}` references
//! 5. Deserialize and validate

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info};

use crate::env::{apply_env_fallbacks, collect_env_vars, resolve_env_references};
use crate::error::{ConfigError, ConfigResult};
use crate::merge::{ConfigLayer, FieldSources, deep_merge_tracking, record_leaves};
use crate::types::HostConfig;
use crate::validate;

/// Embedded default configuration.
const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Maximum allowed config file size (1 MiB).
pub const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;

/// A loaded configuration together with where each value came from.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// The final merged configuration.
    pub config: HostConfig,
    /// Dotted field path → which layer set the value.
    pub field_sources: FieldSources,
    /// Config files that were loaded.
    pub loaded_files: Vec<String>,
}

impl ResolvedConfig {
    /// Which layer set `field`, if it is known.
    #[must_use]
    pub fn source_of(&self, field: &str) -> Option<&ConfigLayer> {
        self.field_sources.get(field)
    }
}

/// Load with the process environment.
///
/// A missing file at `path` is not an error; the defaults apply.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file is unreadable, too large or
/// malformed, or if the merged configuration fails validation.
pub fn load(path: Option<&Path>) -> ConfigResult<ResolvedConfig> {
    load_with_env(path, &collect_env_vars())
}

/// Load with an explicit set of environment variables.
///
/// # Errors
///
/// Same as [`load`].
pub fn load_with_env<S: ::std::hash::BuildHasher>(
    path: Option<&Path>,
    env_vars: &HashMap<String, String, S>,
) -> ConfigResult<ResolvedConfig> {
    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
            path: "<embedded defaults>".to_owned(),
            source: e,
        })?;

    let mut field_sources = FieldSources::new();
    let mut loaded_files = Vec::new();
    record_leaves(&merged, "", &ConfigLayer::Defaults, &mut field_sources);

    if let Some(path) = path
        && let Some(overlay) = try_load_file(path)?
    {
        deep_merge_tracking(&mut merged, &overlay, "", &ConfigLayer::File, &mut field_sources);
        loaded_files.push(path.display().to_string());
        info!(path = %path.display(), "loaded host config");
    }

    let env_count = apply_env_fallbacks(&mut merged, &mut field_sources, env_vars);
    if env_count > 0 {
        debug!(count = env_count, "applied environment variable fallbacks");
    }

    resolve_env_references(&mut merged, env_vars);
    let config: HostConfig =
        merged
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::ParseError {
                path: "<merged config>".to_owned(),
                source: e,
            })?;

    validate::validate(&config)?;

    Ok(ResolvedConfig {
        config,
        field_sources,
        loaded_files,
    })
}

/// Try to load a file, returning `None` if the file doesn't exist.
///
/// Uses a single read operation to avoid TOCTOU races (no separate
/// exists/metadata checks before reading).
fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, skipping");
            return Ok(None);
        },
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.display().to_string(),
                source: e,
            });
        },
    };

    if content.len() as u64 > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::ValidationError {
            field: path.display().to_string(),
            message: format!(
                "config file is {} bytes, exceeding the {} byte limit",
                content.len(),
                MAX_CONFIG_FILE_SIZE
            ),
        });
    }

    let value: toml::Value = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn test_defaults_deserialize() {
        let config: HostConfig = toml::from_str(DEFAULTS_TOML).unwrap();
        assert_eq!(config, HostConfig::default());
    }

    #[test]
    fn test_load_without_file() {
        let resolved = load_with_env(None, &env(&[])).unwrap();
        assert_eq!(resolved.config, HostConfig::default());
        assert!(resolved.loaded_files.is_empty());
        assert_eq!(resolved.source_of("watch.enabled"), Some(&ConfigLayer::Defaults));
    }

    #[test]
    fn test_missing_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = load_with_env(Some(&dir.path().join("absent.toml")), &env(&[])).unwrap();
        assert!(resolved.loaded_files.is_empty());
    }

    #[test]
    fn test_file_overrides_defaults_and_env_fills_gaps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hearth.toml");
        std::fs::write(&path, "[watch]\ndebounce_ms = 100\n[logging]\nlevel = \"warn\"\n").unwrap();

        let resolved = load_with_env(
            Some(&path),
            &env(&[
                ("HEARTH_LOG_LEVEL", "trace"),
                ("HEARTH_DATA_DIR", "/srv/hearth"),
                ("HEARTH_WATCH_ENABLED", "false"),
            ]),
        )
        .unwrap();

        let config = &resolved.config;
        assert_eq!(config.watch.debounce_ms, 100);
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.data.directory, PathBuf::from("/srv/hearth"));
        assert!(!config.watch.enabled);
        assert_eq!(resolved.source_of("logging.level"), Some(&ConfigLayer::File));
        assert_eq!(
            resolved.source_of("data.directory"),
            Some(&ConfigLayer::Environment)
        );
        assert_eq!(resolved.loaded_files.len(), 1);
    }

    #[test]
    fn test_env_reference_in_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hearth.toml");
        std::fs::write(&path, "[data]\ndirectory = \"${STATE}/hearth\"\n").unwrap();
        let resolved = load_with_env(Some(&path), &env(&[("STATE", "/var/lib")])).unwrap();
        assert_eq!(
            resolved.config.data.directory,
            PathBuf::from("/var/lib/hearth")
        );
    }

    #[test]
    fn test_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hearth.toml");
        std::fs::write(&path, "[watch\n").unwrap();
        assert!(matches!(
            load_with_env(Some(&path), &env(&[])),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn test_oversized_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hearth.toml");
        let padding = "#".repeat(usize::try_from(MAX_CONFIG_FILE_SIZE).unwrap().saturating_add(1));
        std::fs::write(&path, padding).unwrap();
        assert!(matches!(
            load_with_env(Some(&path), &env(&[])),
            Err(ConfigError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_invalid_env_value_fails_validation() {
        let result = load_with_env(None, &env(&[("HEARTH_LOG_LEVEL", "chatty")]));
        assert!(matches!(
            result,
            Err(ConfigError::ValidationError { field, .. }) if field == "logging.level"
        ));
    }

    #[test]
    fn test_unparsable_env_number_is_a_parse_error() {
        let result = load_with_env(None, &env(&[("HEARTH_WATCH_DEBOUNCE_MS", "soon")]));
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }
}
