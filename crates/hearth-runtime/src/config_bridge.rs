//! Bridge from `hearth_config::HostConfig` to the settings of the other
//! crates.
//!
//! The config crate depends on no other Hearth crate, so every conversion
//! into storage and logging settings happens here, once.

use hearth_config::HostConfig;
use hearth_storage::FileStoreConfig;
use hearth_telemetry::{LogConfig, setup_logging};

use crate::error::RuntimeResult;

/// File engine settings from the `[data]` and `[watch]` sections.
#[must_use]
pub fn to_store_config(cfg: &HostConfig) -> FileStoreConfig {
    FileStoreConfig::new(&cfg.data.directory)
        .with_watch(cfg.watch.enabled)
        .with_debounce(cfg.watch.debounce())
}

/// Logging settings from the `[logging]` section.
///
/// # Errors
///
/// Fails if the configured format is unknown.
pub fn to_log_config(cfg: &HostConfig) -> RuntimeResult<LogConfig> {
    Ok(LogConfig::try_from(&cfg.logging)?)
}

/// Install the global subscriber described by the `[logging]` section.
///
/// Meant for the binary embedding the host; libraries and
/// [`Runtime::start`](crate::Runtime::start) never call it.
///
/// # Errors
///
/// Fails if the section is invalid or a subscriber is already installed.
pub fn init_logging(cfg: &HostConfig) -> RuntimeResult<()> {
    setup_logging(&to_log_config(cfg)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use hearth_telemetry::LogFormat;

    use super::*;

    #[test]
    fn test_store_config_follows_sections() {
        let mut cfg = HostConfig::default();
        cfg.data.directory = "/srv/hearth".into();
        cfg.watch.enabled = false;
        cfg.watch.debounce_ms = 250;

        let store = to_store_config(&cfg);
        assert_eq!(store.directory, std::path::PathBuf::from("/srv/hearth"));
        assert!(!store.watch);
        assert_eq!(store.debounce, Duration::from_millis(250));
    }

    #[test]
    fn test_log_config_follows_section() {
        let mut cfg = HostConfig::default();
        cfg.logging.level = "DEBUG".into();
        cfg.logging.format = "json".into();
        cfg.logging.directives = vec!["hearth_storage=trace".into()];

        let log = to_log_config(&cfg).unwrap();
        assert_eq!(log.level, "debug");
        assert_eq!(log.format, LogFormat::Json);
        assert_eq!(log.directives, vec!["hearth_storage=trace".to_string()]);
    }

    #[test]
    fn test_unknown_log_format_is_rejected() {
        let mut cfg = HostConfig::default();
        cfg.logging.format = "xml".into();
        assert!(to_log_config(&cfg).is_err());
    }
}
