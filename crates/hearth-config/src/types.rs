use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Complete host configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct HostConfig {
    /// Document storage.
    pub data: DataSection,
    /// Change watching for documents edited outside the process.
    pub watch: WatchSection,
    /// Log output.
    pub logging: LoggingSection,
}

impl HostConfig {
    /// Load `defaults.toml`, overlay `path` if given, then apply
    /// `HEARTH_*` environment fallbacks.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`](crate::ConfigError) if the file is
    /// malformed, too large, or the result fails validation.
    pub fn load(path: Option<&std::path::Path>) -> crate::ConfigResult<crate::ResolvedConfig> {
        crate::loader::load(path)
    }
}

/// `[data]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSection {
    /// Directory of the file engine. Relative paths are resolved against the
    /// working directory.
    pub directory: PathBuf,
    /// Key of the users document.
    pub users_key: String,
}

impl Default for DataSection {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("data"),
            users_key: "users".to_owned(),
        }
    }
}

/// `[watch]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchSection {
    /// Whether to watch the data directory.
    pub enabled: bool,
    /// Debounce window in milliseconds.
    pub debounce_ms: u64,
}

impl WatchSection {
    /// The debounce window.
    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_ms: 500,
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Default level: `trace`, `debug`, `info`, `warn` or `error`.
    pub level: String,
    /// Output format: `pretty`, `compact`, `json` or `full`.
    pub format: String,
    /// Extra `tracing` filter directives.
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "compact".to_owned(),
            directives: Vec::new(),
        }
    }
}
