//! Test harness helpers.

use std::path::PathBuf;

use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

/// Write `content` to `<dir>/<key>.yaml` behind the engine's back, the way
/// an operator editing the data directory would.
///
/// # Panics
///
/// Panics if the file cannot be written.
pub fn write_external_document(dir: &TempDir, key: &str, content: &str) -> PathBuf {
    let path = dir.path().join(format!("{key}.yaml"));
    std::fs::write(&path, content).expect("Failed to write document");
    path
}

/// Set up test logging with the given filter.
///
/// Safe to call from every test; only the first call installs a subscriber.
///
/// ```rust,ignore
/// use hearth_test::setup_test_logging;
///
/// #[tokio::test]
/// async fn test_reload() {
///     setup_test_logging("hearth_storage=debug");
/// }
/// ```
pub fn setup_test_logging(filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_test_writer()
        .try_init();
}

/// Set up test logging at `warn`.
pub fn setup_test_logging_default() {
    setup_test_logging("warn");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_external_document() {
        let dir = TempDir::new().unwrap();
        let path = write_external_document(&dir, "users", "users: []\n");
        assert!(path.ends_with("users.yaml"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "users: []\n");
    }

    #[test]
    fn test_logging_setup_is_idempotent() {
        setup_test_logging_default();
        setup_test_logging("debug");
    }
}
