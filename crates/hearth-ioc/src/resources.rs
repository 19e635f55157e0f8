//! Extraction of embedded module resources to disk.
//!
//! Resource names are dotted: `<module>.<segment>.<segment>...`. By default
//! segments are joined with dots into a file name. A marker resource named
//! `<module>.<prefix>..directory` turns the segment ending at `<prefix>`
//! into a directory:
//!
//! ```text
//! mymod.translations..directory      (marker, not extracted)
//! mymod.translations.en.yaml      →  translations/en.yaml
//! mymod.config.yaml               →  config.yaml
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{IocError, IocResult};
use crate::module::Module;

/// Suffix of directory marker resources.
pub const DIRECTORY_MARKER_SUFFIX: &str = "..directory";

/// Write every resource of `module` under `base_dir`.
///
/// Existing files are kept unless `overwrite` is set. Returns the paths
/// that were written.
///
/// # Errors
///
/// Returns [`IocError::Io`] if a directory or file cannot be written.
pub fn extract_resources(module: &Module, base_dir: &Path, overwrite: bool) -> IocResult<Vec<PathBuf>> {
    let resources = module.resources();
    if resources.is_empty() {
        return Ok(Vec::new());
    }
    create_dir(base_dir)?;

    let prefix = format!("{}.", module.name());
    let markers: HashSet<&str> = resources
        .iter()
        .map(|r| r.name.as_str())
        .filter(|name| name.ends_with(DIRECTORY_MARKER_SUFFIX))
        .collect();

    let mut written = Vec::new();
    for resource in resources {
        if resource.name.ends_with(DIRECTORY_MARKER_SUFFIX) {
            continue;
        }

        let relative = if let Some(rest) = resource.name.strip_prefix(&prefix) {
            rest
        } else {
            warn!(
                resource = %resource.name,
                module = %module.name(),
                "Resource name does not start with the module name; extracting under its full name"
            );
            resource.name.as_str()
        };

        let target = base_dir.join(resource_path(&prefix, relative, &markers));
        if let Some(parent) = target.parent() {
            create_dir(parent)?;
        }
        if target.exists() && !overwrite {
            debug!(path = %target.display(), "Resource already exists, keeping it");
            continue;
        }

        std::fs::write(&target, &resource.content).map_err(|source| IocError::Io {
            path: target.display().to_string(),
            source,
        })?;
        debug!(resource = %resource.name, path = %target.display(), "Resource extracted");
        written.push(target);
    }

    info!(
        module = %module.name(),
        written = written.len(),
        base_dir = %base_dir.display(),
        "Module resources extracted"
    );
    Ok(written)
}

/// Map the dotted `relative` name to a relative path using directory markers.
fn resource_path(prefix: &str, relative: &str, markers: &HashSet<&str>) -> PathBuf {
    let mut path = PathBuf::new();
    let mut segment = String::new();
    let mut marker_key = prefix.to_owned();

    for part in relative.split('.') {
        marker_key.push_str(part);
        marker_key.push('.');
        segment.push_str(part);

        if markers.contains(format!("{marker_key}.directory").as_str()) {
            path.push(&segment);
            segment.clear();
        } else {
            segment.push('.');
        }
    }

    let file_name = segment.trim_end_matches('.');
    if !file_name.is_empty() {
        path.push(file_name);
    }
    path
}

fn create_dir(dir: &Path) -> IocResult<()> {
    std::fs::create_dir_all(dir).map_err(|source| IocError::Io {
        path: dir.display().to_string(),
        source,
    })
}
