//! Environment variable fallback and `${VAR}` reference resolution.
//!
//! Env vars are **fallback**, not override. They are only applied to fields
//! that the config file did not set.

use std::collections::HashMap;
use std::fmt::Write as _;

use tracing::debug;

use crate::merge::{ConfigLayer, FieldSources};

/// Mapping from environment variable name to config field path.
struct EnvMapping {
    var_name: &'static str,
    field_path: &'static str,
}

/// All supported `HEARTH_*` env var mappings.
const ENV_MAPPINGS: &[EnvMapping] = &[
    EnvMapping {
        var_name: "HEARTH_DATA_DIR",
        field_path: "data.directory",
    },
    EnvMapping {
        var_name: "HEARTH_LOG_LEVEL",
        field_path: "logging.level",
    },
    EnvMapping {
        var_name: "HEARTH_WATCH_DEBOUNCE_MS",
        field_path: "watch.debounce_ms",
    },
    EnvMapping {
        var_name: "HEARTH_WATCH_ENABLED",
        field_path: "watch.enabled",
    },
];

/// Apply environment variable fallbacks to fields that no config file set.
/// Fields holding only their default value count as unset.
///
/// Returns the number of env vars applied.
pub fn apply_env_fallbacks<S: ::std::hash::BuildHasher>(
    merged: &mut toml::Value,
    sources: &mut FieldSources,
    env_vars: &HashMap<String, String, S>,
) -> usize {
    let mut count: usize = 0;

    for mapping in ENV_MAPPINGS {
        let set_by_file = sources
            .get(mapping.field_path)
            .is_some_and(|layer| *layer != ConfigLayer::Defaults);
        if set_by_file {
            continue;
        }

        if let Some(val) = env_vars.get(mapping.var_name) {
            debug!(
                var = mapping.var_name,
                field = mapping.field_path,
                "applying env var fallback"
            );

            set_field_from_string(merged, mapping.field_path, val);
            sources.insert(mapping.field_path.to_owned(), ConfigLayer::Environment);
            count = count.saturating_add(1);
        }
    }

    count
}

/// Resolve `${VAR}` references within string values in the config tree.
///
/// Only string values are processed. References that don't resolve are left
/// as-is.
pub fn resolve_env_references<S: ::std::hash::BuildHasher>(
    val: &mut toml::Value,
    env_vars: &HashMap<String, String, S>,
) {
    match val {
        toml::Value::String(s) => {
            *s = resolve_string_refs(s, env_vars);
        },
        toml::Value::Table(table) => {
            for (_, child) in table.iter_mut() {
                resolve_env_references(child, env_vars);
            }
        },
        toml::Value::Array(arr) => {
            for child in arr.iter_mut() {
                resolve_env_references(child, env_vars);
            }
        },
        _ => {},
    }
}

/// Replace `${VAR}` references in a string with their env var values.
fn resolve_string_refs<S: ::std::hash::BuildHasher>(
    input: &str,
    env_vars: &HashMap<String, String, S>,
) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_name = String::new();
            let mut closed = false;

            for ch in chars.by_ref() {
                if ch == '}' {
                    closed = true;
                    break;
                }
                var_name.push(ch);
            }

            if closed && !var_name.is_empty() {
                if let Some(val) = env_vars.get(&var_name) {
                    result.push_str(val);
                } else {
                    debug!(var = var_name, "unresolved env var reference in config");
                    let _ = write!(result, "${{{var_name}}}");
                }
            } else {
                // Malformed reference, leave as-is.
                result.push_str("${");
                result.push_str(&var_name);
            }
        } else {
            result.push(ch);
        }
    }

    result
}

/// Set a dotted field in the TOML tree from a string value, creating
/// intermediate tables.
fn set_field_from_string(root: &mut toml::Value, path: &str, val: &str) {
    let toml_val = coerce_to_toml_value(path, val);
    let Some((parents, leaf)) = path.rsplit_once('.') else {
        if let Some(table) = root.as_table_mut() {
            table.insert(path.to_owned(), toml_val);
        }
        return;
    };

    let mut current = root;
    for segment in parents.split('.') {
        let Some(table) = current.as_table_mut() else {
            return;
        };
        current = table
            .entry(segment.to_owned())
            .or_insert(toml::Value::Table(toml::map::Map::new()));
    }
    if let Some(table) = current.as_table_mut() {
        table.insert(leaf.to_owned(), toml_val);
    }
}

/// Attempt to coerce a string env var value to the appropriate TOML type
/// based on the field path.
fn coerce_to_toml_value(path: &str, val: &str) -> toml::Value {
    if path == "watch.debounce_ms"
        && let Ok(i) = val.trim().parse::<i64>()
    {
        return toml::Value::Integer(i);
    }

    if path == "watch.enabled"
        && let Some(b) = parse_bool(val)
    {
        return toml::Value::Boolean(b);
    }

    toml::Value::String(val.to_owned())
}

fn parse_bool(val: &str) -> Option<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Collect all current environment variables into a map.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars().collect()
}
