//! Dot-path lookups over `serde_json::Value`.
//!
//! This is the "only place that dynamically introspects arbitrary
//! paths" referenced in spec §9: the playbook engine's condition
//! evaluator and `{{event.<path>}}` template resolver both sit on top
//! of [`get_path`].

use serde_json::Value;

/// Sentinel returned for a path that doesn't resolve to anything.
/// Per spec §4.H: "missing paths yield the sentinel 'missing' which is
/// unequal to every value".
pub const MISSING: &str = "missing";

/// Resolve a dot-separated path (`metadata.ioc_matches.0.confidence`)
/// against a JSON value. Integer path components index into arrays.
pub fn get_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for component in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(component)?,
            Value::Array(items) => {
                let idx: usize = component.parse().ok()?;
                items.get(idx)?
            }
            _ => return None,
        };
    }
    Some(current)
}

/// Stringify a resolved value the way `{{event.<path>}}` substitution
/// expects: strings unwrap their quotes, everything else uses its JSON
/// rendering.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Stringify a path lookup, returning the [`MISSING`] sentinel when the
/// path does not resolve.
pub fn stringify_path(root: &Value, path: &str) -> String {
    match get_path(root, path) {
        Some(v) => stringify(v),
        None => MISSING.to_string(),
    }
}
