//! Layered configuration loader.
//!
//! Loads configuration from the config directory:
//! - `config.json` - Core configuration
//! - `secrets.json` - Credentials (API keys), merged over the core file
//!
//! Environment variables are applied afterwards by [`crate::Config`].

use serde_json::Value;
use std::fs;
use std::path::Path;

use crate::error::{Result, ResultExt};

/// Configuration file names, in merge order.
pub const CONFIG_FILES: &[&str] = &["config.json", "secrets.json"];

/// Load a JSON file and return its contents as a Value.
/// Returns None if file doesn't exist.
pub fn load_json_file(path: &Path) -> Result<Option<Value>> {
    if !path.exists() {
        return Ok(None);
    }

    let content =
        fs::read_to_string(path).context(format!("Failed to read {}", path.display()))?;

    let value: Value =
        serde_json::from_str(&content).context(format!("Failed to parse {}", path.display()))?;

    Ok(Some(value))
}

/// Deep merge two JSON values.
/// Source values override target values, with object merging at each level.
pub fn merge_json(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target_map), Value::Object(source_map)) => {
            for (key, source_value) in source_map {
                match target_map.get_mut(&key) {
                    Some(target_value) => {
                        merge_json(target_value, source_value);
                    }
                    None => {
                        target_map.insert(key, source_value);
                    }
                }
            }
        }
        (target, source) => {
            *target = source;
        }
    }
}

/// Load every known config file from `dir` and merge them.
///
/// Missing files are skipped; an empty object is returned when none exist.
pub fn load_layered_config(dir: &Path) -> Result<Value> {
    let mut config = Value::Object(Default::default());

    for file in CONFIG_FILES {
        if let Some(layer) = load_json_file(&dir.join(file))? {
            merge_json(&mut config, layer);
            tracing::debug!(file, dir = %dir.display(), "Loaded config layer");
        }
    }

    Ok(config)
}
