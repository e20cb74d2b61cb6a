//! Option defaults from a JSON or TOML file.
//!
//! Top-level keys are option names without the leading dashes (`ram_max` or `ram-max`). A
//! `true` value enables a flag, `false` leaves it off, arrays repeat the option.

use fillet::{Error, Result};

use json::JsonValue;

use log::warn;

use std::fs;
use std::path::Path;

enum Value {
    Flag(bool),
    Text(String),
}

/// Reads `path` and renders its keys as command line arguments. Keys that do not name an
/// option in `known` are skipped with a warning.
pub fn load(path: &Path, known: &[String]) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)?;
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    let entries = match ext.as_ref().map(String::as_str) {
        Some("json") => from_json(&text)?,
        Some("toml") => from_toml(&text)?,
        _ => {
            return Err(Error::config(format!(
                "Unsupported config format '{}'. Expected .json or .toml",
                path.display()
            )))
        }
    };

    let mut argv = Vec::new();
    for (key, value) in entries {
        let name = format!("--{}", key.replace('_', "-"));
        if name == "--config" || !known.contains(&name) {
            warn!("Ignoring unknown config key '{}' in {}", key, path.display());
            continue;
        }
        match value {
            Value::Flag(true) => argv.push(name),
            Value::Flag(false) => {}
            Value::Text(v) => argv.push(format!("{}={}", name, v)),
        }
    }
    Ok(argv)
}

fn invalid(key: &str) -> Error {
    Error::config(format!("Unsupported value of config key '{}'", key))
}

fn from_json(text: &str) -> Result<Vec<(String, Value)>> {
    let root = json::parse(text).map_err(|e| Error::config(format!("Invalid JSON config: {}", e)))?;
    if !root.is_object() {
        return Err(Error::config("JSON config must be an object"));
    }
    let mut entries = Vec::new();
    for (key, value) in root.entries() {
        match value {
            JsonValue::Null => {}
            JsonValue::Boolean(b) => entries.push((key.to_string(), Value::Flag(*b))),
            JsonValue::Array(items) => {
                for item in items {
                    entries.push((key.to_string(), json_text(key, item)?));
                }
            }
            other => entries.push((key.to_string(), json_text(key, other)?)),
        }
    }
    Ok(entries)
}

fn json_text(key: &str, value: &JsonValue) -> Result<Value> {
    if value.is_string() || value.is_number() {
        Ok(Value::Text(match value.as_str() {
            Some(s) => s.to_string(),
            None => value.dump(),
        }))
    } else {
        Err(invalid(key))
    }
}

fn from_toml(text: &str) -> Result<Vec<(String, Value)>> {
    let table = text
        .parse::<toml::Table>()
        .map_err(|e| Error::config(format!("Invalid TOML config: {}", e)))?;
    let mut entries = Vec::new();
    for (key, value) in table.iter() {
        match value {
            toml::Value::Boolean(b) => entries.push((key.clone(), Value::Flag(*b))),
            toml::Value::Array(items) => {
                for item in items {
                    entries.push((key.clone(), toml_text(key, item)?));
                }
            }
            other => entries.push((key.clone(), toml_text(key, other)?)),
        }
    }
    Ok(entries)
}

fn toml_text(key: &str, value: &toml::Value) -> Result<Value> {
    Ok(Value::Text(match value {
        toml::Value::String(s) => s.clone(),
        toml::Value::Integer(i) => i.to_string(),
        toml::Value::Float(f) => f.to_string(),
        _ => return Err(invalid(key)),
    }))
}
