// Configuration file loaders

use crate::{ConfigError, Result};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// Supported configuration file formats, in lookup order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Toml,
    Json,
    Env,
}

impl FileFormat {
    pub const ALL: [FileFormat; 3] = [FileFormat::Toml, FileFormat::Json, FileFormat::Env];

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(FileFormat::Toml),
            "json" => Some(FileFormat::Json),
            "env" => Some(FileFormat::Env),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Toml => "toml",
            FileFormat::Json => "json",
            FileFormat::Env => "env",
        }
    }
}

/// Parses one configuration file into a JSON tree.
pub struct ConfigLoader {
    format: FileFormat,
}

impl ConfigLoader {
    pub fn new(format: FileFormat) -> Self {
        Self { format }
    }

    /// Pick the format from the file extension.
    pub fn auto(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .ok_or_else(|| ConfigError::LoadError(format!("{}: no file extension", path.display())))?;

        let format = FileFormat::from_extension(ext)
            .ok_or_else(|| ConfigError::LoadError(format!("unsupported format: {}", ext)))?;

        Ok(Self::new(format))
    }

    pub fn format(&self) -> FileFormat {
        self.format
    }

    pub fn load_file(&self, path: &Path) -> Result<Value> {
        let content = fs::read_to_string(path)?;
        self.parse(&content).map_err(|err| match err {
            ConfigError::ParseError { reason, .. } => ConfigError::ParseError {
                file: path.display().to_string(),
                reason,
            },
            other => other,
        })
    }

    /// Parse configuration text. The result is always an object.
    pub fn parse(&self, content: &str) -> Result<Value> {
        let value = match self.format {
            FileFormat::Toml => parse_toml(content)?,
            FileFormat::Json => parse_json(content)?,
            FileFormat::Env => parse_env(content),
        };

        match value {
            Value::Object(_) => Ok(value),
            other => Err(parse_error(format!(
                "top level must be a table or object, got {}",
                type_name(&other)
            ))),
        }
    }
}

fn parse_error(reason: String) -> ConfigError {
    ConfigError::ParseError {
        file: "<inline>".to_string(),
        reason,
    }
}

fn parse_json(content: &str) -> Result<Value> {
    serde_json::from_str(content).map_err(|e| parse_error(format!("JSON: {}", e)))
}

fn parse_toml(content: &str) -> Result<Value> {
    let table: toml::Table =
        toml::from_str(content).map_err(|e| parse_error(format!("TOML: {}", e)))?;
    serde_json::to_value(table).map_err(|e| ConfigError::SerializationError(e.to_string()))
}

/// `KEY=value` lines; `a.b=value` keys nest. Values that read as JSON
/// scalars (numbers, booleans) keep their type.
fn parse_env(content: &str) -> Value {
    let mut root = Value::Object(Map::new());

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);

        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim();
            let raw = value.trim();
            let quoted = raw.len() >= 2
                && ((raw.starts_with('"') && raw.ends_with('"'))
                    || (raw.starts_with('\'') && raw.ends_with('\'')));
            let value = if quoted {
                Value::String(raw[1..raw.len() - 1].to_string())
            } else {
                scalar(raw)
            };
            let path: Vec<&str> = key.split('.').collect();
            insert_path(&mut root, &path, value);
        }
    }

    root
}

/// Interpret an unquoted value.
pub(crate) fn scalar(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ (Value::Bool(_) | Value::Number(_) | Value::Null)) => value,
        _ => Value::String(raw.to_string()),
    }
}

/// Set `value` at `path` inside `root`, creating objects on the way.
/// Non-object nodes in the way are replaced.
pub(crate) fn insert_path(root: &mut Value, path: &[&str], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        *root = value;
        return;
    };

    let mut node = root;
    for key in parents {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        let Value::Object(map) = node else {
            return;
        };
        node = map
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    if let Value::Object(map) = node {
        map.insert(last.to_string(), value);
    }
}

/// Deep-merge `overlay` into `base`; objects merge key by key, anything else replaces.
pub(crate) fn merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
