//! Configuration store for the Snail framework.
//!
//! Configuration lives in one file per concern (`def`, `route`, `snail`, ...).
//! A key's first segment names the file and later segments drill into it:
//! `snail.config.debug` reads `config.debug` from the `snail` file.
//!
//! Files are looked up in the application directory first and the framework
//! directory second, trying `.toml`, `.json` and `.env` in that order. The
//! first file found wins as a whole; files are not merged across directories.
//! In-memory overrides from [`ConfigStore::set`] and environment overlays
//! from [`ConfigStore::load_env`] are merged over the file contents.
//!
//! ```
//! use snail_config::ConfigStore;
//! use snail_core::ConfigReader;
//! use serde_json::json;
//!
//! let store = ConfigStore::new();
//! store.set("snail.config.debug", json!(true)).unwrap();
//! assert_eq!(store.get("snail.config.debug"), Some(json!(true)));
//! assert_eq!(store.get_or("snail.config.missing", json!(1)), json!(1));
//! ```

pub mod env;
pub mod error;
pub mod loader;

pub use env::EnvLoader;
pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, FileFormat};

use loader::{insert_path, merge};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use snail_core::config::{lookup, ConfigReader, KEY_SEPARATOR};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Per-file configuration with lazy loading and in-memory overrides.
#[derive(Clone, Default)]
pub struct ConfigStore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    app_dir: Option<PathBuf>,
    framework_dir: Option<PathBuf>,
    /// Parsed files by name; `None` records a file that does not exist.
    files: RwLock<HashMap<String, Option<Value>>>,
    overrides: RwLock<Map<String, Value>>,
}

impl ConfigStore {
    /// A store with no directories. Only overrides are visible.
    pub fn new() -> Self {
        Self::default()
    }

    /// Application directory first, framework directory second.
    pub fn with_dirs(app_dir: impl Into<PathBuf>, framework_dir: Option<PathBuf>) -> Self {
        Self {
            inner: Arc::new(Inner {
                app_dir: Some(app_dir.into()),
                framework_dir,
                ..Inner::default()
            }),
        }
    }

    pub fn app_dir(&self) -> Option<&Path> {
        self.inner.app_dir.as_deref()
    }

    pub fn framework_dir(&self) -> Option<&Path> {
        self.inner.framework_dir.as_deref()
    }

    /// Path of the file backing `name`, if there is one.
    pub fn locate(&self, name: &str) -> Option<PathBuf> {
        [self.app_dir(), self.framework_dir()]
            .into_iter()
            .flatten()
            .flat_map(|dir| {
                FileFormat::ALL
                    .iter()
                    .map(move |format| dir.join(format!("{}.{}", name, format.extension())))
            })
            .find(|path| path.is_file())
    }

    /// Load and cache file `name`. `Ok(None)` when no directory has it.
    pub fn load(&self, name: &str) -> Result<Option<Value>> {
        validate_name(name)?;
        if let Some(cached) = self.inner.files.read().get(name) {
            return Ok(cached.clone());
        }

        let loaded = match self.locate(name) {
            Some(path) => {
                let value = ConfigLoader::auto(&path)?.load_file(&path)?;
                snail_log::debug!(target: "snail::config", "Loaded {} from {}", name, path.display());
                Some(value)
            }
            None => None,
        };
        self.inner
            .files
            .write()
            .insert(name.to_string(), loaded.clone());
        Ok(loaded)
    }

    /// Drop cached files so the next read goes back to disk.
    pub fn reload(&self) {
        self.inner.files.write().clear();
    }

    /// Override the value at `key`.
    pub fn set(&self, key: &str, value: Value) -> Result<()> {
        let path = split_key(key)?;
        let mut overrides = self.inner.overrides.write();
        let mut root = Value::Object(std::mem::take(&mut *overrides));
        insert_path(&mut root, &path, value);
        if let Value::Object(map) = root {
            *overrides = map;
        }
        Ok(())
    }

    /// Overlay `PREFIX_FILE__A__B` variables from the process environment.
    pub fn load_env(&self, prefix: &str) -> Result<usize> {
        let entries = EnvLoader::new(prefix).load();
        self.apply(entries)
    }

    /// Load a `.env` file into the process environment, then overlay it.
    pub fn load_dotenv(&self, path: Option<&Path>, prefix: &str) -> Result<usize> {
        match path {
            Some(path) => {
                dotenvy::from_path(path).map_err(|e| ConfigError::LoadError(e.to_string()))?;
            }
            None => {
                // A missing default `.env` is not an error.
                dotenvy::dotenv().ok();
            }
        }
        self.load_env(prefix)
    }

    /// Apply `(dotted key, value)` pairs as overrides.
    pub fn apply<I>(&self, entries: I) -> Result<usize>
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let mut applied = 0;
        for (key, value) in entries {
            self.set(&key, value)?;
            applied += 1;
        }
        Ok(applied)
    }

    /// File contents with overrides merged in.
    pub fn file(&self, name: &str) -> Result<Option<Value>> {
        let loaded = self.load(name)?;
        let overlay = self.inner.overrides.read().get(name).cloned();
        Ok(match (loaded, overlay) {
            (Some(mut base), Some(overlay)) => {
                merge(&mut base, &overlay);
                Some(base)
            }
            (base, overlay) => base.or(overlay),
        })
    }

    /// Names of files loaded or overridden so far.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .files
            .read()
            .iter()
            .filter(|(_, value)| value.is_some())
            .map(|(name, _)| name.clone())
            .chain(self.inner.overrides.read().keys().cloned())
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

impl ConfigReader for ConfigStore {
    fn get(&self, key: &str) -> Option<Value> {
        let (name, rest) = match key.split_once(KEY_SEPARATOR) {
            Some((name, rest)) => (name, rest),
            None => (key, ""),
        };

        let file = match self.file(name) {
            Ok(file) => file?,
            Err(err) => {
                snail_log::warn!(target: "snail::config", "Ignoring config file {}: {}", name, err);
                return None;
            }
        };
        lookup(&file, rest).cloned()
    }
}

fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidKey(name.to_string()))
    }
}

fn split_key(key: &str) -> Result<Vec<&str>> {
    let path: Vec<&str> = key.split(KEY_SEPARATOR).collect();
    match path.first() {
        Some(name) if validate_name(name).is_ok() && path.iter().all(|s| !s.is_empty()) => Ok(path),
        _ => Err(ConfigError::InvalidKey(key.to_string())),
    }
}
