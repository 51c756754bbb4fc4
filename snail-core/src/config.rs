// Configuration reader seam and the settings the core reads through it

use crate::routing::RouterSettings;
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

/// Key separator. The first segment names a configuration file.
pub const KEY_SEPARATOR: char = '.';

/// Read access to configuration.
///
/// `get("route")` returns the whole `route` file; `get("snail.config.debug")`
/// drills into the `snail` file. Missing keys are `None`, never an error.
pub trait ConfigReader: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;

    fn get_or(&self, key: &str, default: Value) -> Value {
        self.get(key).unwrap_or(default)
    }

    /// Deserialize the value at `key`. `Ok(None)` when the key is absent.
    fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>>
    where
        Self: Sized,
    {
        self.get(key)
            .map(|value| {
                serde_json::from_value(value)
                    .map_err(|e| Error::Config(format!("'{}': {}", key, e)))
            })
            .transpose()
    }
}

/// Walk a dotted path inside `root`. Array elements are addressed by index.
pub fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(root);
    }
    path.split(KEY_SEPARATOR).try_fold(root, |node, key| match node {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// An in-memory tree whose top-level keys are file names.
impl ConfigReader for Value {
    fn get(&self, key: &str) -> Option<Value> {
        lookup(self, key).cloned()
    }
}

/// Framework settings read from the `snail` and `def` files.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameworkSettings {
    pub debug: bool,
    pub request_timeout: Option<Duration>,
    pub services_namespace: String,
    pub router: RouterSettings,
}

impl FrameworkSettings {
    pub fn from_reader(reader: &dyn ConfigReader) -> Result<Self> {
        let debug = reader
            .get("snail.config.debug")
            .map(|v| truthy(&v))
            .unwrap_or(false);
        let request_timeout = reader
            .get("snail.config.request_timeout_ms")
            .and_then(|v| v.as_u64())
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis);
        let services_namespace = reader
            .get("snail.services.namespace")
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| crate::container::DEFAULT_SERVICES_NAMESPACE.to_string());
        let router = match reader.get("def") {
            Some(value) => serde_json::from_value(value)
                .map_err(|e| Error::Config(format!("'def': {}", e)))?,
            None => RouterSettings::default(),
        };

        Ok(Self {
            debug,
            request_timeout,
            services_namespace,
            router,
        })
    }
}

impl Default for FrameworkSettings {
    fn default() -> Self {
        Self {
            debug: false,
            request_timeout: None,
            services_namespace: crate::container::DEFAULT_SERVICES_NAMESPACE.to_string(),
            router: RouterSettings::default(),
        }
    }
}

/// Booleans as they show up in env files and loose configs.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64().map(|n| n != 0).unwrap_or(false),
        Value::String(s) => matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dotted_lookup() {
        let config = json!({
            "snail": { "config": { "debug": true }, "hosts": ["a", "b"] }
        });
        assert_eq!(ConfigReader::get(&config, "snail.config.debug"), Some(json!(true)));
        assert_eq!(ConfigReader::get(&config, "snail.hosts.1"), Some(json!("b")));
        assert_eq!(ConfigReader::get(&config, "snail.config.missing"), None);
        assert_eq!(config.get_or("snail.config.missing", json!(5)), json!(5));
        assert!(ConfigReader::get(&config, "snail").unwrap().is_object());
    }

    #[test]
    fn test_get_as() {
        let config = json!({ "app": { "port": 8080, "name": "demo" } });
        assert_eq!(config.get_as::<u16>("app.port").unwrap(), Some(8080));
        assert_eq!(config.get_as::<u16>("app.missing").unwrap(), None);
        assert!(config.get_as::<u16>("app.name").is_err());
    }

    #[test]
    fn test_framework_settings() {
        let config = json!({
            "snail": {
                "config": { "debug": "true", "request_timeout_ms": 250 },
                "services": { "namespace": "Shop::Services" }
            },
            "def": {
                "route": { "namespace": "Shop::Controllers" },
                "group": { "api": { "namespace": "Api", "controller": "Status", "action": "show" } },
                "param_mode": "positional"
            }
        });
        let settings = FrameworkSettings::from_reader(&config).unwrap();
        assert!(settings.debug);
        assert_eq!(settings.request_timeout, Some(Duration::from_millis(250)));
        assert_eq!(settings.services_namespace, "Shop::Services");
        assert_eq!(settings.router.route.namespace, "Shop::Controllers");
        assert_eq!(settings.router.route.controller, "Index");
        assert_eq!(settings.router.group["api"].controller, "Status");
        assert_eq!(settings.router.param_mode, crate::routing::ParamMode::Positional);
        assert_eq!(settings.router.suffixes, vec![".html", ".do"]);
    }

    #[test]
    fn test_framework_defaults() {
        let settings = FrameworkSettings::from_reader(&json!({})).unwrap();
        assert_eq!(settings, FrameworkSettings::default());
    }
}
