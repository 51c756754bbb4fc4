// Category-addressed log sinks

use crate::Level;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Destination for `log(message, category)` diagnostics.
///
/// Callers never depend on a sink succeeding, so `log` has no return value and
/// implementations must not block for long.
pub trait LogSink: Send + Sync {
    /// Record `message` under `category`.
    fn log(&self, message: &str, category: &str);
}

/// Sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl LogSink for NullSink {
    fn log(&self, _message: &str, _category: &str) {}
}

/// Category the logger falls back to for unknown names.
pub const DEFAULT_CATEGORY: &str = "def";

const BUILTIN_CATEGORIES: &[(&str, &str)] = &[
    ("def", "_DEF_"),
    ("log", "_LOG_"),
    ("info", "_INFO_"),
    ("error", "_ERROR_"),
    ("warning", "_WARNING_"),
    ("debug", "_DEBUG_"),
    ("controller", "_CONTROLLER_"),
    ("container", "_CONTAINER_"),
    ("router", "_ROUTER_"),
    ("request", "_REQUEST_"),
    ("response", "_RESPONSE_"),
    ("http", "_HTTP_"),
];

#[derive(Debug, Clone)]
struct CategoryEntry {
    enabled: bool,
    prefix: String,
}

/// Sink that filters by category and forwards to the global writer.
///
/// Each category has an on/off switch and a prefix used as the log target.
/// The severity is derived from the category name (`error` logs at ERROR,
/// `warning` at WARN, `debug` at DEBUG, everything else at INFO).
pub struct CategoryLogger {
    categories: RwLock<HashMap<String, CategoryEntry>>,
}

impl CategoryLogger {
    /// Logger with no categories registered; everything falls back to `def`,
    /// which is also absent, so nothing is written until categories are added.
    pub fn empty() -> Self {
        Self {
            categories: RwLock::new(HashMap::new()),
        }
    }

    /// Register or overwrite a category.
    pub fn with_category(self, name: &str, prefix: &str, enabled: bool) -> Self {
        self.categories.write().insert(
            name.to_string(),
            CategoryEntry {
                enabled,
                prefix: prefix.to_string(),
            },
        );
        self
    }

    /// Toggle a category at runtime. Unknown categories are ignored.
    pub fn set_enabled(&self, name: &str, enabled: bool) {
        if let Some(entry) = self.categories.write().get_mut(name) {
            entry.enabled = enabled;
        }
    }

    /// Whether `log(_, name)` would produce output.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.resolve(name).map(|e| e.enabled).unwrap_or(false)
    }

    /// Prefix used for `name` after fallback.
    pub fn prefix(&self, name: &str) -> Option<String> {
        self.resolve(name).map(|e| e.prefix)
    }

    fn resolve(&self, name: &str) -> Option<CategoryEntry> {
        let categories = self.categories.read();
        categories
            .get(name)
            .or_else(|| categories.get(DEFAULT_CATEGORY))
            .cloned()
    }

    fn level_for(category: &str) -> Level {
        match category {
            "error" => Level::Error,
            "warning" => Level::Warn,
            "debug" => Level::Debug,
            _ => Level::Info,
        }
    }
}

impl Default for CategoryLogger {
    fn default() -> Self {
        BUILTIN_CATEGORIES
            .iter()
            .fold(Self::empty(), |logger, (name, prefix)| {
                logger.with_category(name, prefix, true)
            })
    }
}

impl LogSink for CategoryLogger {
    fn log(&self, message: &str, category: &str) {
        let Some(entry) = self.resolve(category) else {
            return;
        };
        if !entry.enabled {
            return;
        }
        crate::log(Self::level_for(category), &entry.prefix, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_prefixes() {
        let logger = CategoryLogger::default();
        assert_eq!(logger.prefix("router").as_deref(), Some("_ROUTER_"));
        assert_eq!(logger.prefix("container").as_deref(), Some("_CONTAINER_"));
    }

    #[test]
    fn test_unknown_category_falls_back_to_def() {
        let logger = CategoryLogger::default();
        assert_eq!(logger.prefix("nonsense").as_deref(), Some("_DEF_"));
        assert!(logger.is_enabled("nonsense"));
    }

    #[test]
    fn test_disable_category() {
        let logger = CategoryLogger::default();
        logger.set_enabled("router", false);
        assert!(!logger.is_enabled("router"));
        assert!(logger.is_enabled("container"));
        // Must not panic or write
        logger.log("dropped", "router");
    }

    #[test]
    fn test_empty_logger_writes_nothing() {
        let logger = CategoryLogger::empty();
        assert!(!logger.is_enabled("router"));
        assert_eq!(logger.prefix("router"), None);
    }

    #[test]
    fn test_null_sink() {
        NullSink.log("anything", "error");
    }
}
