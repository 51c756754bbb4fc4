// Environment variable overlay

use crate::loader::scalar;
use serde_json::Value;
use std::env;

/// Separator between path segments in a variable name.
pub const PATH_SEPARATOR: &str = "__";

/// Maps `PREFIX_FILE__A__B=value` variables onto configuration keys.
///
/// `SNAIL_SNAIL__CONFIG__DEBUG=1` becomes `snail.config.debug = 1`. Names are
/// lowercased; values that read as numbers or booleans keep that type.
pub struct EnvLoader {
    prefix: String,
}

impl EnvLoader {
    pub fn new(prefix: &str) -> Self {
        let prefix = prefix.trim_end_matches('_');
        Self {
            prefix: format!("{}_", prefix.to_uppercase()),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Overlay entries from the process environment.
    pub fn load(&self) -> Vec<(String, Value)> {
        self.collect(env::vars())
    }

    /// Overlay entries from an explicit variable list.
    pub fn collect<I>(&self, vars: I) -> Vec<(String, Value)>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut entries: Vec<(String, Value)> = vars
            .into_iter()
            .filter_map(|(name, value)| {
                let key = self.key_for(&name)?;
                Some((key, scalar(value.trim())))
            })
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Dotted key for a variable name, or `None` if it is not ours.
    pub fn key_for(&self, name: &str) -> Option<String> {
        let rest = name.strip_prefix(&self.prefix)?;
        let segments: Vec<String> = rest
            .split(PATH_SEPARATOR)
            .map(|segment| segment.to_lowercase())
            .collect();
        if segments.iter().any(String::is_empty) {
            return None;
        }
        Some(segments.join("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(list: &[(&str, &str)]) -> Vec<(String, String)> {
        list.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_key_mapping() {
        let loader = EnvLoader::new("snail");
        assert_eq!(loader.prefix(), "SNAIL_");
        assert_eq!(
            loader.key_for("SNAIL_SNAIL__CONFIG__DEBUG").as_deref(),
            Some("snail.config.debug")
        );
        assert_eq!(loader.key_for("SNAIL_DEF").as_deref(), Some("def"));
        assert_eq!(loader.key_for("OTHER_DEF"), None);
        assert_eq!(loader.key_for("SNAIL_DEF____X"), None);
    }

    #[test]
    fn test_values_keep_scalar_types() {
        let loader = EnvLoader::new("APP_");
        let entries = loader.collect(vars(&[
            ("APP_SNAIL__CONFIG__REQUEST_TIMEOUT_MS", "250"),
            ("APP_SNAIL__CONFIG__DEBUG", "true"),
            ("APP_SNAIL__SERVICES__NAMESPACE", "Shop::Services"),
            ("PATH", "/usr/bin"),
        ]));

        assert_eq!(
            entries,
            vec![
                ("snail.config.debug".to_string(), json!(true)),
                ("snail.config.request_timeout_ms".to_string(), json!(250)),
                ("snail.services.namespace".to_string(), json!("Shop::Services")),
            ]
        );
    }
}
