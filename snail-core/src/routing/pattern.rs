//! Path template compilation.
//!
//! A template is a `/`-delimited string of literal text and `:name`
//! placeholders. The placeholder name is looked up in a table of types; a known
//! type contributes its sub-expression, anything else matches one path segment.
//!
//! | Placeholder | Sub-expression     |
//! |-------------|--------------------|
//! | `:any`      | `[^/]+`            |
//! | `:num`      | `[0-9]+`           |
//! | `:all`      | `.*`               |
//! | `:base64`   | `[A-Za-z0-9/+=]+`  |
//! | `:other`    | `[^/]+`            |
//!
//! ```
//! use snail_core::routing::PatternCompiler;
//!
//! let compiler = PatternCompiler::new();
//! let matcher = compiler.compile("item/:num").unwrap();
//! assert_eq!(matcher.matches("item/42"), Some(vec!["42".to_string()]));
//! assert_eq!(matcher.matches("item/abc"), None);
//! ```

use crate::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

const SEGMENT: &str = "[^/]+";

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r":(\w+)").expect("placeholder expression is valid"));

/// Normalize a template or request path: no leading/trailing slash, `/` for empty.
pub fn normalize(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Table of placeholder types and the compiler that uses it.
#[derive(Debug, Clone)]
pub struct PatternCompiler {
    types: HashMap<String, String>,
}

impl PatternCompiler {
    /// Compiler with the built-in `any`, `num`, `all` and `base64` types.
    pub fn new() -> Self {
        let types = [
            ("any", SEGMENT),
            ("num", "[0-9]+"),
            ("all", ".*"),
            ("base64", "[A-Za-z0-9/+=]+"),
        ]
        .into_iter()
        .map(|(name, expr)| (name.to_string(), expr.to_string()))
        .collect();

        Self { types }
    }

    /// Register or replace a placeholder type.
    ///
    /// The expression must be valid and must not contain capture groups, since
    /// captures are numbered by placeholder position.
    pub fn register(&mut self, name: &str, expression: &str) -> Result<()> {
        let probe = Regex::new(expression)
            .map_err(|e| Error::Config(format!("placeholder ':{}': {}", name, e)))?;
        if probe.captures_len() > 1 {
            return Err(Error::Config(format!(
                "placeholder ':{}' must not contain capture groups",
                name
            )));
        }
        self.types.insert(name.to_string(), expression.to_string());
        Ok(())
    }

    /// Sub-expression used for a placeholder name.
    pub fn expression_for(&self, name: &str) -> &str {
        self.types.get(name).map(String::as_str).unwrap_or(SEGMENT)
    }

    /// Compile a template into an anchored matcher.
    pub fn compile(&self, template: &str) -> Result<Matcher> {
        let normalized = normalize(template);
        let mut expression = String::with_capacity(normalized.len() + 16);
        let mut names = Vec::new();
        let mut last = 0;

        expression.push('^');
        for caps in PLACEHOLDER.captures_iter(&normalized) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            expression.push_str(&regex::escape(&normalized[last..whole.start()]));
            expression.push('(');
            expression.push_str(self.expression_for(name.as_str()));
            expression.push(')');
            names.push(name.as_str().to_string());
            last = whole.end();
        }
        expression.push_str(&regex::escape(&normalized[last..]));
        expression.push('$');

        let regex = Regex::new(&expression)
            .map_err(|e| Error::Config(format!("route '{}': {}", template, e)))?;

        Ok(Matcher {
            template: normalized,
            regex,
            names,
        })
    }
}

impl Default for PatternCompiler {
    fn default() -> Self {
        Self::new()
    }
}

/// Compiled, anchored template.
#[derive(Debug, Clone)]
pub struct Matcher {
    template: String,
    regex: Regex,
    names: Vec<String>,
}

impl Matcher {
    /// Captured values in template order, or `None` if the whole path does not conform.
    pub fn matches(&self, path: &str) -> Option<Vec<String>> {
        let caps = self.regex.captures(path)?;
        Some(
            caps.iter()
                .skip(1)
                .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
                .collect(),
        )
    }

    /// Normalized template this matcher was built from.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Placeholder names in template order.
    pub fn names(&self) -> &[String] {
        &self.names
    }
}
