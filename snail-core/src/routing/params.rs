// Captured route parameters

use std::collections::HashMap;

/// Values captured for a matched route.
///
/// `positional` holds captures in template order and is what handlers receive
/// as their argument list. `named` maps placeholder names to values; when a
/// name repeats in a template the later capture wins. Route extras from the
/// table and convention key/value pairs also land in `named`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteParams {
    positional: Vec<String>,
    named: HashMap<String, String>,
}

impl RouteParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from template names zipped with captured values.
    pub fn from_captures(names: &[String], values: Vec<String>) -> Self {
        let named = names
            .iter()
            .cloned()
            .zip(values.iter().cloned())
            .collect();
        Self {
            positional: values,
            named,
        }
    }

    pub fn positional(&self) -> &[String] {
        &self.positional
    }

    /// Positional capture by index
    pub fn at(&self, index: usize) -> Option<&str> {
        self.positional.get(index).map(String::as_str)
    }

    /// Named capture or extra
    pub fn get(&self, name: &str) -> Option<&str> {
        self.named.get(name).map(String::as_str)
    }

    pub fn named(&self) -> &HashMap<String, String> {
        &self.named
    }

    pub fn push(&mut self, value: impl Into<String>) {
        self.positional.push(value.into());
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.named.insert(name.into(), value.into());
    }

    /// Merge extras without overriding captured names.
    pub fn merge_extras(&mut self, extras: &HashMap<String, String>) {
        for (key, value) in extras {
            self.named
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.positional.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }

    pub fn into_positional(self) -> Vec<String> {
        self.positional
    }
}
