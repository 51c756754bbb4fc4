//! Plugins hook into bootstrap with access to the container.
//!
//! ```
//! use snail_core::plugin::{Plugin, PluginManager};
//! use snail_core::{Container, Result};
//! use std::sync::Arc;
//!
//! struct Metrics;
//!
//! impl Plugin for Metrics {
//!     fn name(&self) -> &str {
//!         "metrics"
//!     }
//!
//!     fn on_enable(&self, container: &Container) -> Result<()> {
//!         container.instance("metrics.enabled", true)?;
//!         Ok(())
//!     }
//! }
//!
//! let container = Container::new();
//! let mut plugins = PluginManager::new();
//! plugins.register(Arc::new(Metrics), &container).unwrap();
//! plugins.enable_all(&container).unwrap();
//! assert!(container.has("metrics.enabled"));
//! ```

use crate::{Container, Error, Result};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// A plugin. Every hook defaults to doing nothing.
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    /// Names of plugins that must be enabled first.
    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    fn on_register(&self, _container: &Container) -> Result<()> {
        Ok(())
    }

    fn on_enable(&self, _container: &Container) -> Result<()> {
        Ok(())
    }

    fn on_disable(&self, _container: &Container) -> Result<()> {
        Ok(())
    }

    fn on_uninstall(&self, _container: &Container) -> Result<()> {
        Ok(())
    }
}

/// Registered plugins and the order they were enabled in.
#[derive(Default)]
pub struct PluginManager {
    plugins: Vec<Arc<dyn Plugin>>,
    enabled: Vec<String>,
}

impl PluginManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, plugin: Arc<dyn Plugin>, container: &Container) -> Result<()> {
        let name = plugin.name().to_string();
        if self.get(&name).is_some() {
            return Err(Error::Plugin(format!("plugin '{}' is already registered", name)));
        }
        plugin.on_register(container)?;
        self.plugins.push(plugin);
        debug!(plugin = %name, "Plugin registered");
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.plugins.iter().find(|p| p.name() == name).cloned()
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled.iter().any(|n| n == name)
    }

    /// Enabled plugin names, dependencies before dependents.
    pub fn enabled(&self) -> &[String] {
        &self.enabled
    }

    /// Enable `name` after its dependencies.
    pub fn enable(&mut self, name: &str, container: &Container) -> Result<()> {
        let mut visiting = HashSet::new();
        self.enable_inner(name, container, &mut visiting)
    }

    /// Enable every registered plugin, in registration order.
    pub fn enable_all(&mut self, container: &Container) -> Result<()> {
        let names: Vec<String> = self.plugins.iter().map(|p| p.name().to_string()).collect();
        for name in names {
            self.enable(&name, container)?;
        }
        Ok(())
    }

    fn enable_inner(
        &mut self,
        name: &str,
        container: &Container,
        visiting: &mut HashSet<String>,
    ) -> Result<()> {
        if self.is_enabled(name) {
            return Ok(());
        }
        let plugin = self
            .get(name)
            .ok_or_else(|| Error::Plugin(format!("plugin '{}' is not registered", name)))?;
        if !visiting.insert(name.to_string()) {
            return Err(Error::Plugin(format!("plugin '{}' depends on itself", name)));
        }

        for dependency in plugin.dependencies() {
            if self.get(&dependency).is_none() {
                return Err(Error::Plugin(format!(
                    "plugin '{}' requires missing plugin '{}'",
                    name, dependency
                )));
            }
            self.enable_inner(&dependency, container, visiting)?;
        }

        plugin.on_enable(container)?;
        self.enabled.push(name.to_string());
        debug!(plugin = name, "Plugin enabled");
        Ok(())
    }

    /// Disable `name` and, before it, every enabled plugin that depends on it.
    pub fn disable(&mut self, name: &str, container: &Container) -> Result<()> {
        if !self.is_enabled(name) {
            return Ok(());
        }
        let dependents: Vec<String> = self
            .enabled
            .iter()
            .rev()
            .filter(|enabled| {
                self.get(enabled)
                    .map(|p| p.dependencies().iter().any(|d| d == name))
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        for dependent in dependents {
            self.disable(&dependent, container)?;
        }

        if let Some(plugin) = self.get(name) {
            plugin.on_disable(container)?;
        }
        self.enabled.retain(|n| n != name);
        debug!(plugin = name, "Plugin disabled");
        Ok(())
    }

    /// Disable everything, in reverse enable order.
    pub fn disable_all(&mut self, container: &Container) -> Result<()> {
        while let Some(name) = self.enabled.last().cloned() {
            self.disable(&name, container)?;
        }
        Ok(())
    }

    /// Disable if needed, run the uninstall hook and forget the plugin.
    pub fn uninstall(&mut self, name: &str, container: &Container) -> Result<()> {
        let plugin = self
            .get(name)
            .ok_or_else(|| Error::Plugin(format!("plugin '{}' is not registered", name)))?;
        self.disable(name, container)?;
        plugin.on_uninstall(container)?;
        self.plugins.retain(|p| p.name() != name);
        debug!(plugin = name, "Plugin uninstalled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct Recording {
        name: &'static str,
        deps: Vec<String>,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Recording {
        fn new(name: &'static str, deps: &[&str], log: &Arc<Mutex<Vec<String>>>) -> Arc<Self> {
            Arc::new(Self {
                name,
                deps: deps.iter().map(|d| d.to_string()).collect(),
                log: log.clone(),
            })
        }
    }

    impl Plugin for Recording {
        fn name(&self) -> &str {
            self.name
        }

        fn dependencies(&self) -> Vec<String> {
            self.deps.clone()
        }

        fn on_enable(&self, _container: &Container) -> Result<()> {
            self.log.lock().push(format!("enable {}", self.name));
            Ok(())
        }

        fn on_disable(&self, _container: &Container) -> Result<()> {
            self.log.lock().push(format!("disable {}", self.name));
            Ok(())
        }
    }

    #[test]
    fn test_dependencies_enable_first_and_disable_last() {
        let container = Container::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut plugins = PluginManager::new();
        plugins
            .register(Recording::new("admin", &["auth"], &log), &container)
            .unwrap();
        plugins
            .register(Recording::new("auth", &[], &log), &container)
            .unwrap();

        plugins.enable_all(&container).unwrap();
        assert_eq!(plugins.enabled(), &["auth".to_string(), "admin".to_string()]);

        plugins.disable_all(&container).unwrap();
        assert_eq!(
            *log.lock(),
            vec!["enable auth", "enable admin", "disable admin", "disable auth"]
        );
    }

    #[test]
    fn test_missing_dependency() {
        let container = Container::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut plugins = PluginManager::new();
        plugins
            .register(Recording::new("admin", &["auth"], &log), &container)
            .unwrap();
        assert!(matches!(
            plugins.enable("admin", &container),
            Err(Error::Plugin(_))
        ));
        assert!(!plugins.is_enabled("admin"));
    }

    #[test]
    fn test_duplicate_registration_and_uninstall() {
        let container = Container::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut plugins = PluginManager::new();
        plugins
            .register(Recording::new("auth", &[], &log), &container)
            .unwrap();
        assert!(plugins
            .register(Recording::new("auth", &[], &log), &container)
            .is_err());

        plugins.enable("auth", &container).unwrap();
        plugins.uninstall("auth", &container).unwrap();
        assert!(plugins.get("auth").is_none());
        assert!(!plugins.is_enabled("auth"));
    }
}
