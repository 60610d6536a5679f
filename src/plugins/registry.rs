//! Plugin registry for KWiki
//!
//! This module provides the `PluginRegistry` struct holding the installed
//! plugins in insertion order, and the aggregation queries the host builds
//! its editor, router and service directory from.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::error::{KwikiError, Result};

use super::loader::validate_config;
use super::types::{ExtensionWrapper, Plugin, Route, ServiceDef};

/// The set of installed plugins.
///
/// Plugins are kept in insertion order, which fixes the order of menus,
/// routes and editor extensions. A name is never silently overwritten:
/// `install` rejects duplicates, and replacing a plugin goes through
/// `replace` (uninstall followed by install).
///
/// # Example
///
/// ```rust
/// use kwiki::plugins::{Plugin, PluginConfig, PluginRegistry, ServiceDef};
///
/// let mut registry = PluginRegistry::new();
///
/// let mut config = PluginConfig { name: "a".to_string(), ..Default::default() };
/// config.services.insert("foo".to_string(), ServiceDef::value(1));
/// registry.install(Plugin::new(config).unwrap()).unwrap();
///
/// let mut config = PluginConfig { name: "b".to_string(), ..Default::default() };
/// config.services.insert("foo".to_string(), ServiceDef::value(2));
/// registry.install(Plugin::new(config).unwrap()).unwrap();
///
/// assert_eq!(registry.all_services()["foo"], &ServiceDef::value(2));
/// ```
#[derive(Debug, Default)]
pub struct PluginRegistry {
    plugins: Vec<Arc<Plugin>>,
}

impl PluginRegistry {
    /// Create a new empty plugin registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a plugin at the end of the registry.
    ///
    /// The descriptor is re-validated and the name checked before anything
    /// is mutated, so a failed install leaves the registry unchanged.
    ///
    /// # Errors
    /// - `KwikiError::DuplicateName` if a plugin with this name is installed
    /// - `KwikiError::Validation` / `KwikiError::DuplicateExtension` if the
    ///   descriptor is malformed
    pub fn install(&mut self, plugin: impl Into<Arc<Plugin>>) -> Result<Arc<Plugin>> {
        let plugin = plugin.into();

        if self.contains(plugin.name()) {
            return Err(KwikiError::DuplicateName(plugin.name().to_string()));
        }
        validate_config(&plugin.config)?;

        info!(
            plugin = %plugin.name(),
            extensions = plugin.extension_count(),
            routes = plugin.routes().len(),
            services = plugin.services().len(),
            "Installed plugin"
        );

        self.plugins.push(Arc::clone(&plugin));
        Ok(plugin)
    }

    /// Remove a plugin by name and return it.
    ///
    /// # Errors
    /// `KwikiError::NotFound` if no plugin with this name is installed.
    pub fn uninstall(&mut self, name: &str) -> Result<Arc<Plugin>> {
        let index = self
            .position(name)
            .ok_or_else(|| KwikiError::NotFound(format!("plugin '{}'", name)))?;
        let plugin = self.plugins.remove(index);

        info!(plugin = %name, "Uninstalled plugin");
        Ok(plugin)
    }

    /// Swap an installed plugin for a new descriptor with the same name.
    ///
    /// The replacement moves to the end of the install order, so its
    /// services shadow the others like a fresh install. If the new
    /// descriptor is rejected, the old one is restored at its original
    /// position.
    pub fn replace(&mut self, plugin: impl Into<Arc<Plugin>>) -> Result<Arc<Plugin>> {
        let plugin = plugin.into();
        let index = self
            .position(plugin.name())
            .ok_or_else(|| KwikiError::NotFound(format!("plugin '{}'", plugin.name())))?;

        let old = self.plugins.remove(index);
        match self.install(plugin) {
            Ok(installed) => Ok(installed),
            Err(e) => {
                self.plugins.insert(index, old);
                Err(e)
            }
        }
    }

    /// Installed plugins in insertion order.
    pub fn list(&self) -> &[Arc<Plugin>] {
        &self.plugins
    }

    /// Get a plugin by name.
    pub fn get(&self, name: &str) -> Option<&Arc<Plugin>> {
        self.plugins.iter().find(|p| p.name() == name)
    }

    /// Check whether a plugin with this name is installed.
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Number of installed plugins.
    pub fn plugin_count(&self) -> usize {
        self.plugins.len()
    }

    /// Returns true if no plugins are installed.
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Total extensions across installed plugins.
    pub fn extension_count(&self) -> usize {
        self.plugins.iter().map(|p| p.extension_count()).sum()
    }

    /// Every extension across installed plugins, in plugin insertion order
    /// then declaration order. Later entries take precedence in the editor.
    pub fn all_extensions(&self) -> impl Iterator<Item = &ExtensionWrapper> + '_ {
        self.plugins.iter().flat_map(|p| p.extensions().iter())
    }

    /// Every extension paired with the name of the plugin declaring it.
    pub fn extensions_by_plugin(&self) -> impl Iterator<Item = (&str, &ExtensionWrapper)> + '_ {
        self.plugins
            .iter()
            .flat_map(|p| p.extensions().iter().map(move |e| (p.name(), e)))
    }

    /// Every route paired with its plugin name, in plugin insertion order.
    pub fn all_routes(&self) -> impl Iterator<Item = (&str, &Route)> + '_ {
        self.plugins
            .iter()
            .flat_map(|p| p.routes().iter().map(move |r| (p.name(), r)))
    }

    /// Merge the services of every installed plugin.
    ///
    /// Plugins are folded in insertion order, so on key collision the most
    /// recently installed plugin wins.
    pub fn all_services(&self) -> HashMap<&str, &ServiceDef> {
        self.plugins.iter().fold(HashMap::new(), |mut acc, p| {
            acc.extend(p.services().iter().map(|(k, v)| (k.as_str(), v)));
            acc
        })
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.plugins.iter().position(|p| p.name() == name)
    }
}
