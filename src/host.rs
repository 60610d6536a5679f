//! Host application shell.
//!
//! The shell owns the plugin registry for the lifetime of the process. It
//! decides which plugins are installed (built-ins plus permitted plugins
//! from disk), and composes what the UI needs from the registry: routes,
//! the slash catalog, the service directory and the editor setup.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::{CollabSettings, Config};
use crate::error::{KwikiError, Result};
use crate::plugins::{
    builtin, discover_plugins, Plugin, PluginRegistry, Route, ServiceResolver, SlashCatalog,
};

/// One editor extension as handed to the editor framework.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EditorExtension {
    pub plugin: String,
    pub name: String,
    pub extension: Value,
}

/// Everything needed to instantiate the editor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EditorSetup {
    /// Extensions in precedence order (later overrides earlier).
    pub extensions: Vec<EditorExtension>,
    /// Present when the collaboration server and document are configured.
    pub collaboration: Option<CollabSettings>,
}

/// A route as mounted in the host router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MountedRoute {
    pub plugin: String,
    #[serde(flatten)]
    pub route: Route,
}

/// Counts from `HostShell::load`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub builtin: usize,
    pub discovered: usize,
    pub skipped: usize,
}

/// Owner of the registry and consumer of its aggregations.
#[derive(Debug)]
pub struct HostShell {
    config: Config,
    registry: PluginRegistry,
}

impl HostShell {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            registry: PluginRegistry::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    /// Install the built-ins (if enabled) and then every permitted plugin
    /// discovered in the configured directories.
    ///
    /// Plugins that are blocked or collide with an installed name are
    /// logged and counted as skipped.
    pub fn load(&mut self) -> Result<LoadReport> {
        let mut report = LoadReport::default();

        if self.config.plugins.builtin {
            for plugin in builtin::all()? {
                match self.install(plugin) {
                    Ok(_) => report.builtin += 1,
                    Err(_) => report.skipped += 1,
                }
            }
        }

        if self.config.plugins.enabled {
            let dirs = self.config.plugins.resolved_dirs();
            for plugin in discover_plugins(&dirs)? {
                match self.install(plugin) {
                    Ok(_) => report.discovered += 1,
                    Err(_) => report.skipped += 1,
                }
            }
        }

        info!(
            builtin = report.builtin,
            discovered = report.discovered,
            skipped = report.skipped,
            "Plugins loaded"
        );
        self.report_conflicts();
        Ok(report)
    }

    /// Install one plugin, honouring the allow/block lists.
    ///
    /// # Errors
    /// - `KwikiError::Config` if the plugin is not permitted
    /// - any error from `PluginRegistry::install`
    pub fn install(&mut self, plugin: impl Into<Arc<Plugin>>) -> Result<Arc<Plugin>> {
        let plugin = plugin.into();
        if !self.config.plugins.is_plugin_permitted(plugin.name()) {
            info!(plugin = %plugin.name(), "Plugin not permitted by config, skipping");
            return Err(KwikiError::Config(format!(
                "Plugin '{}' is not permitted",
                plugin.name()
            )));
        }

        self.registry.install(plugin).map_err(|e| {
            warn!(error = %e, "Plugin install failed");
            e
        })
    }

    /// Swap an installed plugin for a new descriptor with the same name,
    /// honouring the allow/block lists.
    pub fn replace(&mut self, plugin: impl Into<Arc<Plugin>>) -> Result<Arc<Plugin>> {
        let plugin = plugin.into();
        if !self.config.plugins.is_plugin_permitted(plugin.name()) {
            return Err(KwikiError::Config(format!(
                "Plugin '{}' is not permitted",
                plugin.name()
            )));
        }
        self.registry.replace(plugin)
    }

    pub fn uninstall(&mut self, name: &str) -> Result<Arc<Plugin>> {
        self.registry.uninstall(name)
    }

    /// Routes of every installed plugin, in plugin order.
    pub fn routes(&self) -> Vec<MountedRoute> {
        self.registry
            .all_routes()
            .map(|(plugin, route)| MountedRoute {
                plugin: plugin.to_string(),
                route: route.clone(),
            })
            .collect()
    }

    pub fn slash_catalog(&self) -> SlashCatalog {
        SlashCatalog::build(&self.registry)
    }

    pub fn services(&self) -> ServiceResolver<'_> {
        ServiceResolver::new(&self.registry)
    }

    /// Merged extension set and collaboration parameters for the editor.
    pub fn editor_setup(&self) -> EditorSetup {
        let extensions = self
            .registry
            .extensions_by_plugin()
            .map(|(plugin, ext)| EditorExtension {
                plugin: plugin.to_string(),
                name: ext.name.clone(),
                extension: ext.extension.clone(),
            })
            .collect();

        let collab = &self.config.collab;
        EditorSetup {
            extensions,
            collaboration: collab.is_configured().then(|| collab.clone()),
        }
    }

    /// Log slash trigger and route path collisions across plugins.
    pub fn report_conflicts(&self) -> usize {
        let mut count = 0;

        for conflict in self.slash_catalog().conflicts() {
            warn!(
                trigger = %conflict.trigger,
                sources = %conflict.sources.join(", "),
                "Slash trigger registered more than once; the last one wins"
            );
            count += 1;
        }

        let mut by_path: HashMap<&str, Vec<&str>> = HashMap::new();
        for (plugin, route) in self.registry.all_routes() {
            by_path.entry(route.path.as_str()).or_default().push(plugin);
        }
        let mut paths: Vec<_> = by_path.into_iter().filter(|(_, p)| p.len() > 1).collect();
        paths.sort_unstable();
        for (path, plugins) in paths {
            warn!(path = %path, plugins = %plugins.join(", "), "Route path registered more than once");
            count += 1;
        }

        count
    }
}
