//! Service resolution over installed plugins.
//!
//! Resolution is never cached: each call walks the registry as it is at
//! call time, so installs and uninstalls are visible immediately.

use tracing::warn;

use crate::error::{KwikiError, Result};

use super::registry::PluginRegistry;
use super::types::{Plugin, ServiceDef};

/// Resolve a service key to the value `all_services()` yields for it.
///
/// Returns `None` when no installed plugin contributes the key.
pub fn resolve_service<'a>(registry: &'a PluginRegistry, key: &str) -> Option<&'a ServiceDef> {
    ServiceResolver::new(registry).resolve(key)
}

/// Like `resolve_service`, but a missing key is an error.
///
/// # Errors
/// `KwikiError::MissingService` if no installed plugin provides `key`.
pub fn require_service<'a>(registry: &'a PluginRegistry, key: &str) -> Result<&'a ServiceDef> {
    ServiceResolver::new(registry).require(key)
}

/// Read-only view of the service directory formed by installed plugins.
#[derive(Debug, Clone, Copy)]
pub struct ServiceResolver<'a> {
    registry: &'a PluginRegistry,
}

impl<'a> ServiceResolver<'a> {
    pub fn new(registry: &'a PluginRegistry) -> Self {
        Self { registry }
    }

    /// The winning value for `key`.
    pub fn resolve(&self, key: &str) -> Option<&'a ServiceDef> {
        self.provider_of(key).and_then(|p| p.services().get(key))
    }

    /// The winning value for `key`, or `MissingService`.
    pub fn require(&self, key: &str) -> Result<&'a ServiceDef> {
        self.resolve(key).ok_or_else(|| {
            warn!(service = %key, "No installed plugin provides service");
            KwikiError::MissingService(key.to_string())
        })
    }

    /// The plugin whose value wins for `key`: the most recently installed
    /// plugin that declares it.
    pub fn provider_of(&self, key: &str) -> Option<&'a Plugin> {
        self.registry
            .list()
            .iter()
            .rev()
            .find(|p| p.services().contains_key(key))
            .map(|p| p.as_ref())
    }

    /// All resolvable keys, sorted.
    pub fn keys(&self) -> Vec<&'a str> {
        let mut keys: Vec<&str> = self.registry.all_services().into_keys().collect();
        keys.sort_unstable();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::types::{HttpMethod, PluginConfig};
    use serde_json::json;

    fn plugin_with_services(name: &str, services: &[(&str, ServiceDef)]) -> Plugin {
        let mut config = PluginConfig {
            name: name.to_string(),
            ..Default::default()
        };
        for (k, v) in services {
            config.services.insert(k.to_string(), v.clone());
        }
        Plugin::new(config).unwrap()
    }

    #[test]
    fn test_resolve_follows_install_and_uninstall() {
        let mut registry = PluginRegistry::new();
        registry
            .install(plugin_with_services("A", &[("foo", ServiceDef::value(1))]))
            .unwrap();
        registry
            .install(plugin_with_services("B", &[("foo", ServiceDef::value(2))]))
            .unwrap();

        assert_eq!(
            resolve_service(&registry, "foo").and_then(|s| s.as_value()),
            Some(&json!(2))
        );

        registry.uninstall("B").unwrap();
        assert_eq!(
            resolve_service(&registry, "foo").and_then(|s| s.as_value()),
            Some(&json!(1))
        );
    }

    #[test]
    fn test_resolve_unknown_key_is_none() {
        let registry = PluginRegistry::new();
        assert!(resolve_service(&registry, "nope").is_none());
    }

    #[test]
    fn test_require_unknown_key_is_missing_service() {
        let mut registry = PluginRegistry::new();
        registry
            .install(plugin_with_services("A", &[("foo", ServiceDef::value(1))]))
            .unwrap();

        let err = require_service(&registry, "bar").unwrap_err();
        assert!(matches!(err, KwikiError::MissingService(ref k) if k == "bar"));
        assert!(require_service(&registry, "foo").is_ok());
    }

    #[test]
    fn test_resolve_matches_all_services() {
        let mut registry = PluginRegistry::new();
        registry
            .install(plugin_with_services(
                "files",
                &[
                    ("files.list", ServiceDef::http(HttpMethod::Get, "/api/files")),
                    ("shared", ServiceDef::value("files")),
                ],
            ))
            .unwrap();
        registry
            .install(plugin_with_services(
                "maps",
                &[("shared", ServiceDef::value("maps"))],
            ))
            .unwrap();

        let merged = registry.all_services();
        let resolver = ServiceResolver::new(&registry);
        for key in resolver.keys() {
            assert_eq!(resolver.resolve(key), Some(merged[key]));
        }
        assert_eq!(resolver.keys(), vec!["files.list", "shared"]);
    }

    #[test]
    fn test_provider_of_reports_winner() {
        let mut registry = PluginRegistry::new();
        registry
            .install(plugin_with_services("A", &[("foo", ServiceDef::value(1))]))
            .unwrap();
        registry
            .install(plugin_with_services("B", &[("foo", ServiceDef::value(2))]))
            .unwrap();

        let resolver = ServiceResolver::new(&registry);
        assert_eq!(resolver.provider_of("foo").map(|p| p.name()), Some("B"));
        assert!(resolver.provider_of("bar").is_none());
    }
}
