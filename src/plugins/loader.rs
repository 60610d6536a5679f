//! Plugin discovery and loading for KWiki
//!
//! This module handles discovering plugin directories, loading and parsing
//! `plugin.json` manifests, and validating plugin descriptors before they
//! reach the registry.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::error::{KwikiError, Result};

use super::types::{Plugin, PluginConfig, PluginSource};

/// File name of a plugin manifest inside its directory.
pub const MANIFEST_FILE: &str = "plugin.json";

static PLUGIN_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9\-]{0,63}$").expect("plugin name pattern is valid")
});

/// Discover plugins across multiple directories.
///
/// Scans each provided directory for subdirectories containing a
/// `plugin.json` file. Each valid plugin is loaded, validated, and returned
/// in directory order (entries sorted by path for determinism). Invalid
/// plugins are logged as warnings but do not cause the overall discovery
/// to fail.
///
/// # Example
///
/// ```no_run
/// use std::path::PathBuf;
/// use kwiki::plugins::discover_plugins;
///
/// let dirs = vec![PathBuf::from("/home/user/.kwiki/plugins")];
/// let plugins = discover_plugins(&dirs).unwrap();
/// for plugin in &plugins {
///     println!("Found plugin: {} ({} extensions)", plugin.name(), plugin.extension_count());
/// }
/// ```
pub fn discover_plugins(dirs: &[PathBuf]) -> Result<Vec<Plugin>> {
    let mut plugins = Vec::new();

    for dir in dirs {
        if !dir.exists() {
            info!(dir = %dir.display(), "Plugin directory does not exist, skipping");
            continue;
        }

        if !dir.is_dir() {
            warn!(path = %dir.display(), "Plugin path is not a directory, skipping");
            continue;
        }

        let entries = fs::read_dir(dir).map_err(|e| {
            KwikiError::Config(format!(
                "Failed to read plugin directory {}: {}",
                dir.display(),
                e
            ))
        })?;

        let mut candidates = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                KwikiError::Config(format!("Failed to read directory entry: {}", e))
            })?;
            let entry_path = entry.path();
            if entry_path.is_dir() && entry_path.join(MANIFEST_FILE).exists() {
                candidates.push(entry_path);
            }
        }
        candidates.sort();

        for entry_path in candidates {
            match load_plugin(&entry_path) {
                Ok(plugin) => {
                    info!(
                        plugin = %plugin.name(),
                        extensions = plugin.extension_count(),
                        services = plugin.services().len(),
                        "Discovered plugin"
                    );
                    plugins.push(plugin);
                }
                Err(e) => {
                    warn!(
                        dir = %entry_path.display(),
                        error = %e,
                        "Failed to load plugin, skipping"
                    );
                }
            }
        }
    }

    Ok(plugins)
}

/// Load a single plugin from its directory.
///
/// # Errors
/// - `KwikiError::Config` if `plugin.json` does not exist or is unreadable
/// - `KwikiError::Json` if the JSON is malformed
/// - `KwikiError::Validation` / `KwikiError::DuplicateExtension` if the
///   descriptor fails validation (see `validate_config`)
pub fn load_plugin(dir: &Path) -> Result<Plugin> {
    let manifest_path = dir.join(MANIFEST_FILE);

    if !manifest_path.exists() {
        return Err(KwikiError::Config(format!(
            "No plugin.json found in {}",
            dir.display()
        )));
    }

    let content = fs::read_to_string(&manifest_path).map_err(|e| {
        KwikiError::Config(format!("Failed to read {}: {}", manifest_path.display(), e))
    })?;

    let config: PluginConfig = serde_json::from_str(&content)?;

    Ok(Plugin::new(config)?.with_source(PluginSource::Manifest(dir.to_path_buf())))
}

/// SHA-256 hex digest of a plugin directory's `plugin.json`.
pub fn manifest_digest(dir: &Path) -> Result<String> {
    let bytes = fs::read(dir.join(MANIFEST_FILE))?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Validate a plugin descriptor.
///
/// Performs the following checks:
/// - Plugin name must be 1-64 characters, alphanumeric and hyphens only
/// - Extension names must be non-empty, free of whitespace and unique in the
///   plugin; editor package names like `@tiptap/table` are accepted
/// - Slash triggers and actions must be non-empty, triggers without spaces
/// - Route names must be non-empty and paths must start with `/`
/// - Service keys must be non-empty and contain no whitespace
pub fn validate_config(config: &PluginConfig) -> Result<()> {
    if !PLUGIN_NAME_RE.is_match(&config.name) {
        return Err(KwikiError::Validation(format!(
            "Invalid plugin name '{}': must be 1-64 alphanumeric characters and hyphens, starting with alphanumeric",
            config.name
        )));
    }

    let mut seen = HashSet::new();
    for ext in &config.editor_extension {
        if ext.name.is_empty() || ext.name.chars().any(char::is_whitespace) {
            return Err(KwikiError::Validation(format!(
                "Invalid extension name '{}' in plugin '{}': must be non-empty without whitespace",
                ext.name, config.name
            )));
        }
        if !seen.insert(ext.name.as_str()) {
            return Err(KwikiError::DuplicateExtension {
                plugin: config.name.clone(),
                extension: ext.name.clone(),
            });
        }

        for cmd in ext.slash_commands() {
            if cmd.slash.is_empty() || cmd.slash.chars().any(char::is_whitespace) {
                return Err(KwikiError::Validation(format!(
                    "Invalid slash trigger '{}' on extension '{}' in plugin '{}'",
                    cmd.slash, ext.name, config.name
                )));
            }
            if cmd.action.trim().is_empty() {
                return Err(KwikiError::Validation(format!(
                    "Slash command '{}' on extension '{}' in plugin '{}' has no action",
                    cmd.slash, ext.name, config.name
                )));
            }
        }
    }

    for route in &config.routes {
        if route.name.trim().is_empty() {
            return Err(KwikiError::Validation(format!(
                "Route '{}' in plugin '{}' has an empty name",
                route.path, config.name
            )));
        }
        if !route.path.starts_with('/') {
            return Err(KwikiError::Validation(format!(
                "Route path '{}' in plugin '{}' must start with '/'",
                route.path, config.name
            )));
        }
    }

    for key in config.services.keys() {
        if key.is_empty() || key.chars().any(char::is_whitespace) {
            return Err(KwikiError::Validation(format!(
                "Invalid service key '{}' in plugin '{}'",
                key, config.name
            )));
        }
    }

    Ok(())
}
