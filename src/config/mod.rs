//! Host configuration for KWiki.
//!
//! Loaded from `~/.kwiki/config.json` (or the file named by `KWIKI_CONFIG`),
//! then overridden from the environment. A `.env` file in the working
//! directory is read first, so overrides can live there too.
//!
//! ```json
//! {
//!   "plugins": {
//!     "enabled": true,
//!     "builtin": true,
//!     "plugin_dirs": ["~/.kwiki/plugins"],
//!     "allowed_plugins": [],
//!     "blocked_plugins": ["legacy-embed"]
//!   },
//!   "collab": {
//!     "server_url": "wss://collab.example.com",
//!     "document_id": "space-1/home",
//!     "token": null
//!   }
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{KwikiError, Result};

/// Overrides the config file location.
pub const ENV_CONFIG: &str = "KWIKI_CONFIG";
/// Colon-separated plugin directories, replacing `plugins.plugin_dirs`.
pub const ENV_PLUGIN_DIRS: &str = "KWIKI_PLUGIN_DIRS";
pub const ENV_COLLAB_URL: &str = "KWIKI_COLLAB_URL";
pub const ENV_COLLAB_DOCUMENT: &str = "KWIKI_COLLAB_DOCUMENT";
pub const ENV_COLLAB_TOKEN: &str = "KWIKI_COLLAB_TOKEN";

/// Top-level host configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub plugins: PluginSettings,
    pub collab: CollabSettings,
}

/// Which plugins the host installs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginSettings {
    /// Whether plugins from `plugin_dirs` are loaded. Defaults to true.
    pub enabled: bool,

    /// Whether the built-in plugins are installed. Defaults to true.
    pub builtin: bool,

    /// Directories to scan for plugin subdirectories.
    pub plugin_dirs: Vec<String>,

    /// Allowlist of plugin names. If empty, all plugins are allowed.
    pub allowed_plugins: Vec<String>,

    /// Blocklist of plugin names. Takes precedence over the allowlist.
    pub blocked_plugins: Vec<String>,
}

impl Default for PluginSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            builtin: true,
            plugin_dirs: vec!["~/.kwiki/plugins".to_string()],
            allowed_plugins: Vec::new(),
            blocked_plugins: Vec::new(),
        }
    }
}

impl PluginSettings {
    /// Check whether a plugin name is permitted by the allow/block lists.
    ///
    /// A plugin is permitted if:
    /// - It is not in the blocked list, AND
    /// - The allowed list is empty (all plugins allowed) OR the plugin is in the allowed list.
    pub fn is_plugin_permitted(&self, name: &str) -> bool {
        if self.blocked_plugins.iter().any(|b| b == name) {
            return false;
        }
        if self.allowed_plugins.is_empty() {
            return true;
        }
        self.allowed_plugins.iter().any(|a| a == name)
    }

    /// `plugin_dirs` with a leading `~` expanded to the home directory.
    pub fn resolved_dirs(&self) -> Vec<PathBuf> {
        self.plugin_dirs.iter().map(|d| expand_home(d)).collect()
    }
}

/// Connection parameters for the document collaboration provider.
///
/// The host hands these to the editor unchanged; the registry never
/// talks to the collaboration server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollabSettings {
    pub server_url: Option<String>,
    pub document_id: Option<String>,
    pub token: Option<String>,
}

impl CollabSettings {
    /// A collaboration session needs at least a server and a document.
    pub fn is_configured(&self) -> bool {
        self.server_url.is_some() && self.document_id.is_some()
    }
}

impl Config {
    /// Config directory, `~/.kwiki`.
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".kwiki")
    }

    /// Config file path, honouring `KWIKI_CONFIG`.
    pub fn path() -> PathBuf {
        std::env::var_os(ENV_CONFIG)
            .map(PathBuf::from)
            .unwrap_or_else(|| Self::dir().join("config.json"))
    }

    /// Load `.env`, the config file and environment overrides.
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::load_at(&Self::path())
    }

    /// Load a specific config file, then apply environment overrides.
    pub fn load_at(path: &Path) -> Result<Self> {
        let mut config = Self::load_from(path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load a config file. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            KwikiError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            KwikiError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// Apply overrides from a variable lookup. Empty values are ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dirs) = get(ENV_PLUGIN_DIRS) {
            self.plugins.plugin_dirs = dirs
                .split(':')
                .filter(|d| !d.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(url) = get(ENV_COLLAB_URL) {
            self.collab.server_url = Some(url);
        }
        if let Some(doc) = get(ENV_COLLAB_DOCUMENT) {
            self.collab.document_id = Some(doc);
        }
        if let Some(token) = get(ENV_COLLAB_TOKEN) {
            self.collab.token = Some(token);
        }
    }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix('~') {
        Some(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest.trim_start_matches('/')),
            None => PathBuf::from(path),
        },
        None => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.plugins.enabled);
        assert!(config.plugins.builtin);
        assert_eq!(config.plugins.plugin_dirs, vec!["~/.kwiki/plugins"]);
        assert!(!config.collab.is_configured());
    }

    #[test]
    fn test_load_from_missing_file_is_default() {
        let tmp = TempDir::new().unwrap();
        let config = Config::load_from(&tmp.path().join("config.json")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_from_partial_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        fs::write(
            &path,
            r#"{"plugins": {"builtin": false, "blocked_plugins": ["x"]}, "collab": {"server_url": "wss://c"}}"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert!(!config.plugins.builtin);
        assert!(config.plugins.enabled);
        assert_eq!(config.plugins.blocked_plugins, vec!["x"]);
        assert_eq!(config.collab.server_url.as_deref(), Some("wss://c"));
        assert!(!config.collab.is_configured());
    }

    #[test]
    fn test_load_from_malformed_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        fs::write(&path, "{ nope").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, KwikiError::Config(_)));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_PLUGIN_DIRS, "/opt/kwiki/plugins:/srv/plugins:"),
            (ENV_COLLAB_URL, "wss://collab.local"),
            (ENV_COLLAB_DOCUMENT, "space/home"),
            (ENV_COLLAB_TOKEN, "  "),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env_overrides(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(
            config.plugins.plugin_dirs,
            vec!["/opt/kwiki/plugins", "/srv/plugins"]
        );
        assert!(config.collab.is_configured());
        assert!(config.collab.token.is_none());
    }

    #[test]
    fn test_load_follows_config_env_var() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("custom.json");
        fs::write(&path, r#"{"plugins": {"blocked_plugins": ["legacy"]}}"#).unwrap();

        // No other test reads KWIKI_CONFIG
        std::env::set_var(ENV_CONFIG, &path);
        let loaded = Config::load();
        std::env::remove_var(ENV_CONFIG);

        let config = loaded.unwrap();
        assert_eq!(config.plugins.blocked_plugins, vec!["legacy"]);
    }

    #[test]
    fn test_is_plugin_permitted() {
        let mut settings = PluginSettings::default();
        assert!(settings.is_plugin_permitted("anything"));

        settings.allowed_plugins = vec!["a".into(), "b".into()];
        assert!(settings.is_plugin_permitted("a"));
        assert!(!settings.is_plugin_permitted("c"));

        settings.blocked_plugins = vec!["a".into()];
        assert!(!settings.is_plugin_permitted("a"));
        assert!(settings.is_plugin_permitted("b"));
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home("/abs/path"), PathBuf::from("/abs/path"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/.kwiki/plugins"), home.join(".kwiki/plugins"));
            assert_eq!(expand_home("~"), home);
        }
    }
}
