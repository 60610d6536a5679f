//! Plugin types for KWiki
//!
//! This module defines the descriptor records of the plugin system: the
//! extension wrapper contributed to the editor, slash-menu entries, routes,
//! service descriptors, the plugin configuration parsed from `plugin.json`
//! and the runtime plugin representation.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{KwikiError, Result};

use super::loader::validate_config;

/// A slash-menu entry offered by an extension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlashCommand {
    /// Label shown in the command palette.
    pub text: String,

    /// Trigger typed after `/` (e.g. "mindmap").
    pub slash: String,

    /// Optional icon identifier understood by the host UI.
    #[serde(default)]
    pub icon: Option<String>,

    /// Opaque command id executed by the editor when the entry is picked.
    pub action: String,
}

/// One editor capability (node, mark or behavior) contributed by a plugin.
///
/// The `extension` payload belongs to the editor framework. The registry
/// passes it through unmodified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionWrapper {
    /// Name, unique within the declaring plugin.
    pub name: String,

    /// Opaque editor node/mark definition.
    #[serde(default)]
    pub extension: Value,

    /// Optional slash-menu affordances.
    #[serde(default, alias = "slashConfig")]
    pub slash_config: Option<Vec<SlashCommand>>,
}

impl ExtensionWrapper {
    /// Create an extension without slash commands.
    pub fn new(name: impl Into<String>, extension: Value) -> Self {
        Self {
            name: name.into(),
            extension,
            slash_config: None,
        }
    }

    /// Attach a slash command, keeping declaration order.
    pub fn with_slash(mut self, command: SlashCommand) -> Self {
        self.slash_config.get_or_insert_with(Vec::new).push(command);
        self
    }

    /// Slash commands declared by this extension, empty if none.
    pub fn slash_commands(&self) -> &[SlashCommand] {
        self.slash_config.as_deref().unwrap_or(&[])
    }
}

/// A route contributed to the host router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub name: String,
    /// Absolute path, must start with `/`.
    pub path: String,
    /// Identifier of the page element the host renders for this route.
    pub element: String,
}

/// HTTP verbs accepted in service endpoint descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        };
        f.write_str(s)
    }
}

static URL_PARAM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{([a-zA-Z_][a-zA-Z0-9_]*)\}").expect("URL parameter pattern is valid")
});

/// A REST endpoint wrapped as a service.
///
/// The registry never calls it. Hosts that do use `render_url` to fill
/// `{param}` placeholders in the URL template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpEndpoint {
    pub method: HttpMethod,

    /// URL template, e.g. `/api/files/{id}`.
    pub url: String,

    /// Optional description of the response shape (JSON Schema or sample).
    #[serde(default)]
    pub response: Option<Value>,
}

impl HttpEndpoint {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            response: None,
        }
    }

    /// Placeholder names in template order.
    pub fn params(&self) -> Vec<&str> {
        URL_PARAM_RE
            .captures_iter(&self.url)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect()
    }

    /// Substitute every `{param}` placeholder in the URL template.
    ///
    /// Fails with `KwikiError::Validation` naming the first placeholder that
    /// has no value in `params`.
    pub fn render_url(&self, params: &HashMap<String, String>) -> Result<String> {
        if let Some(missing) = self.params().into_iter().find(|p| !params.contains_key(*p)) {
            return Err(KwikiError::Validation(format!(
                "Missing URL parameter '{}' for {} {}",
                missing, self.method, self.url
            )));
        }

        let rendered = URL_PARAM_RE.replace_all(&self.url, |caps: &Captures| {
            params.get(&caps[1]).cloned().unwrap_or_default()
        });
        Ok(rendered.into_owned())
    }
}

/// A service contributed by a plugin, keyed by string in `services`.
///
/// ```json
/// { "kind": "value", "value": 42 }
/// { "kind": "http", "method": "GET", "url": "/api/files/{id}" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ServiceDef {
    /// Inline value (settings, feature flags, static data).
    Value { value: Value },
    /// REST endpoint descriptor.
    Http(HttpEndpoint),
}

impl ServiceDef {
    /// Inline value service.
    pub fn value(value: impl Into<Value>) -> Self {
        ServiceDef::Value {
            value: value.into(),
        }
    }

    /// REST endpoint service.
    pub fn http(method: HttpMethod, url: impl Into<String>) -> Self {
        ServiceDef::Http(HttpEndpoint::new(method, url))
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            ServiceDef::Value { value } => Some(value),
            ServiceDef::Http(_) => None,
        }
    }

    pub fn as_http(&self) -> Option<&HttpEndpoint> {
        match self {
            ServiceDef::Http(endpoint) => Some(endpoint),
            ServiceDef::Value { .. } => None,
        }
    }
}

/// The declarative shape of a plugin, as found in `plugin.json` or built
/// in code.
///
/// # Example
///
/// ```json
/// {
///   "name": "mind-map",
///   "version": "1.0.0",
///   "editor_extension": [
///     {
///       "name": "mindMap",
///       "extension": { "type": "node", "group": "block", "atom": true },
///       "slash_config": [
///         { "text": "Mind map", "slash": "mindmap", "icon": "mind", "action": "insertMindMap" }
///       ]
///     }
///   ],
///   "routes": [{ "name": "Mind maps", "path": "/mind-maps", "element": "MindMapList" }],
///   "services": { "mindMap.get": { "kind": "http", "method": "GET", "url": "/api/mindmaps/{id}" } }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Plugin name. Unique across the registry, alphanumeric characters and
    /// hyphens only, between 1 and 64 characters.
    pub name: String,

    /// Free-form lifecycle tag. Empty by default.
    #[serde(default)]
    pub status: String,

    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub author: Option<String>,

    /// Editor extensions in declaration order.
    #[serde(default, alias = "editorExtension")]
    pub editor_extension: Vec<ExtensionWrapper>,

    /// Routes contributed to the host router.
    #[serde(default)]
    pub routes: Vec<Route>,

    /// Services contributed to the global service directory.
    #[serde(default)]
    pub services: HashMap<String, ServiceDef>,
}

/// Where a plugin descriptor came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginSource {
    /// Shipped with the host.
    Builtin,
    /// Loaded from a `plugin.json` in this directory.
    Manifest(PathBuf),
    /// Constructed in code by the embedding application.
    Inline,
}

/// A validated plugin descriptor.
#[derive(Debug, Clone)]
pub struct Plugin {
    /// The validated configuration.
    pub config: PluginConfig,

    pub source: PluginSource,

    /// When the descriptor was created.
    pub loaded_at: DateTime<Utc>,
}

impl Plugin {
    /// Validate a configuration and wrap it as an inline plugin.
    ///
    /// # Errors
    /// - `KwikiError::Validation` if a name, path or trigger is malformed
    /// - `KwikiError::DuplicateExtension` if two extensions share a name
    pub fn new(config: PluginConfig) -> Result<Self> {
        validate_config(&config)?;
        Ok(Self {
            config,
            source: PluginSource::Inline,
            loaded_at: Utc::now(),
        })
    }

    /// Replace the recorded source.
    pub fn with_source(mut self, source: PluginSource) -> Self {
        self.source = source;
        self
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn status(&self) -> &str {
        &self.config.status
    }

    pub fn extensions(&self) -> &[ExtensionWrapper] {
        &self.config.editor_extension
    }

    pub fn routes(&self) -> &[Route] {
        &self.config.routes
    }

    pub fn services(&self) -> &HashMap<String, ServiceDef> {
        &self.config.services
    }

    /// Number of editor extensions declared by this plugin.
    pub fn extension_count(&self) -> usize {
        self.config.editor_extension.len()
    }

    /// Number of slash commands across all of this plugin's extensions.
    pub fn slash_count(&self) -> usize {
        self.extensions()
            .iter()
            .map(|e| e.slash_commands().len())
            .sum()
    }

    /// Manifest directory, if the plugin was loaded from disk.
    pub fn manifest_dir(&self) -> Option<&PathBuf> {
        match &self.source {
            PluginSource::Manifest(dir) => Some(dir),
            _ => None,
        }
    }
}
