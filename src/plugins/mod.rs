//! Plugin system for KWiki
//!
//! Plugins contribute editor extensions (nodes, marks, behaviors with their
//! slash-menu entries), routes and services to the host. A plugin is a plain
//! descriptor value, built in code or parsed from a `plugin.json` manifest,
//! that is validated and then installed into a `PluginRegistry`.
//!
//! # Architecture
//!
//! - **types**: Descriptor records (`ExtensionWrapper`, `SlashCommand`, `Route`,
//!   `ServiceDef`, `PluginConfig`, `Plugin`)
//! - **loader**: Manifest discovery, loading and validation
//! - **registry**: Ordered plugin set with install/uninstall and aggregation
//! - **services**: Service resolution over installed plugins
//! - **slash**: Slash-command catalog with trigger collision reporting
//! - **builtin**: First-party plugins (file manager, database, mind-map,
//!   block reference)
//!
//! # Plugin Directory Structure
//!
//! ```text
//! ~/.kwiki/plugins/
//! ├── kanban/
//! │   └── plugin.json
//! └── math/
//!     └── plugin.json
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::path::PathBuf;
//! use kwiki::plugins::{discover_plugins, resolve_service, PluginRegistry};
//!
//! let dirs = vec![PathBuf::from("/home/user/.kwiki/plugins")];
//! let mut registry = PluginRegistry::new();
//! for plugin in discover_plugins(&dirs).unwrap() {
//!     registry.install(plugin).unwrap();
//! }
//!
//! println!(
//!     "Loaded {} plugins with {} extensions",
//!     registry.plugin_count(),
//!     registry.extension_count()
//! );
//! println!("kanban.board -> {:?}", resolve_service(&registry, "kanban.board"));
//! ```

pub mod builtin;
mod loader;
pub mod registry;
pub mod services;
pub mod slash;
pub mod types;

pub use loader::{discover_plugins, load_plugin, manifest_digest, validate_config, MANIFEST_FILE};
pub use registry::PluginRegistry;
pub use services::{require_service, resolve_service, ServiceResolver};
pub use slash::{SlashCatalog, SlashConflict, SlashEntry};
pub use types::{
    ExtensionWrapper, HttpEndpoint, HttpMethod, Plugin, PluginConfig, PluginSource, Route,
    ServiceDef, SlashCommand,
};
