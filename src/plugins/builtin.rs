//! First-party plugins shipped with the host.
//!
//! Each function builds a plain descriptor value. The editor definitions are
//! opaque JSON handed to the editor framework as-is.

use serde_json::json;

use crate::error::Result;

use super::types::{
    ExtensionWrapper, HttpMethod, Plugin, PluginConfig, PluginSource, Route, ServiceDef,
    SlashCommand,
};

/// Names of the built-in plugins, in install order.
pub const BUILTIN_PLUGINS: &[&str] = &["file-manager", "database", "mind-map", "block-reference"];

/// All built-in plugins in install order.
pub fn all() -> Result<Vec<Plugin>> {
    Ok(vec![file_manager()?, database()?, mind_map()?, block_reference()?])
}

fn slash(text: &str, trigger: &str, icon: &str, action: &str) -> SlashCommand {
    SlashCommand {
        text: text.to_string(),
        slash: trigger.to_string(),
        icon: Some(icon.to_string()),
        action: action.to_string(),
    }
}

fn route(name: &str, path: &str, element: &str) -> Route {
    Route {
        name: name.to_string(),
        path: path.to_string(),
        element: element.to_string(),
    }
}

fn builtin(config: PluginConfig) -> Result<Plugin> {
    Ok(Plugin::new(config)?.with_source(PluginSource::Builtin))
}

fn base(name: &str, description: &str) -> PluginConfig {
    PluginConfig {
        name: name.to_string(),
        version: Some(env!("CARGO_PKG_VERSION").to_string()),
        description: Some(description.to_string()),
        author: Some("KWiki".to_string()),
        ..Default::default()
    }
}

/// Attachments and uploaded files.
pub fn file_manager() -> Result<Plugin> {
    let mut config = base("file-manager", "Upload, browse and embed files");
    config.editor_extension = vec![
        ExtensionWrapper::new(
            "fileBlock",
            json!({ "type": "node", "group": "block", "atom": true, "attrs": ["fileId", "name", "size"] }),
        )
        .with_slash(slash("File", "file", "paperclip", "insertFile")),
        ExtensionWrapper::new(
            "image",
            json!({ "type": "node", "group": "block", "draggable": true, "attrs": ["src", "alt", "width"] }),
        )
        .with_slash(slash("Image", "image", "image", "insertImage")),
    ];
    config.routes = vec![route("Files", "/files", "FileManagerPage")];
    config.services.extend([
        ("fileManager.list".to_string(), ServiceDef::http(HttpMethod::Get, "/api/files?folder={folder_id}")),
        ("fileManager.upload".to_string(), ServiceDef::http(HttpMethod::Post, "/api/files")),
        ("fileManager.remove".to_string(), ServiceDef::http(HttpMethod::Delete, "/api/files/{file_id}")),
        ("fileManager.maxUploadBytes".to_string(), ServiceDef::value(50 * 1024 * 1024)),
    ]);
    builtin(config)
}

/// Inline database tables with typed columns.
pub fn database() -> Result<Plugin> {
    let mut config = base("database", "Structured tables embedded in documents");
    config.editor_extension = vec![ExtensionWrapper::new(
        "databaseTable",
        json!({ "type": "node", "group": "block", "atom": true, "attrs": ["tableId", "view"] }),
    )
    .with_slash(slash("Table view", "table", "table", "insertDatabaseTable"))
    .with_slash(slash("Board view", "board", "columns", "insertDatabaseBoard"))];
    config.routes = vec![route("Databases", "/databases", "DatabaseListPage")];
    config.services.extend([
        ("database.get".to_string(), ServiceDef::http(HttpMethod::Get, "/api/databases/{table_id}")),
        ("database.rows".to_string(), ServiceDef::http(HttpMethod::Get, "/api/databases/{table_id}/rows")),
        ("database.updateCell".to_string(), ServiceDef::http(HttpMethod::Patch, "/api/databases/{table_id}/rows/{row_id}")),
    ]);
    builtin(config)
}

/// Mind-map diagrams.
pub fn mind_map() -> Result<Plugin> {
    let mut config = base("mind-map", "Mind-map diagrams");
    config.editor_extension = vec![ExtensionWrapper::new(
        "mindMap",
        json!({ "type": "node", "group": "block", "atom": true, "attrs": ["mapId", "height"] }),
    )
    .with_slash(slash("Mind map", "mindmap", "mind", "insertMindMap"))];
    config.routes = vec![route("Mind maps", "/mind-maps", "MindMapListPage")];
    config.services.extend([
        ("mindMap.get".to_string(), ServiceDef::http(HttpMethod::Get, "/api/mindmaps/{map_id}")),
        ("mindMap.save".to_string(), ServiceDef::http(HttpMethod::Put, "/api/mindmaps/{map_id}")),
    ]);
    builtin(config)
}

/// References to blocks in other documents.
pub fn block_reference() -> Result<Plugin> {
    let mut config = base("block-reference", "Link and transclude blocks across documents");
    config.editor_extension = vec![
        ExtensionWrapper::new(
            "blockRef",
            json!({ "type": "mark", "inclusive": false, "attrs": ["docId", "blockId"] }),
        )
        .with_slash(slash("Block reference", "ref", "link", "insertBlockRef")),
        ExtensionWrapper::new(
            "blockEmbed",
            json!({ "type": "node", "group": "block", "atom": true, "attrs": ["docId", "blockId"] }),
        )
        .with_slash(slash("Embed block", "embed", "quote", "insertBlockEmbed")),
    ];
    config.services.extend([
        ("blockRef.search".to_string(), ServiceDef::http(HttpMethod::Get, "/api/blocks/search?q={query}")),
        ("blockRef.resolve".to_string(), ServiceDef::http(HttpMethod::Get, "/api/docs/{doc_id}/blocks/{block_id}")),
    ]);
    builtin(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::registry::PluginRegistry;
    use crate::plugins::slash::SlashCatalog;

    #[test]
    fn test_all_builtins_are_valid_and_ordered() {
        let plugins = all().unwrap();
        let names: Vec<&str> = plugins.iter().map(|p| p.name()).collect();
        assert_eq!(names, BUILTIN_PLUGINS);
        assert!(plugins.iter().all(|p| p.source == PluginSource::Builtin));
    }

    #[test]
    fn test_builtins_install_without_conflicts() {
        let mut registry = PluginRegistry::new();
        for plugin in all().unwrap() {
            registry.install(plugin).unwrap();
        }

        assert_eq!(registry.plugin_count(), 4);
        assert!(SlashCatalog::build(&registry).conflicts().is_empty());

        let mut paths: Vec<&str> = registry.all_routes().map(|(_, r)| r.path.as_str()).collect();
        let total = paths.len();
        paths.sort_unstable();
        paths.dedup();
        assert_eq!(paths.len(), total);
    }

    #[test]
    fn test_builtin_service_template_params() {
        let plugin = database().unwrap();
        let endpoint = plugin.services()["database.updateCell"].as_http().unwrap();
        assert_eq!(endpoint.params(), vec!["table_id", "row_id"]);
    }
}
