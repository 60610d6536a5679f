//! Command handlers for the `kwiki` binary.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use kwiki::config::Config;
use kwiki::host::HostShell;
use kwiki::plugins::{load_plugin, PluginSource, ServiceDef};

pub(crate) mod watch;

/// Load configuration and a shell with every permitted plugin installed.
pub(crate) fn load_shell(config_path: Option<PathBuf>) -> Result<HostShell> {
    let config = match &config_path {
        Some(path) => {
            let _ = dotenvy::dotenv();
            Config::load_at(path)
        }
        None => Config::load(),
    }
    .with_context(|| "Failed to load configuration")?;

    let mut shell = HostShell::new(config);
    shell.load().with_context(|| "Failed to load plugins")?;
    Ok(shell)
}

fn source_label(source: &PluginSource) -> String {
    match source {
        PluginSource::Builtin => "builtin".to_string(),
        PluginSource::Inline => "inline".to_string(),
        PluginSource::Manifest(dir) => dir.display().to_string(),
    }
}

pub(crate) fn cmd_plugins(config_path: Option<PathBuf>) -> Result<()> {
    let shell = load_shell(config_path)?;
    let registry = shell.registry();

    if registry.is_empty() {
        println!("No plugins installed.");
        return Ok(());
    }

    for plugin in registry.list() {
        println!(
            "{:<20} {:<10} ext={:<2} routes={:<2} services={:<2} loaded={}  [{}]",
            plugin.name(),
            plugin.config.version.as_deref().unwrap_or("-"),
            plugin.extension_count(),
            plugin.routes().len(),
            plugin.services().len(),
            plugin.loaded_at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M"),
            source_label(&plugin.source),
        );
        if !plugin.status().is_empty() {
            println!("  status: {}", plugin.status());
        }
    }
    println!();
    println!(
        "{} plugins, {} extensions",
        registry.plugin_count(),
        registry.extension_count()
    );
    Ok(())
}

pub(crate) fn cmd_extensions(config_path: Option<PathBuf>) -> Result<()> {
    let shell = load_shell(config_path)?;
    for (i, (plugin, ext)) in shell.registry().extensions_by_plugin().enumerate() {
        let kind = ext
            .extension
            .get("type")
            .and_then(|t| t.as_str())
            .unwrap_or("?");
        println!("{:>3}. {:<24} {:<6} ({})", i + 1, ext.name, kind, plugin);
    }
    Ok(())
}

pub(crate) fn cmd_routes(config_path: Option<PathBuf>) -> Result<()> {
    let shell = load_shell(config_path)?;
    for mounted in shell.routes() {
        println!(
            "{:<20} {:<20} {:<24} ({})",
            mounted.route.path, mounted.route.name, mounted.route.element, mounted.plugin
        );
    }
    Ok(())
}

pub(crate) fn cmd_slash(config_path: Option<PathBuf>, prefix: Option<String>) -> Result<()> {
    let shell = load_shell(config_path)?;
    let catalog = shell.slash_catalog();
    let prefix = prefix.unwrap_or_default();

    for entry in catalog.search(&prefix) {
        let winner = catalog
            .find(&entry.command.slash)
            .map(|w| std::ptr::eq(w, entry))
            .unwrap_or(false);
        println!(
            "/{:<14} {:<20} {:<24} {}/{}{}",
            entry.command.slash,
            entry.command.text,
            entry.command.action,
            entry.plugin,
            entry.extension,
            if winner { "" } else { "  (shadowed)" }
        );
    }
    Ok(())
}

/// Parse `name=value` pairs.
pub(crate) fn parse_params(params: &[String]) -> Result<HashMap<String, String>> {
    params
        .iter()
        .map(|p| match p.split_once('=') {
            Some((k, v)) if !k.is_empty() => Ok((k.to_string(), v.to_string())),
            _ => bail!("Invalid parameter '{}', expected name=value", p),
        })
        .collect()
}

pub(crate) fn cmd_service(config_path: Option<PathBuf>, key: &str, params: &[String]) -> Result<()> {
    let params = parse_params(params)?;
    let shell = load_shell(config_path)?;
    let services = shell.services();

    let service = services.require(key)?;
    let provider = services
        .provider_of(key)
        .map(|p| p.name().to_string())
        .unwrap_or_default();

    match service {
        ServiceDef::Value { value } => {
            println!("{}", serde_json::to_string_pretty(value)?);
        }
        ServiceDef::Http(endpoint) => {
            let url = if params.is_empty() {
                endpoint.url.clone()
            } else {
                endpoint.render_url(&params)?
            };
            println!("{} {}", endpoint.method, url);
            if let Some(response) = &endpoint.response {
                println!("response: {}", serde_json::to_string_pretty(response)?);
            }
        }
    }
    eprintln!("(provided by {})", provider);
    Ok(())
}

pub(crate) fn cmd_editor(config_path: Option<PathBuf>) -> Result<()> {
    let shell = load_shell(config_path)?;
    println!("{}", serde_json::to_string_pretty(&shell.editor_setup())?);
    Ok(())
}

pub(crate) fn cmd_check(dir: &Path) -> Result<()> {
    let plugin = load_plugin(dir).with_context(|| format!("Invalid plugin in {}", dir.display()))?;
    println!(
        "OK: {} ({} extensions, {} slash commands, {} routes, {} services)",
        plugin.name(),
        plugin.extension_count(),
        plugin.slash_count(),
        plugin.routes().len(),
        plugin.services().len()
    );
    Ok(())
}
