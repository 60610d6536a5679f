//! Slash-command catalog.
//!
//! Aggregates the slash entries of every installed extension into one
//! ordered list for the editor's command palette. Entries are never
//! deduplicated. When several extensions register the same trigger,
//! `find` returns the last one in catalog order, which is the one from the
//! most recently installed plugin, matching extension precedence.

use std::collections::BTreeMap;

use super::registry::PluginRegistry;
use super::types::SlashCommand;

/// A slash command together with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct SlashEntry {
    pub plugin: String,
    pub extension: String,
    pub command: SlashCommand,
}

/// A trigger offered by more than one extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlashConflict {
    pub trigger: String,
    /// `plugin/extension` of each contributor, in catalog order. The last
    /// one wins.
    pub sources: Vec<String>,
}

/// Ordered slash-command catalog built from a registry snapshot.
#[derive(Debug, Clone, Default)]
pub struct SlashCatalog {
    entries: Vec<SlashEntry>,
}

impl SlashCatalog {
    /// Collect every slash command in `all_extensions()` order.
    pub fn build(registry: &PluginRegistry) -> Self {
        let entries = registry
            .extensions_by_plugin()
            .flat_map(|(plugin, ext)| {
                ext.slash_commands().iter().map(move |cmd| SlashEntry {
                    plugin: plugin.to_string(),
                    extension: ext.name.clone(),
                    command: cmd.clone(),
                })
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[SlashEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entry a typed trigger dispatches to. Last registration wins.
    pub fn find(&self, trigger: &str) -> Option<&SlashEntry> {
        let trigger = trigger.strip_prefix('/').unwrap_or(trigger);
        self.entries.iter().rev().find(|e| e.command.slash == trigger)
    }

    /// Entries whose trigger starts with `prefix`, in catalog order.
    pub fn search<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a SlashEntry> + 'a {
        let prefix = prefix.strip_prefix('/').unwrap_or(prefix);
        self.entries
            .iter()
            .filter(move |e| e.command.slash.starts_with(prefix))
    }

    /// Triggers registered more than once, sorted by trigger.
    pub fn conflicts(&self) -> Vec<SlashConflict> {
        let mut by_trigger: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for e in &self.entries {
            by_trigger
                .entry(e.command.slash.as_str())
                .or_default()
                .push(format!("{}/{}", e.plugin, e.extension));
        }

        by_trigger
            .into_iter()
            .filter(|(_, sources)| sources.len() > 1)
            .map(|(trigger, sources)| SlashConflict {
                trigger: trigger.to_string(),
                sources,
            })
            .collect()
    }
}
