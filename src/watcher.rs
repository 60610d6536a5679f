//! Plugin directory watcher.
//!
//! Re-scans the plugin directories on an interval and brings the registry
//! in line with what is on disk: new manifests are installed, changed ones
//! (by SHA-256 of `plugin.json`) replace their plugin, and plugins whose
//! manifest was deleted are uninstalled. Tracking is per manifest directory,
//! so a directory only ever replaces the plugin it installed itself.
//! Built-ins, inline plugins and plugins loaded from another directory are
//! left alone; a manifest whose name is already taken is skipped, as
//! `HostShell::load` does.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{KwikiError, Result};
use crate::host::HostShell;
use crate::plugins::{discover_plugins, manifest_digest, PluginRegistry, MANIFEST_FILE};

/// Parse interval string like "1h", "30m", "15m", "60s" into a duration.
/// A bare number is seconds.
pub fn parse_interval(s: &str) -> Result<Duration> {
    let s = s.trim().to_lowercase();
    let invalid = || {
        KwikiError::Config(format!(
            "Invalid interval '{}'. Use formats like 1h, 30m, or 60s",
            s
        ))
    };

    let (digits, unit) = if let Some(hours) = s.strip_suffix('h') {
        (hours, 3600)
    } else if let Some(mins) = s.strip_suffix('m') {
        (mins, 60)
    } else if let Some(secs) = s.strip_suffix('s') {
        (secs, 1)
    } else {
        (s.as_str(), 1)
    };

    let n: u64 = digits.parse().map_err(|_| invalid())?;
    if n == 0 {
        return Err(invalid());
    }
    let secs = n.checked_mul(unit).ok_or_else(invalid)?;
    Ok(Duration::from_secs(secs))
}

/// What one sync pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub installed: Vec<String>,
    pub replaced: Vec<String>,
    pub removed: Vec<String>,
    /// Manifests whose plugin name is already installed from elsewhere.
    pub skipped: Vec<String>,
    /// Manifests that were found but could not be applied.
    pub failed: Vec<String>,
}

impl SyncReport {
    pub fn is_empty(&self) -> bool {
        self.installed.is_empty()
            && self.replaced.is_empty()
            && self.removed.is_empty()
            && self.skipped.is_empty()
            && self.failed.is_empty()
    }

    fn sort(&mut self) {
        self.installed.sort();
        self.replaced.sort();
        self.removed.sort();
        self.skipped.sort();
        self.failed.sort();
    }
}

/// A directory whose plugin the watcher installed.
#[derive(Debug, Clone)]
struct Tracked {
    name: String,
    digest: String,
    /// Digest of a manifest that stopped loading, once reported.
    broken: Option<String>,
}

/// A directory whose manifest was not installed. It is retried when the
/// manifest changes, or for a duplicate, once its name is free again.
#[derive(Debug, Clone)]
struct Declined {
    name: String,
    digest: String,
    duplicate: bool,
}

/// Keeps manifest-loaded plugins in sync with their directories.
#[derive(Debug)]
pub struct PluginWatcher {
    dirs: Vec<PathBuf>,
    tracked: HashMap<PathBuf, Tracked>,
    declined: HashMap<PathBuf, Declined>,
}

impl PluginWatcher {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self {
            dirs,
            tracked: HashMap::new(),
            declined: HashMap::new(),
        }
    }

    /// Start tracking every installed plugin that was loaded from a manifest.
    pub fn track_installed(&mut self, registry: &PluginRegistry) {
        for plugin in registry.list() {
            let Some(dir) = plugin.manifest_dir() else {
                continue;
            };
            match manifest_digest(dir) {
                Ok(digest) => {
                    self.tracked.insert(
                        dir.clone(),
                        Tracked {
                            name: plugin.name().to_string(),
                            digest,
                            broken: None,
                        },
                    );
                }
                Err(e) => {
                    warn!(plugin = %plugin.name(), error = %e, "Cannot fingerprint manifest");
                }
            }
        }
    }

    /// Names of tracked plugins, sorted.
    pub fn tracked(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tracked.values().map(|t| t.name.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Run one scan and apply the differences to the shell's registry.
    pub fn sync(&mut self, shell: &mut HostShell) -> Result<SyncReport> {
        let mut report = SyncReport::default();
        let discovered = discover_plugins(&self.dirs)?;
        let seen: HashSet<PathBuf> = discovered
            .iter()
            .filter_map(|p| p.manifest_dir().cloned())
            .collect();

        self.declined.retain(|dir, _| seen.contains(dir));
        self.sync_vanished(shell, &seen, &mut report);

        for plugin in discovered {
            let name = plugin.name().to_string();
            let Some(dir) = plugin.manifest_dir().cloned() else {
                continue;
            };
            let digest = match manifest_digest(&dir) {
                Ok(d) => d,
                Err(e) => {
                    warn!(plugin = %name, error = %e, "Cannot fingerprint manifest");
                    report.failed.push(name);
                    continue;
                }
            };

            if let Some(tracked) = self.tracked.get_mut(&dir) {
                if tracked.name == name {
                    tracked.broken = None;
                    if tracked.digest == digest {
                        continue;
                    }
                    match shell.replace(plugin) {
                        Ok(_) => {
                            tracked.digest = digest;
                            report.replaced.push(name);
                        }
                        Err(e) => {
                            warn!(plugin = %name, error = %e, "Failed to reload plugin");
                            report.failed.push(name);
                        }
                    }
                    continue;
                }

                // The directory now declares a different plugin
                let old = tracked.name.clone();
                self.tracked.remove(&dir);
                info!(old = %old, new = %name, dir = %dir.display(), "Plugin manifest renamed");
                match shell.uninstall(&old) {
                    Ok(_) => report.removed.push(old),
                    Err(e) => debug!(plugin = %old, error = %e, "Tracked plugin already gone"),
                }
            }

            if let Some(declined) = self.declined.get(&dir) {
                let unchanged = declined.name == name && declined.digest == digest;
                if unchanged && (!declined.duplicate || shell.registry().contains(&name)) {
                    continue;
                }
            }

            if shell.registry().contains(&name) {
                warn!(
                    plugin = %name,
                    dir = %dir.display(),
                    "Plugin name already installed from another source, skipping"
                );
                report.skipped.push(name.clone());
                self.declined.insert(
                    dir,
                    Declined {
                        name,
                        digest,
                        duplicate: true,
                    },
                );
                continue;
            }

            match shell.install(plugin) {
                Ok(_) => {
                    self.declined.remove(&dir);
                    report.installed.push(name.clone());
                    self.tracked.insert(
                        dir,
                        Tracked {
                            name,
                            digest,
                            broken: None,
                        },
                    );
                }
                Err(_) => {
                    report.failed.push(name.clone());
                    self.declined.insert(
                        dir,
                        Declined {
                            name,
                            digest,
                            duplicate: false,
                        },
                    );
                }
            }
        }

        report.sort();
        Ok(report)
    }

    /// Handle tracked directories missing from the scan. A plugin is removed
    /// only when its manifest file is gone; a manifest that no longer loads
    /// keeps the last good version installed and is reported once per edit.
    fn sync_vanished(
        &mut self,
        shell: &mut HostShell,
        seen: &HashSet<PathBuf>,
        report: &mut SyncReport,
    ) {
        let vanished: Vec<PathBuf> = self
            .tracked
            .keys()
            .filter(|dir| !seen.contains(*dir))
            .cloned()
            .collect();

        for dir in vanished {
            if dir.join(MANIFEST_FILE).exists() {
                let digest = manifest_digest(&dir).ok();
                if let Some(tracked) = self.tracked.get_mut(&dir) {
                    if digest.is_none() || tracked.broken != digest {
                        report.failed.push(tracked.name.clone());
                        tracked.broken = digest;
                    }
                }
                continue;
            }

            if let Some(tracked) = self.tracked.remove(&dir) {
                match shell.uninstall(&tracked.name) {
                    Ok(_) => report.removed.push(tracked.name),
                    Err(e) => {
                        debug!(plugin = %tracked.name, error = %e, "Tracked plugin already gone")
                    }
                }
            }
        }
    }

    /// Sync on every tick until `shutdown` completes.
    pub async fn run_until<F>(
        &mut self,
        shell: &mut HostShell,
        interval: Duration,
        shutdown: F,
    ) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(interval);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Plugin watcher stopped");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    match self.sync(shell) {
                        Ok(report) if report.is_empty() => debug!("No plugin changes"),
                        Ok(report) => {
                            info!(
                                installed = ?report.installed,
                                replaced = ?report.replaced,
                                removed = ?report.removed,
                                skipped = ?report.skipped,
                                failed = ?report.failed,
                                "Plugin directories synced"
                            );
                            shell.report_conflicts();
                        }
                        Err(e) => warn!(error = %e, "Plugin sync failed"),
                    }
                }
            }
        }
    }

    /// Sync on every tick until Ctrl+C.
    pub async fn run(&mut self, shell: &mut HostShell, interval: Duration) -> Result<()> {
        self.run_until(shell, interval, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn write_manifest(root: &Path, dir: &str, body: &str) {
        let dir = root.join(dir);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(MANIFEST_FILE), body).unwrap();
    }

    fn shell_for(root: &Path) -> HostShell {
        let mut config = Config::default();
        config.plugins.builtin = false;
        config.plugins.plugin_dirs = vec![root.display().to_string()];
        HostShell::new(config)
    }

    #[test]
    fn test_parse_interval() {
        assert_eq!(parse_interval("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_interval("30m").unwrap(), Duration::from_secs(1800));
        assert_eq!(parse_interval("60s").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_interval(" 90 ").unwrap(), Duration::from_secs(90));
    }

    #[test]
    fn test_parse_interval_invalid() {
        assert!(parse_interval("abc").is_err());
        assert!(parse_interval("").is_err());
        assert!(parse_interval("0s").is_err());
    }

    #[test]
    fn test_parse_interval_overflow() {
        assert!(parse_interval("5124095576030432h").is_err());
        assert!(parse_interval(&format!("{}m", u64::MAX / 2)).is_err());
    }

    #[test]
    fn test_sync_installs_replaces_and_removes() {
        let tmp = TempDir::new().unwrap();
        write_manifest(tmp.path(), "kanban", r#"{"name": "kanban", "status": "v1"}"#);

        let mut shell = shell_for(tmp.path());
        let mut watcher = PluginWatcher::new(vec![tmp.path().to_path_buf()]);

        let report = watcher.sync(&mut shell).unwrap();
        assert_eq!(report.installed, vec!["kanban"]);
        assert_eq!(shell.registry().get("kanban").unwrap().status(), "v1");

        // unchanged
        assert!(watcher.sync(&mut shell).unwrap().is_empty());

        write_manifest(tmp.path(), "kanban", r#"{"name": "kanban", "status": "v2"}"#);
        let report = watcher.sync(&mut shell).unwrap();
        assert_eq!(report.replaced, vec!["kanban"]);
        assert_eq!(shell.registry().get("kanban").unwrap().status(), "v2");

        fs::remove_dir_all(tmp.path().join("kanban")).unwrap();
        let report = watcher.sync(&mut shell).unwrap();
        assert_eq!(report.removed, vec!["kanban"]);
        assert!(shell.registry().is_empty());
        assert!(watcher.tracked().is_empty());
    }

    #[test]
    fn test_sync_keeps_last_good_version_on_broken_manifest() {
        let tmp = TempDir::new().unwrap();
        write_manifest(tmp.path(), "kanban", r#"{"name": "kanban", "status": "good"}"#);

        let mut shell = shell_for(tmp.path());
        let mut watcher = PluginWatcher::new(vec![tmp.path().to_path_buf()]);
        watcher.sync(&mut shell).unwrap();

        write_manifest(tmp.path(), "kanban", "{ broken");
        let report = watcher.sync(&mut shell).unwrap();
        assert_eq!(report.failed, vec!["kanban"]);
        assert_eq!(shell.registry().get("kanban").unwrap().status(), "good");

        // reported once per edit
        assert!(watcher.sync(&mut shell).unwrap().is_empty());

        write_manifest(tmp.path(), "kanban", r#"{"name": "kanban", "status": "fixed"}"#);
        let report = watcher.sync(&mut shell).unwrap();
        assert_eq!(report.replaced, vec!["kanban"]);
        assert_eq!(shell.registry().get("kanban").unwrap().status(), "fixed");
    }

    #[test]
    fn test_sync_same_name_in_two_dirs_keeps_first() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        write_manifest(first.path(), "kanban", r#"{"name": "kanban", "status": "A"}"#);
        write_manifest(second.path(), "kanban", r#"{"name": "kanban", "status": "B"}"#);
        write_manifest(second.path(), "tasks", r#"{"name": "tasks"}"#);

        let mut shell = shell_for(first.path());
        let mut watcher =
            PluginWatcher::new(vec![first.path().to_path_buf(), second.path().to_path_buf()]);

        let report = watcher.sync(&mut shell).unwrap();
        assert_eq!(report.installed, vec!["kanban", "tasks"]);
        assert_eq!(report.skipped, vec!["kanban"]);
        assert!(report.replaced.is_empty());
        assert_eq!(shell.registry().get("kanban").unwrap().status(), "A");

        for _ in 0..3 {
            assert!(watcher.sync(&mut shell).unwrap().is_empty());
        }
        let order: Vec<&str> = shell.registry().list().iter().map(|p| p.name()).collect();
        assert_eq!(order, vec!["kanban", "tasks"]);
        assert_eq!(shell.registry().get("kanban").unwrap().status(), "A");

        // once the first copy is deleted, the second one takes over
        fs::remove_dir_all(first.path().join("kanban")).unwrap();
        let report = watcher.sync(&mut shell).unwrap();
        assert_eq!(report.removed, vec!["kanban"]);
        assert_eq!(report.installed, vec!["kanban"]);
        assert_eq!(shell.registry().get("kanban").unwrap().status(), "B");
        assert!(watcher.sync(&mut shell).unwrap().is_empty());
    }

    #[test]
    fn test_sync_renamed_manifest_uninstalls_old_name() {
        let tmp = TempDir::new().unwrap();
        write_manifest(tmp.path(), "k", r#"{"name": "kanban"}"#);

        let mut shell = shell_for(tmp.path());
        let mut watcher = PluginWatcher::new(vec![tmp.path().to_path_buf()]);
        watcher.sync(&mut shell).unwrap();

        write_manifest(tmp.path(), "k", r#"{"name": "kanban2"}"#);
        let report = watcher.sync(&mut shell).unwrap();
        assert_eq!(report.removed, vec!["kanban"]);
        assert_eq!(report.installed, vec!["kanban2"]);
        assert!(report.failed.is_empty());

        assert!(!shell.registry().contains("kanban"));
        assert!(shell.registry().contains("kanban2"));
        assert_eq!(watcher.tracked(), vec!["kanban2"]);
        assert!(watcher.sync(&mut shell).unwrap().is_empty());
    }

    #[test]
    fn test_sync_retries_declined_manifest_only_after_edit() {
        let tmp = TempDir::new().unwrap();
        write_manifest(tmp.path(), "legacy", r#"{"name": "legacy"}"#);

        let mut config = Config::default();
        config.plugins.builtin = false;
        config.plugins.blocked_plugins = vec!["legacy".to_string()];
        let mut shell = HostShell::new(config);
        let mut watcher = PluginWatcher::new(vec![tmp.path().to_path_buf()]);

        assert_eq!(watcher.sync(&mut shell).unwrap().failed, vec!["legacy"]);
        assert!(watcher.sync(&mut shell).unwrap().is_empty());

        write_manifest(tmp.path(), "legacy", r#"{"name": "modern"}"#);
        let report = watcher.sync(&mut shell).unwrap();
        assert_eq!(report.installed, vec!["modern"]);
    }

    #[test]
    fn test_sync_ignores_untracked_installed_plugins() {
        let tmp = TempDir::new().unwrap();
        write_manifest(tmp.path(), "mind-map", r#"{"name": "mind-map"}"#);

        let mut config = Config::default();
        config.plugins.enabled = false;
        config.plugins.plugin_dirs = vec![tmp.path().display().to_string()];
        let mut shell = HostShell::new(config);
        shell.load().unwrap();

        let mut watcher = PluginWatcher::new(vec![tmp.path().to_path_buf()]);
        let report = watcher.sync(&mut shell).unwrap();

        assert_eq!(report.skipped, vec!["mind-map"]);
        assert!(watcher.sync(&mut shell).unwrap().is_empty());
        assert!(watcher.tracked().is_empty());
        assert!(shell.registry().get("mind-map").unwrap().manifest_dir().is_none());
    }

    #[test]
    fn test_track_installed_seeds_from_load() {
        let tmp = TempDir::new().unwrap();
        write_manifest(tmp.path(), "kanban", r#"{"name": "kanban"}"#);

        let mut shell = shell_for(tmp.path());
        shell.load().unwrap();

        let mut watcher = PluginWatcher::new(vec![tmp.path().to_path_buf()]);
        watcher.track_installed(shell.registry());
        assert_eq!(watcher.tracked(), vec!["kanban"]);
        assert!(watcher.sync(&mut shell).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_run_until_syncs_then_stops() {
        let tmp = TempDir::new().unwrap();
        write_manifest(tmp.path(), "kanban", r#"{"name": "kanban"}"#);

        let mut shell = shell_for(tmp.path());
        let mut watcher = PluginWatcher::new(vec![tmp.path().to_path_buf()]);

        watcher
            .run_until(
                &mut shell,
                Duration::from_millis(10),
                tokio::time::sleep(Duration::from_millis(50)),
            )
            .await
            .unwrap();

        assert!(shell.registry().contains("kanban"));
    }
}
