//! Watch command: keep the registry in sync with the plugin directories.

use std::path::PathBuf;

use anyhow::{Context, Result};

use kwiki::watcher::{parse_interval, PluginWatcher};

use super::load_shell;

pub(crate) async fn cmd_watch(config_path: Option<PathBuf>, interval: &str) -> Result<()> {
    let every = parse_interval(interval)?;
    let mut shell = load_shell(config_path)?;
    let dirs = shell.config().plugins.resolved_dirs();

    println!("Watching:");
    for dir in &dirs {
        println!("  {}", dir.display());
    }
    println!("Interval: {} ({}s)", interval, every.as_secs());
    println!(
        "Installed: {} plugins, {} extensions",
        shell.registry().plugin_count(),
        shell.registry().extension_count()
    );
    println!();
    println!("Press Ctrl+C to stop.");
    println!();

    let mut watcher = PluginWatcher::new(dirs);
    watcher.track_installed(shell.registry());
    watcher
        .run(&mut shell, every)
        .await
        .with_context(|| "Plugin watcher failed")?;

    println!(
        "[{}] Stopped with {} plugins installed",
        chrono::Local::now().format("%H:%M"),
        shell.registry().plugin_count()
    );
    Ok(())
}
