use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod cli;

#[derive(Parser)]
#[command(name = "kwiki")]
#[command(about = "Plugin host for the KWiki collaborative editor", long_about = None)]
struct Cli {
    /// Config file (defaults to ~/.kwiki/config.json or $KWIKI_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List installed plugins
    Plugins,
    /// List editor extensions in precedence order
    Extensions,
    /// List routes contributed by plugins
    Routes,
    /// Show the slash-command catalog
    Slash {
        /// Only show triggers starting with this prefix
        prefix: Option<String>,
    },
    /// Resolve a service key
    Service {
        key: String,
        /// URL template parameters for HTTP services (name=value)
        #[arg(short, long = "param")]
        params: Vec<String>,
    },
    /// Print the editor setup (extensions + collaboration) as JSON
    Editor,
    /// Validate a plugin directory
    Check {
        dir: PathBuf,
    },
    /// Keep the registry in sync with the plugin directories
    Watch {
        /// Scan interval (e.g. 30s, 5m, 1h)
        #[arg(short, long, default_value = "30s")]
        interval: String,
    },
    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so command output stays pipeable
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("kwiki=info"));
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let config = cli.config;
    match cli.command {
        Some(Commands::Version) | None => {
            println!("kwiki {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Plugins) => cli::cmd_plugins(config)?,
        Some(Commands::Extensions) => cli::cmd_extensions(config)?,
        Some(Commands::Routes) => cli::cmd_routes(config)?,
        Some(Commands::Slash { prefix }) => cli::cmd_slash(config, prefix)?,
        Some(Commands::Service { key, params }) => cli::cmd_service(config, &key, &params)?,
        Some(Commands::Editor) => cli::cmd_editor(config)?,
        Some(Commands::Check { dir }) => cli::cmd_check(&dir)?,
        Some(Commands::Watch { interval }) => cli::watch::cmd_watch(config, &interval).await?,
    }

    Ok(())
}
