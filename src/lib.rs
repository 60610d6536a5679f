//! KWiki - plugin registry and capability composition for a collaborative
//! wiki editor

pub mod config;
pub mod error;
pub mod host;
pub mod plugins;
pub mod watcher;

pub use config::Config;
pub use error::{KwikiError, Result};
pub use host::HostShell;
