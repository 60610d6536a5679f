//! Error types for KWiki
//!
//! This module defines the error type used by the plugin registry, the
//! manifest loader and the host shell. Uses `thiserror` for ergonomic error
//! handling with automatic `Display` and `Error` trait implementations.

use thiserror::Error;

/// The primary error type for KWiki operations.
#[derive(Error, Debug)]
pub enum KwikiError {
    /// A plugin with the same name is already installed.
    #[error("Duplicate plugin: '{0}' is already installed")]
    DuplicateName(String),

    /// Two extensions inside one plugin share a name.
    #[error("Duplicate extension '{extension}' in plugin '{plugin}'")]
    DuplicateExtension { plugin: String, extension: String },

    /// Plugin lookup or uninstall of an unknown name.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Resolution of a service key no installed plugin contributes.
    #[error("Missing service: no installed plugin provides '{0}'")]
    MissingService(String),

    /// A plugin descriptor violates the descriptor contract.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration-related errors (unreadable config, bad overrides, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Standard I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized `Result` type for KWiki operations.
pub type Result<T> = std::result::Result<T, KwikiError>;
