// src/plugin/error.rs
// =============================================================================
// Errors raised while loading or running plugins.
//
// Loading errors (Unknown, MissingOption) stop the spider from starting.
// Everything else is returned from a plugin task and only logged: a failing
// plugin never takes the crawl down with it.
// =============================================================================

use std::path::PathBuf;

use thiserror::Error;

use crate::fetch::FetchError;

#[derive(Debug, Error)]
pub enum PluginError {
    /// No plugin is registered under this name
    #[error("unknown plugin: {0}")]
    Unknown(String),

    /// A required option was not set before loading
    #[error("plugin {plugin} requires option '{option}'")]
    MissingOption { plugin: String, option: String },

    /// An option is set but its value is unusable
    #[error("plugin {plugin}: invalid value '{value}' for option '{option}': {reason}")]
    InvalidOption {
        plugin: String,
        option: String,
        value: String,
        reason: String,
    },

    /// A plugin output file or directory could not be written
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Fetch(#[from] FetchError),
}
