// src/fetch/error.rs
// =============================================================================
// Errors from the fetch engine.
//
// The spider treats every one of these as recoverable: the URL is logged and
// skipped. They are typed anyway so plugins and tests can tell a timeout from
// a 404 from a disk problem.
// =============================================================================

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    /// The URL could not be parsed
    #[error("invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// The request timed out
    #[error("timeout fetching {url}")]
    Timeout { url: String },

    /// DNS, connection, TLS or body errors
    #[error("network error fetching {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-success status
    #[error("HTTP {status} fetching {url}")]
    HttpStatus { url: String, status: u16 },

    /// Writing a download to disk failed
    #[error("IO error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The HTTP client could not be built from the configuration
    #[error("invalid client configuration: {0}")]
    Client(String),

    /// No such resource (used by the in-memory fetcher)
    #[error("not found: {0}")]
    NotFound(String),
}

impl FetchError {
    // Sorts a reqwest error into timeout vs. generic network failure
    pub(crate) fn from_reqwest(url: &str, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else {
            FetchError::Network {
                url: url.to_string(),
                source: error,
            }
        }
    }
}
