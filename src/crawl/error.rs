// src/crawl/error.rs
// =============================================================================
// Errors surfaced by the crawl controller.
//
// Only setup problems become errors. Anything that goes wrong while a single
// URL is being processed is logged to the status stream and skipped, so none
// of those cases appear here.
// =============================================================================

use thiserror::Error;

use crate::fetch::FetchError;

#[derive(Debug, Error)]
pub enum CrawlError {
    /// The start URL is not an absolute URL
    #[error("invalid start URL '{url}': {source}")]
    InvalidStartUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// The start URL parsed but has no host to compare links against
    #[error("start URL has no host: {0}")]
    MissingHost(String),

    /// The seed page could not be fetched
    #[error("failed to fetch start URL {url}: {source}")]
    SeedFetch {
        url: String,
        #[source]
        source: FetchError,
    },

    /// The seed page produced no URL that may be crawled
    #[error("no URL to spider from {0}")]
    NothingToCrawl(String),

    /// start() was called while the previous run still has live workers
    #[error("spider is already running")]
    AlreadyRunning,
}
