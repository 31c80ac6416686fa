// src/lib.rs
// =============================================================================
// link-spider: a concurrent web spider.
//
// Give it a start URL and it walks every reachable page on the same site with
// a pool of async workers, publishing each distinct URL it discovers on an
// output stream. Plugins consume that stream in the background to identify
// servers, find forms or download files.
//
// Modules:
// - config: CrawlConfig and the option parsers shared with the CLI
// - crawl:  the frontier, the streams, the workers and the Spider controller
// - fetch:  the Fetcher trait, its reqwest implementation and Page
// - plugin: the Plugin trait, the registry and the built-in plugins
// =============================================================================

pub mod config;
pub mod crawl;
pub mod fetch;
pub mod plugin;

pub use config::{CrawlConfig, ProxyConfig};
pub use crawl::{CrawlError, OutputCursor, ReadNext, Spider, SpiderState, StatusCursor};
pub use fetch::{FetchError, Fetcher, Form, HttpFetcher, Page, StaticFetcher};
pub use plugin::{Plugin, PluginContext, PluginError, PluginOptions, PluginRegistry};
