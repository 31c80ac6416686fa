// src/config.rs
// =============================================================================
// Run configuration for the spider.
//
// A CrawlConfig is built once (from the CLI or by an embedding program) and
// then frozen inside an Arc for the whole run. Workers, the policy filter and
// the HTTP fetcher all read from the same frozen copy.
//
// This file also holds the small string parsers the command line needs:
// cookie strings, proxy "host:port", and comma-separated ignore lists.
// =============================================================================

use std::collections::HashMap;
use std::time::Duration;

use url::Url;

use crate::crawl::CrawlError;

/// Path suffixes treated as web pages (as opposed to assets).
pub const DEFAULT_EXTENSIONS: [&str; 11] = [
    "/", ".html", ".htm", ".htmls", ".dhtml", ".xhtml", ".php", ".php3", ".asp", ".aspx", ".ece",
];

/// Number of workers used when the caller does not choose one.
pub const DEFAULT_THREADS: usize = 5;

/// Default cap on the number of pages dispatched for fetching.
pub const DEFAULT_MAX_PAGES: usize = 100;

/// Default read timeout for page fetches.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

// Proxy settings passed through to the fetch engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
}

/// Everything a run needs to know, fixed once the spider starts.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Page the crawl is seeded from.
    pub start_url: Url,
    /// Host of `start_url`, used by the external-URL rules.
    pub base_host: String,
    /// Path suffixes considered to be web pages.
    pub extensions: Vec<String>,
    /// URLs containing any of these keywords (case-insensitive) are never opened.
    pub ignore: Vec<String>,
    pub follow_external: bool,
    pub hide_external: bool,
    /// Maximum number of URLs dispatched for fetching, seed included.
    pub max_pages: usize,
    pub timeout: Duration,
    pub threads: usize,
    pub headers: HashMap<String, String>,
    pub cookies: HashMap<String, String>,
    pub proxy: Option<ProxyConfig>,
}

impl CrawlConfig {
    // Creates a configuration with the defaults for everything except the start URL
    //
    // Fails if the URL does not parse as an absolute URL or has no host,
    // since the host rules have nothing to compare against.
    pub fn new(start_url: &str) -> Result<Self, CrawlError> {
        let start_url = Url::parse(start_url).map_err(|source| CrawlError::InvalidStartUrl {
            url: start_url.to_string(),
            source,
        })?;

        let base_host = start_url
            .host_str()
            .ok_or_else(|| CrawlError::MissingHost(start_url.to_string()))?
            .to_string();

        Ok(Self {
            start_url,
            base_host,
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            ignore: Vec::new(),
            follow_external: false,
            hide_external: false,
            max_pages: DEFAULT_MAX_PAGES,
            timeout: DEFAULT_TIMEOUT,
            threads: DEFAULT_THREADS,
            headers: HashMap::new(),
            cookies: HashMap::new(),
            proxy: None,
        })
    }

    /// Sets the worker count. Zero is raised to one.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    /// The start URL always counts as a crawled page, so the cap is at least 1.
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_follow_external(mut self, flag: bool) -> Self {
        self.follow_external = flag;
        self
    }

    pub fn with_hide_external(mut self, flag: bool) -> Self {
        self.hide_external = flag;
        self
    }

    pub fn with_ignore(mut self, keywords: Vec<String>) -> Self {
        self.ignore = keywords;
        self
    }

    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        self.headers
            .insert("User-Agent".to_string(), user_agent.to_string());
        self
    }

    pub fn with_cookies(mut self, cookies: HashMap<String, String>) -> Self {
        self.cookies = cookies;
        self
    }

    pub fn with_proxy(mut self, proxy: Option<ProxyConfig>) -> Self {
        self.proxy = proxy;
        self
    }

    // Adds page extensions, skipping ones already present
    pub fn add_extensions<I, S>(&mut self, extensions: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for ext in extensions {
            let ext = ext.into();
            if !self.extensions.contains(&ext) {
                self.extensions.push(ext);
            }
        }
    }
}

// Parses a browser-style cookie string: "name=value; other=value2"
//
// Pairs without '=' are ignored. Names and values are trimmed.
pub fn parse_cookies(raw: &str) -> HashMap<String, String> {
    raw.split(';')
        .filter_map(|pair| pair.split_once('='))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .filter(|(name, _)| !name.is_empty())
        .collect()
}

// Parses "host:port" into a ProxyConfig
//
// The port is taken from the last ':' so bracketed IPv6 hosts still work.
pub fn parse_proxy(raw: &str) -> Result<ProxyConfig, String> {
    let (host, port) = raw
        .trim()
        .rsplit_once(':')
        .ok_or_else(|| format!("proxy must be host:port, got '{}'", raw))?;

    if host.is_empty() {
        return Err(format!("proxy host is empty in '{}'", raw));
    }

    let port = port
        .parse::<u16>()
        .map_err(|e| format!("invalid proxy port '{}': {}", port, e))?;

    Ok(ProxyConfig {
        host: host.to_string(),
        port,
    })
}

// Splits a comma-separated keyword list, dropping empty entries
pub fn parse_ignore(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CrawlConfig::new("http://example.com/").unwrap();
        assert_eq!(config.base_host, "example.com");
        assert_eq!(config.threads, 5);
        assert_eq!(config.max_pages, 100);
        assert_eq!(config.timeout, Duration::from_millis(5000));
        assert!(config.extensions.iter().any(|e| e == ".php"));
        assert!(!config.follow_external);
        assert!(!config.hide_external);
    }

    #[test]
    fn test_rejects_relative_start_url() {
        let err = CrawlConfig::new("/just/a/path").unwrap_err();
        assert!(matches!(err, CrawlError::InvalidStartUrl { .. }));
    }

    #[test]
    fn test_rejects_start_url_without_host() {
        let err = CrawlConfig::new("mailto:someone@example.com").unwrap_err();
        assert!(matches!(err, CrawlError::MissingHost(_)));
    }

    #[test]
    fn test_threads_minimum_is_one() {
        let config = CrawlConfig::new("http://example.com/").unwrap().with_threads(0);
        assert_eq!(config.threads, 1);
    }

    #[test]
    fn test_max_pages_minimum_is_one() {
        let config = CrawlConfig::new("http://example.com/").unwrap().with_max_pages(0);
        assert_eq!(config.max_pages, 1);
    }

    #[test]
    fn test_add_extensions_skips_duplicates() {
        let mut config = CrawlConfig::new("http://example.com/").unwrap();
        let before = config.extensions.len();
        config.add_extensions([".html", ".jsp"]);
        assert_eq!(config.extensions.len(), before + 1);
        assert_eq!(config.extensions.last().map(String::as_str), Some(".jsp"));
    }

    #[test]
    fn test_parse_cookies() {
        let cookies = parse_cookies("session=abc123; theme = dark;broken");
        assert_eq!(cookies.len(), 2);
        assert_eq!(cookies["session"], "abc123");
        assert_eq!(cookies["theme"], "dark");
    }

    #[test]
    fn test_parse_proxy() {
        let proxy = parse_proxy("127.0.0.1:8080").unwrap();
        assert_eq!(proxy.host, "127.0.0.1");
        assert_eq!(proxy.port, 8080);

        assert!(parse_proxy("localhost").is_err());
        assert!(parse_proxy("localhost:http").is_err());
        assert!(parse_proxy(":80").is_err());
    }

    #[test]
    fn test_parse_ignore() {
        assert_eq!(parse_ignore("logout, ,Admin,"), vec!["logout", "Admin"]);
        assert!(parse_ignore("").is_empty());
    }
}
